//! `Accept` header negotiation.
//!
//! # Design Decisions
//! - Candidates are ranked by q-value, then by how specifically the client
//!   named them (`type/subtype` beats `type/*` beats `*/*`), then by the
//!   position of the matching range in the header, then by candidate order
//! - No header means `*/*`, so the first candidate wins
//! - Media type parameters other than `q` are ignored

/// Newline-delimited JSON.
pub const JSON_STREAM: &str = "application/x-json-stream";
/// Server-Sent Events.
pub const EVENT_STREAM: &str = "text/event-stream";
/// What browsers ask for first.
pub const TEXT_HTML: &str = "text/html";
/// Declared in place of `text/html`; the body is never HTML.
pub const TEXT_PLAIN: &str = "text/plain";

/// Stream content types in server preference order.
pub const STREAM_CANDIDATES: [&str; 3] = [JSON_STREAM, EVENT_STREAM, TEXT_HTML];

#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    q: f32,
    index: usize,
}

#[derive(Debug, Clone, Copy)]
struct Priority {
    specificity: u8,
    q: f32,
    order: isize,
}

fn parse_accept(header: &str) -> Vec<MediaRange> {
    header
        .split(',')
        .enumerate()
        .filter_map(|(index, part)| parse_media_range(part, index))
        .collect()
}

fn parse_media_range(part: &str, index: usize) -> Option<MediaRange> {
    let mut pieces = part.split(';');
    let full = pieces.next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = full.split_once('/')?;
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }

    let mut q = 1.0;
    for param in pieces {
        if let Some((name, value)) = param.split_once('=') {
            if name.trim().eq_ignore_ascii_case("q") {
                q = value.trim().parse().unwrap_or(0.0);
            }
        }
    }

    Some(MediaRange {
        kind: kind.to_string(),
        subtype: subtype.to_string(),
        q,
        index,
    })
}

fn specificity(candidate: &str, range: &MediaRange) -> Option<u8> {
    let (kind, subtype) = candidate.split_once('/')?;
    let mut s = 0;

    if range.kind.eq_ignore_ascii_case(kind) {
        s |= 4;
    } else if range.kind != "*" {
        return None;
    }

    if range.subtype.eq_ignore_ascii_case(subtype) {
        s |= 2;
    } else if range.subtype != "*" {
        return None;
    }

    Some(s)
}

fn priority(candidate: &str, accepted: &[MediaRange]) -> Priority {
    let mut best = Priority {
        specificity: 0,
        q: 0.0,
        order: -1,
    };

    for range in accepted {
        let Some(s) = specificity(candidate, range) else {
            continue;
        };
        let order = range.index as isize;
        let better = (s, range.q, order)
            .partial_cmp(&(best.specificity, best.q, best.order))
            .is_some_and(|o| o.is_gt());
        if better {
            best = Priority {
                specificity: s,
                q: range.q,
                order,
            };
        }
    }

    best
}

/// Pick the candidate the client prefers, or `None` if it accepts none.
pub fn negotiate<'a>(accept: Option<&str>, candidates: &[&'a str]) -> Option<&'a str> {
    let accepted = parse_accept(accept.unwrap_or("*/*"));

    let mut ranked: Vec<(usize, Priority)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, priority(c, &accepted)))
        .filter(|(_, p)| p.q > 0.0)
        .collect();

    ranked.sort_by(|(ai, a), (bi, b)| {
        b.q.total_cmp(&a.q)
            .then(b.specificity.cmp(&a.specificity))
            .then(a.order.cmp(&b.order))
            .then(ai.cmp(bi))
    });

    ranked.first().map(|(i, _)| candidates[*i])
}
