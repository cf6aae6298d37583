//! In-flight request tracking.
//!
//! # Responsibilities
//! - Generate unique IDs for tracked requests
//! - Hold every request from chain entry until its response body is done
//! - Cancel all of them at once on shutdown
//! - Publish the in-flight count
//!
//! # Design Decisions
//! - Membership is an RAII guard; removal is idempotent
//! - Shutdown cancels a token per request instead of touching sockets; the
//!   accounting middleware turns the cancellation into a 503 or an aborted body

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::{Method, Uri};
use dashmap::DashMap;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::observability::metrics;

/// Global atomic counter for request IDs.
/// Relaxed ordering is enough; only uniqueness matters.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug)]
struct TrackedRequest {
    method: Method,
    uri: Uri,
    cancel: CancellationToken,
}

/// The shared set of requests currently being served.
#[derive(Debug, Clone, Default)]
pub struct InFlightRequests {
    entries: Arc<DashMap<ConnectionId, TrackedRequest>>,
    shut_down: Arc<AtomicBool>,
}

impl InFlightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request. It stays in the set until the guard is dropped.
    ///
    /// After [`InFlightRequests::shutdown_all`] the returned guard is
    /// already cancelled.
    pub fn track(&self, method: &Method, uri: &Uri) -> InFlightGuard {
        let id = ConnectionId::new();
        let cancel = CancellationToken::new();

        self.entries.insert(
            id,
            TrackedRequest {
                method: method.clone(),
                uri: uri.clone(),
                cancel: cancel.clone(),
            },
        );
        if self.shut_down.load(Ordering::SeqCst) {
            cancel.cancel();
        }
        metrics::record_in_flight(self.entries.len());

        InFlightGuard {
            entries: Arc::clone(&self.entries),
            id,
            cancel,
        }
    }

    /// Number of requests in flight.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cancel every tracked request, now and from here on. Returns how many
    /// were in flight.
    pub fn shutdown_all(&self) -> usize {
        self.shut_down.store(true, Ordering::SeqCst);

        let mut count = 0;
        for entry in self.entries.iter() {
            let request = entry.value();
            tracing::debug!(
                request = %entry.key(),
                "shutting down http request {} {}",
                request.method,
                request.uri
            );
            request.cancel.cancel();
            count += 1;
        }
        count
    }
}

/// Membership in [`InFlightRequests`]. Leaves the set when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    entries: Arc<DashMap<ConnectionId, TrackedRequest>>,
    id: ConnectionId,
    cancel: CancellationToken,
}

impl InFlightGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the server shuts this request down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Owned handle on the same cancellation.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.entries.remove(&self.id).is_some() {
            metrics::record_in_flight(self.entries.len());
            tracing::trace!(request = %self.id, "Request left in-flight set");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> (Method, Uri) {
        (Method::GET, path.parse().unwrap())
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn tracker_counts() {
        let in_flight = InFlightRequests::new();
        let (method, uri) = get("/api/v1/a");
        assert!(in_flight.is_empty());

        let guard1 = in_flight.track(&method, &uri);
        assert_eq!(in_flight.len(), 1);

        let guard2 = in_flight.track(&method, &uri);
        assert_eq!(in_flight.len(), 2);

        drop(guard1);
        assert_eq!(in_flight.len(), 1);

        drop(guard2);
        assert!(in_flight.is_empty());
    }

    #[test]
    fn shutdown_cancels_everyone() {
        let in_flight = InFlightRequests::new();
        let (method, uri) = get("/api/v1/stream");
        let a = in_flight.track(&method, &uri);
        let b = in_flight.track(&method, &uri);

        assert_eq!(in_flight.shutdown_all(), 2);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());

        let late = in_flight.track(&method, &uri);
        assert!(late.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let in_flight = InFlightRequests::new();
        let (method, uri) = get("/");
        let guard = in_flight.track(&method, &uri);

        let other = in_flight.clone();
        tokio::spawn(async move { other.shutdown_all() });
        guard.cancelled().await;
    }
}
