//! Listen address helpers.
//!
//! Addresses are accepted loosely (`8080`, `myhost`, `http://myhost:8080`)
//! and normalized to `host:port` before binding.

use std::net::{SocketAddr, ToSocketAddrs};

use thiserror::Error;

/// Hosts that mean "every interface" and are shown as `localhost`.
const WILDCARD_HOSTS: [&str; 3] = ["0.0.0.0", "[::]", "*"];
const DEFAULT_HOST: &str = "0.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("non-numeric port specified in address: '{0}'")]
    NonNumericPort(String),
    #[error("address '{0}' is not in host:port form")]
    Malformed(String),
    #[error("unable to resolve address '{0}'")]
    Unresolvable(String),
}

/// Split a `host:port` address on its last colon.
pub fn parse_address(address: &str) -> Option<(&str, &str)> {
    if address.is_empty() {
        return None;
    }
    address.rsplit_once(':')
}

/// Normalize to `host:port`, filling in whichever half is missing.
///
/// A leading `http://` or `https://` is kept on the host.
pub fn normalize_address(address: &str, default_port: u16) -> Result<String, AddressError> {
    let (scheme, rest) = match address.find("://") {
        Some(i) if matches!(&address[..i], "http" | "https") => address.split_at(i + 3),
        _ => ("", address),
    };

    let (mut host, mut port) = match parse_address(rest) {
        Some((host, port)) => (host.to_string(), port.to_string()),
        None if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) => {
            (String::new(), rest.to_string())
        }
        None => (rest.to_string(), String::new()),
    };

    if host.is_empty() {
        host = DEFAULT_HOST.to_string();
    }
    if port.is_empty() {
        port = default_port.to_string();
    }

    if !port.bytes().next().is_some_and(|b| b.is_ascii_digit()) {
        return Err(AddressError::NonNumericPort(address.to_string()));
    }

    Ok(format!("{scheme}{host}:{port}"))
}

/// Resolve a normalized address to something bindable.
pub fn resolve(address: &str) -> Result<SocketAddr, AddressError> {
    let bare = address
        .strip_prefix("http://")
        .or_else(|| address.strip_prefix("https://"))
        .unwrap_or(address);
    let (host, port) =
        parse_address(bare).ok_or_else(|| AddressError::Malformed(address.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| AddressError::NonNumericPort(address.to_string()))?;

    let host = match host {
        "*" => DEFAULT_HOST,
        h => h.trim_start_matches('[').trim_end_matches(']'),
    };

    (host, port)
        .to_socket_addrs()
        .map_err(|_| AddressError::Unresolvable(address.to_string()))?
        .next()
        .ok_or_else(|| AddressError::Unresolvable(address.to_string()))
}

/// Base URL clients should use, e.g. `https://localhost:4000`.
///
/// `None` when the address has no numeric port.
pub fn base_url(proto: &str, server: &str) -> Option<String> {
    let (host, port) = parse_address(server)?;
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let host = if WILDCARD_HOSTS.contains(&host) {
        "localhost"
    } else {
        host
    };
    Some(format!("{proto}://{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_only() {
        assert_eq!(normalize_address("8080", 80).unwrap(), "0.0.0.0:8080");
    }

    #[test]
    fn host_only() {
        assert_eq!(normalize_address("example.org", 443).unwrap(), "example.org:443");
    }

    #[test]
    fn scheme_is_kept() {
        assert_eq!(
            normalize_address("http://example.org:81", 80).unwrap(),
            "http://example.org:81"
        );
        assert_eq!(normalize_address("https://:81", 80).unwrap(), "https://0.0.0.0:81");
    }

    #[test]
    fn non_numeric_port() {
        assert_eq!(
            normalize_address("host:http", 80),
            Err(AddressError::NonNumericPort("host:http".into()))
        );
    }

    #[test]
    fn resolve_loopback() {
        let addr = resolve("127.0.0.1:0").unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 0);
        assert!(resolve("*:9000").unwrap().ip().is_unspecified());
        assert!(resolve("[::1]:9000").unwrap().is_ipv6());
    }

    #[test]
    fn base_url_maps_wildcards() {
        assert_eq!(base_url("http", "0.0.0.0:4000").as_deref(), Some("http://localhost:4000"));
        assert_eq!(base_url("https", "[::]:4000").as_deref(), Some("https://localhost:4000"));
        assert_eq!(base_url("http", "10.0.0.1:80").as_deref(), Some("http://10.0.0.1:80"));
        assert_eq!(base_url("http", "nohost"), None);
    }
}
