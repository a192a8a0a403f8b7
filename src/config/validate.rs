//! Host and port validation helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// One RFC 1123 hostname label: alphanumeric, hyphens allowed inside.
static FQDN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").expect("static label pattern")
});

/// Returns true if `addr` parses as an IPv4 or IPv6 address.
pub fn is_valid_ip(addr: &str) -> bool {
    addr.parse::<std::net::IpAddr>().is_ok()
}

/// Returns true if `addr` is a valid hostname per RFC 1123.
///
/// Accepts single-label names such as `localhost`; every label must be
/// 1..=63 alphanumeric-or-hyphen characters and must not start or end with
/// a hyphen; the whole name is capped at 253 characters.
pub fn is_valid_fqdn(addr: &str) -> bool {
    if addr.is_empty() || addr.len() > 253 {
        return false;
    }
    addr.split('.').all(|label| FQDN_LABEL.is_match(label))
}

/// Returns true if `port` is a usable TCP port (1..=65535).
pub fn is_valid_port(port: u16) -> bool {
    port != 0
}
