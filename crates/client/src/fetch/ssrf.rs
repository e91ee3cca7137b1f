//! Private-address guard.
//!
//! Feed items point at arbitrary hosts, so before any request the host is
//! resolved and every address it resolves to must be public.
use std::net::IpAddr;

use url::Url;

/// Error type for address validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("DNS resolution failed: {0}")]
    DnsError(String),
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// Covers loopback, RFC 1918, link-local, multicast, broadcast and
/// unspecified ranges plus IPv6 unique-local (fc00::/7). IPv4-mapped IPv6
/// addresses are judged by their IPv4 form.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is not private or reserved.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Check `url` without touching DNS: IP literals must be public and
/// `localhost` names are refused.
///
/// Used where an async lookup is not possible, such as redirect hops.
pub fn check_literal_host(url: &Url) -> Result<(), SsrfError> {
    let host = url.host_str().ok_or(SsrfError::MissingHost)?;
    let bare = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare.parse::<IpAddr>() {
        return validate_ip(ip);
    }

    let name = bare.trim_end_matches('.').to_ascii_lowercase();
    if name == "localhost" || name.ends_with(".localhost") {
        return Err(SsrfError::BlockedHost(host.to_string()));
    }
    Ok(())
}

/// Resolve the host of `url` and reject it if any address is blocked.
///
/// IP-literal hosts are checked without a lookup.
pub async fn check_host(url: &Url) -> Result<(), SsrfError> {
    let host = url.host_str().ok_or(SsrfError::MissingHost)?;
    let bare = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare.parse::<IpAddr>() {
        return validate_ip(ip);
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((bare, port))
        .await
        .map_err(|e| SsrfError::DnsError(format!("{host}: {e}")))?;

    let mut resolved = false;
    for addr in addrs {
        validate_ip(addr.ip())?;
        resolved = true;
    }

    if resolved { Ok(()) } else { Err(SsrfError::DnsError(format!("{host}: no addresses"))) }
}
