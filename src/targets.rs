use ipnet::Ipv4Net;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::Target;

/// Why a single range expression could not be expanded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("empty range expression")]
    Empty,
    #[error("invalid CIDR `{0}`")]
    Cidr(String),
    #[error("invalid address range `{0}` (start after end)")]
    Reversed(String),
    #[error("invalid octet `{octet}` in `{expr}`")]
    Octet { expr: String, octet: String },
    #[error("`{0}` is not an IPv4 address, range, or CIDR")]
    Unrecognized(String),
}

/// Expand a comma-separated list of range expressions into a flat address list.
///
/// Each token is expanded independently and in order. Malformed tokens are
/// skipped with a warning; duplicates across tokens are kept.
///
/// Supported forms per token:
/// - single address: `10.0.0.1`
/// - CIDR, including network and broadcast: `10.0.0.0/30`
/// - full-address range: `10.0.0.1-10.0.0.20`
/// - octet pattern, each octet `n`, `n-m` or `*`: `10.0.0.1-10`, `10.0.*.1`
pub fn expand_ranges(input: &str) -> Vec<IpAddr> {
    let mut out = Vec::new();
    for token in input.split(',') {
        match parse_range(token) {
            Ok(addrs) => {
                debug!(token = token.trim(), count = addrs.len(), "expanded range");
                out.extend(addrs.into_iter().map(IpAddr::V4));
            }
            Err(e) => warn!("skipping range: {e}"),
        }
    }
    out
}

/// Expand one range expression.
pub fn parse_range(token: &str) -> Result<Vec<Ipv4Addr>, RangeError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(RangeError::Empty);
    }

    if token.contains('/') {
        let net: Ipv4Net = token
            .parse()
            .map_err(|_| RangeError::Cidr(token.to_string()))?;
        return Ok(expand_ipv4net_all(net));
    }

    if let Some((a, b)) = token.split_once('-') {
        if let (Ok(start), Ok(end)) = (a.trim().parse::<Ipv4Addr>(), b.trim().parse::<Ipv4Addr>()) {
            let (s, e) = (u32::from(start), u32::from(end));
            if s > e {
                return Err(RangeError::Reversed(token.to_string()));
            }
            return Ok((s..=e).map(Ipv4Addr::from).collect());
        }
    }

    parse_octet_pattern(token)
}

/// Pair every address with the same port, preserving order.
pub fn into_targets(ips: &[IpAddr], port: u16) -> Vec<Target> {
    ips.iter().map(|&ip| Target::new(ip, port)).collect()
}

fn expand_ipv4net_all(net: Ipv4Net) -> Vec<Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    (start..=end).map(Ipv4Addr::from).collect()
}

fn parse_octet_pattern(token: &str) -> Result<Vec<Ipv4Addr>, RangeError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 4 {
        return Err(RangeError::Unrecognized(token.to_string()));
    }

    let mut octets: Vec<(u8, u8)> = Vec::with_capacity(4);
    for part in parts {
        let bounds = parse_octet(part).ok_or_else(|| RangeError::Octet {
            expr: token.to_string(),
            octet: part.to_string(),
        })?;
        octets.push(bounds);
    }

    let mut out = Vec::new();
    for a in octets[0].0..=octets[0].1 {
        for b in octets[1].0..=octets[1].1 {
            for c in octets[2].0..=octets[2].1 {
                for d in octets[3].0..=octets[3].1 {
                    out.push(Ipv4Addr::new(a, b, c, d));
                }
            }
        }
    }
    Ok(out)
}

fn parse_octet(part: &str) -> Option<(u8, u8)> {
    let part = part.trim();
    if part == "*" {
        return Some((0, 255));
    }
    if let Some((lo, hi)) = part.split_once('-') {
        let lo: u8 = lo.trim().parse().ok()?;
        let hi: u8 = hi.trim().parse().ok()?;
        return (lo <= hi).then_some((lo, hi));
    }
    let n: u8 = part.parse().ok()?;
    Some((n, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_includes_network_and_broadcast() {
        let ips = parse_range("192.0.2.0/30").unwrap();
        assert_eq!(
            ips,
            vec![
                Ipv4Addr::new(192, 0, 2, 0),
                Ipv4Addr::new(192, 0, 2, 1),
                Ipv4Addr::new(192, 0, 2, 2),
                Ipv4Addr::new(192, 0, 2, 3),
            ]
        );
    }

    #[test]
    fn host_route_is_single_address() {
        assert_eq!(parse_range("10.1.1.1/32").unwrap(), vec![Ipv4Addr::new(10, 1, 1, 1)]);
    }

    #[test]
    fn last_octet_range() {
        let ips = parse_range("10.0.0.5-7").unwrap();
        assert_eq!(
            ips,
            vec![
                Ipv4Addr::new(10, 0, 0, 5),
                Ipv4Addr::new(10, 0, 0, 6),
                Ipv4Addr::new(10, 0, 0, 7),
            ]
        );
    }

    #[test]
    fn full_address_range_crosses_octets() {
        let ips = parse_range("10.0.0.254-10.0.1.1").unwrap();
        assert_eq!(ips.len(), 4);
        assert_eq!(ips[0], Ipv4Addr::new(10, 0, 0, 254));
        assert_eq!(ips[3], Ipv4Addr::new(10, 0, 1, 1));
    }

    #[test]
    fn wildcard_octet() {
        let ips = parse_range("10.0.*.1").unwrap();
        assert_eq!(ips.len(), 256);
        assert_eq!(ips[255], Ipv4Addr::new(10, 0, 255, 1));
    }

    #[test]
    fn malformed_tokens_error() {
        assert_eq!(parse_range("  "), Err(RangeError::Empty));
        assert!(matches!(parse_range("10.0.0.0/33"), Err(RangeError::Cidr(_))));
        assert!(matches!(parse_range("10.0.0.9-10.0.0.1"), Err(RangeError::Reversed(_))));
        assert!(matches!(parse_range("10.0.0.300"), Err(RangeError::Octet { .. })));
        assert!(matches!(parse_range("10.0.0.9-3"), Err(RangeError::Octet { .. })));
        assert!(matches!(parse_range("example.com"), Err(RangeError::Unrecognized(_))));
    }

    #[test]
    fn expand_skips_bad_tokens_and_keeps_order() {
        let ips = expand_ranges("10.0.0.2, nonsense ,10.0.0.0/31,10.0.0.2");
        let want: Vec<IpAddr> = ["10.0.0.2", "10.0.0.0", "10.0.0.1", "10.0.0.2"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(ips, want);
    }

    #[test]
    fn into_targets_pairs_port() {
        let ips = expand_ranges("10.0.0.1-2");
        let targets = into_targets(&ips, 8080);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.port == 8080));
        assert_eq!(targets[1].to_string(), "10.0.0.2:8080");
    }
}
