//! Address suffix replacement
//!
//! A registration may pin the host part of its address while following the
//! prefix handed out by the ISP. The suffix replaces the trailing octets
//! (IPv4) or 16-bit groups (IPv6) of the discovered address:
//!
//! ```text
//! 203.0.113.7            + "42"          -> 203.0.113.42
//! 203.0.113.7            + "1.42"        -> 203.0.1.42
//! 2001:db8:1:2:a:b:c:d   + "0:0:0:1"     -> 2001:db8:1:2::1
//! 2001:db8:1:2:a:b:c:d   + "::5"         -> 2001:db8:1:2:a:b:c:5
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};
use crate::traits::IpVersion;

fn parse_ipv4_suffix(suffix: &str) -> Result<Vec<u8>> {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return Err(Error::invalid_input("IPv4 suffix cannot be empty"));
    }

    let parts = suffix
        .split('.')
        .map(|part| {
            part.parse::<u8>().map_err(|_| {
                Error::invalid_input(format!("Invalid IPv4 suffix '{}': bad octet '{}'", suffix, part))
            })
        })
        .collect::<Result<Vec<u8>>>()?;

    if parts.len() > 4 {
        return Err(Error::invalid_input(format!(
            "Invalid IPv4 suffix '{}': more than 4 octets",
            suffix
        )));
    }
    Ok(parts)
}

fn parse_ipv6_suffix(suffix: &str) -> Result<Vec<u16>> {
    let trimmed = suffix.trim();
    let groups = trimmed.strip_prefix("::").unwrap_or(trimmed);
    if groups.is_empty() {
        return Err(Error::invalid_input("IPv6 suffix cannot be empty"));
    }

    let parts = groups
        .split(':')
        .map(|group| {
            if group.is_empty() || group.len() > 4 {
                return Err(Error::invalid_input(format!(
                    "Invalid IPv6 suffix '{}': bad group '{}'",
                    trimmed, group
                )));
            }
            u16::from_str_radix(group, 16).map_err(|_| {
                Error::invalid_input(format!(
                    "Invalid IPv6 suffix '{}': bad group '{}'",
                    trimmed, group
                ))
            })
        })
        .collect::<Result<Vec<u16>>>()?;

    if parts.len() > 8 {
        return Err(Error::invalid_input(format!(
            "Invalid IPv6 suffix '{}': more than 8 groups",
            trimmed
        )));
    }
    Ok(parts)
}

/// Replace the last octets of `addr` with those of `suffix`
pub fn apply_ipv4_suffix(addr: Ipv4Addr, suffix: &str) -> Result<Ipv4Addr> {
    let parts = parse_ipv4_suffix(suffix)?;
    let mut octets = addr.octets();
    let start = octets.len() - parts.len();
    octets[start..].copy_from_slice(&parts);
    Ok(Ipv4Addr::from(octets))
}

/// Replace the last 16-bit groups of `addr` with those of `suffix`
pub fn apply_ipv6_suffix(addr: Ipv6Addr, suffix: &str) -> Result<Ipv6Addr> {
    let parts = parse_ipv6_suffix(suffix)?;
    let mut segments = addr.segments();
    let start = segments.len() - parts.len();
    segments[start..].copy_from_slice(&parts);
    Ok(Ipv6Addr::from(segments))
}

/// Apply an optional suffix to an address of either family
pub fn apply_suffix(addr: IpAddr, suffix: Option<&str>) -> Result<IpAddr> {
    match (addr, suffix) {
        (addr, None) => Ok(addr),
        (IpAddr::V4(v4), Some(suffix)) => apply_ipv4_suffix(v4, suffix).map(IpAddr::V4),
        (IpAddr::V6(v6), Some(suffix)) => apply_ipv6_suffix(v6, suffix).map(IpAddr::V6),
    }
}

/// Check that `suffix` is well formed for the given family
pub fn validate_suffix(version: IpVersion, suffix: &str) -> Result<()> {
    match version {
        IpVersion::V4 => parse_ipv4_suffix(suffix).map(|_| ()),
        IpVersion::V6 => parse_ipv6_suffix(suffix).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn v6(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_ipv4_last_octet() {
        assert_eq!(
            apply_ipv4_suffix(v4("203.0.113.7"), "42").unwrap(),
            v4("203.0.113.42")
        );
    }

    #[test]
    fn test_ipv4_two_octets() {
        assert_eq!(
            apply_ipv4_suffix(v4("203.0.113.7"), "1.42").unwrap(),
            v4("203.0.1.42")
        );
    }

    #[test]
    fn test_ipv4_full_replacement() {
        assert_eq!(
            apply_ipv4_suffix(v4("203.0.113.7"), "10.0.0.1").unwrap(),
            v4("10.0.0.1")
        );
    }

    #[test]
    fn test_ipv4_invalid() {
        assert!(apply_ipv4_suffix(v4("203.0.113.7"), "").is_err());
        assert!(apply_ipv4_suffix(v4("203.0.113.7"), "256").is_err());
        assert!(apply_ipv4_suffix(v4("203.0.113.7"), "1.2.3.4.5").is_err());
        assert!(apply_ipv4_suffix(v4("203.0.113.7"), "1..2").is_err());
        assert!(apply_ipv4_suffix(v4("203.0.113.7"), "x").is_err());
    }

    #[test]
    fn test_ipv6_interface_id() {
        assert_eq!(
            apply_ipv6_suffix(v6("2001:db8:1:2:a:b:c:d"), "0:0:0:1").unwrap(),
            v6("2001:db8:1:2::1")
        );
    }

    #[test]
    fn test_ipv6_compressed_input() {
        // The discovered address is compressed; groups are replaced on the
        // expanded form.
        assert_eq!(
            apply_ipv6_suffix(v6("2001:db8::1"), "abcd:1").unwrap(),
            v6("2001:db8::abcd:1")
        );
    }

    #[test]
    fn test_ipv6_leading_double_colon() {
        assert_eq!(
            apply_ipv6_suffix(v6("2001:db8:1:2:a:b:c:d"), "::5").unwrap(),
            v6("2001:db8:1:2:a:b:c:5")
        );
    }

    #[test]
    fn test_ipv6_invalid() {
        assert!(apply_ipv6_suffix(v6("2001:db8::1"), "::").is_err());
        assert!(apply_ipv6_suffix(v6("2001:db8::1"), "12345").is_err());
        assert!(apply_ipv6_suffix(v6("2001:db8::1"), "g").is_err());
        assert!(apply_ipv6_suffix(v6("2001:db8::1"), "1::2").is_err());
        assert!(apply_ipv6_suffix(v6("2001:db8::1"), "1:2:3:4:5:6:7:8:9").is_err());
    }

    #[test]
    fn test_apply_suffix_dispatches_by_family() {
        let addr: IpAddr = "198.51.100.1".parse().unwrap();
        assert_eq!(apply_suffix(addr, None).unwrap(), addr);
        assert_eq!(
            apply_suffix(addr, Some("9")).unwrap(),
            "198.51.100.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_validate_suffix() {
        assert!(validate_suffix(IpVersion::V4, "1.2").is_ok());
        assert!(validate_suffix(IpVersion::V4, "::1").is_err());
        assert!(validate_suffix(IpVersion::V6, "::1").is_ok());
        assert!(validate_suffix(IpVersion::V6, "1.2").is_err());
    }
}
