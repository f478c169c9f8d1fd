//! CIDR string parsing.
//!
//! Accepts `"<IPv4 literal>/<0-32>"`. IPv6 literals are rejected explicitly.

use std::net::IpAddr;

use ipnet::Ipv4Net;

use crate::error::{PolicyError, Result};

/// Parse a CIDR string. The host bits are kept; registries normalize them.
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Net> {
    let cidr = cidr.trim();

    let (addr_str, len_str) = cidr
        .split_once('/')
        .ok_or_else(|| PolicyError::InvalidCidr(format!("missing '/' in '{}'", cidr)))?;

    let addr: IpAddr = addr_str
        .parse()
        .map_err(|_| PolicyError::InvalidIp(addr_str.to_string()))?;
    let addr = match addr {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => return Err(PolicyError::UnsupportedAddressFamily(addr)),
    };

    let prefix_len: u8 = len_str
        .parse()
        .map_err(|_| PolicyError::InvalidCidr(format!("invalid mask length in '{}'", cidr)))?;

    Ipv4Net::new(addr, prefix_len).map_err(|_| {
        PolicyError::InvalidCidr(format!("mask length {} exceeds 32 in '{}'", prefix_len, cidr))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr() {
        let net = parse_cidr("10.0.0.0/8").unwrap();
        assert_eq!(net.addr().octets(), [10, 0, 0, 0]);
        assert_eq!(net.prefix_len(), 8);

        let net = parse_cidr(" 1.2.3.4/16 ").unwrap();
        assert_eq!(net.addr().octets(), [1, 2, 3, 4]);
        assert_eq!(net.prefix_len(), 16);

        assert_eq!(parse_cidr("0.0.0.0/0").unwrap().prefix_len(), 0);
        assert_eq!(parse_cidr("1.2.3.4/32").unwrap().prefix_len(), 32);
    }

    #[test]
    fn test_parse_cidr_missing_slash() {
        let err = parse_cidr("10.0.0.0").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidCidr(_)));
        assert!(format!("{}", err).contains("missing '/'"));
    }

    #[test]
    fn test_parse_cidr_bad_address() {
        assert!(matches!(
            parse_cidr("10.0.0/8").unwrap_err(),
            PolicyError::InvalidIp(_)
        ));
    }

    #[test]
    fn test_parse_cidr_mask_too_long() {
        let err = parse_cidr("10.0.0.0/33").unwrap_err();
        assert!(format!("{}", err).contains("exceeds 32"), "got: {}", err);
        assert!(parse_cidr("10.0.0.0/x").is_err());
        assert!(parse_cidr("10.0.0.0/-1").is_err());
    }

    #[test]
    fn test_parse_cidr_rejects_ipv6() {
        assert!(matches!(
            parse_cidr("2001:db8::/32").unwrap_err(),
            PolicyError::UnsupportedAddressFamily(_)
        ));
    }
}
