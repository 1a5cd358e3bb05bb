//! Mapping from an AS number to the internal /24 LAN of its router.
//!
//! The decimal digits are split into up to three blocks of at most two digits
//! (`12`, `12.3`, `12.34`, `12.34.5`, `12.34.56`); a lone `0` block becomes `110`, a two digit
//! block with a leading zero `0X` becomes `100 + X`, and missing blocks are `0`. The router
//! address is host `.1` of that /24.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::as_graph::ASN;
use crate::error::{Error, Result};

const MAX_DIGITS: usize = 6;

fn fix_block(block: Option<&str>) -> u8 {
    match block {
        None => 0,
        Some("0") => 110,
        Some(b) if b.len() == 2 && b.starts_with('0') => 100 + (b.as_bytes()[1] - b'0'),
        // at most two decimal digits, so always below 100
        Some(b) => b.parse().unwrap_or(0),
    }
}

fn split_blocks(digits: &str) -> [Option<&str>; 3] {
    let block = |from: usize, to: usize| {
        if from < digits.len() {
            Some(&digits[from..to.min(digits.len())])
        } else {
            None
        }
    };
    [block(0, 2), block(2, 4), block(4, 6)]
}

/// Address of the router on its internal LAN, e.g. `65.11.0.1` for AS 6511.
pub fn internal_lan(asn: ASN) -> Result<Ipv4Addr> {
    let digits = asn.to_string();
    if digits.len() > MAX_DIGITS {
        return Err(Error::AsnOutOfRange(asn));
    }
    let [b1, b2, b3] = split_blocks(&digits).map(fix_block);
    Ok(Ipv4Addr::new(b1, b2, b3, 1))
}

/// The internal /24 of `asn`.
pub fn internal_prefix(asn: ASN) -> Result<Ipv4Network> {
    let [a, b, c, _] = internal_lan(asn)?.octets();
    Ok(Ipv4Network::new(Ipv4Addr::new(a, b, c, 0), 24)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_layouts() {
        assert_eq!(internal_lan(7).unwrap(), Ipv4Addr::new(7, 0, 0, 1));
        assert_eq!(internal_lan(42).unwrap(), Ipv4Addr::new(42, 0, 0, 1));
        assert_eq!(internal_lan(123).unwrap(), Ipv4Addr::new(12, 3, 0, 1));
        assert_eq!(internal_lan(1234).unwrap(), Ipv4Addr::new(12, 34, 0, 1));
        assert_eq!(internal_lan(12345).unwrap(), Ipv4Addr::new(12, 34, 5, 1));
        assert_eq!(internal_lan(123456).unwrap(), Ipv4Addr::new(12, 34, 56, 1));
    }

    #[test]
    fn test_zero_blocks() {
        // "10" "0"
        assert_eq!(internal_lan(100).unwrap(), Ipv4Addr::new(10, 110, 0, 1));
        // "10" "05"
        assert_eq!(internal_lan(1005).unwrap(), Ipv4Addr::new(10, 105, 0, 1));
        // "10" "00" "0"
        assert_eq!(internal_lan(10000).unwrap(), Ipv4Addr::new(10, 100, 110, 1));
        assert_eq!(internal_lan(0).unwrap(), Ipv4Addr::new(110, 0, 0, 1));
    }

    #[test]
    fn test_prefix() {
        assert_eq!(
            internal_prefix(65001).unwrap(),
            "65.100.1.0/24".parse::<Ipv4Network>().unwrap()
        );
    }

    #[test]
    fn test_seven_digits_rejected() {
        assert!(matches!(
            internal_lan(1_000_000),
            Err(Error::AsnOutOfRange(1_000_000))
        ));
    }
}
