//! Allocation of the /30 blocks used for inter-AS links.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::error::{Error, Result};

/// First block handed out.
pub const POOL_START: Ipv4Addr = Ipv4Addr::new(120, 0, 0, 0);
/// Value an octet restarts from when the octet to its right overflows.
const CARRY_RESET: u16 = 120;
const LINK_STEP: u16 = 4;
const LAST_LINK_OCTET: u16 = 252;

/// Cursor position following `cursor`.
///
/// The last octet moves in steps of four. Past 252 it wraps to 0 and carries into the third
/// octet; the second and third octets restart from 120 when they overflow. Overflowing the first
/// octet exhausts the pool.
pub fn advance(cursor: Ipv4Addr) -> Result<Ipv4Addr> {
    let [mut a, mut b, mut c, mut d] = cursor.octets().map(u16::from);
    d += LINK_STEP;
    if d > LAST_LINK_OCTET {
        d = 0;
        c += 1;
        if c > 255 {
            c = CARRY_RESET;
            b += 1;
            if b > 255 {
                b = CARRY_RESET;
                a += 1;
                if a > 255 {
                    return Err(Error::AddressPoolExhausted);
                }
            }
        }
    }
    Ok(Ipv4Addr::new(a as u8, b as u8, c as u8, d as u8))
}

/// One allocated /30. Host `.1` and `.2` are the two link ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkBlock {
    base: Ipv4Addr,
}

impl LinkBlock {
    pub fn base(&self) -> Ipv4Addr {
        self.base
    }

    /// Address `base + offset`, `None` outside the /30.
    pub fn host(&self, offset: u8) -> Option<Ipv4Addr> {
        if offset > 3 {
            return None;
        }
        let [a, b, c, d] = self.base.octets();
        Some(Ipv4Addr::new(a, b, c, d + offset))
    }

    pub fn network(&self) -> Result<Ipv4Network> {
        Ok(Ipv4Network::new(self.base, 30)?)
    }
}

/// Explicit allocator state, owned by one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAllocator {
    cursor: Ipv4Addr,
}

impl LinkAllocator {
    pub fn new() -> Self {
        Self::starting_at(POOL_START)
    }

    pub fn starting_at(cursor: Ipv4Addr) -> Self {
        LinkAllocator { cursor }
    }

    pub fn cursor(&self) -> Ipv4Addr {
        self.cursor
    }

    /// Hand out the block under the cursor and move the cursor forward.
    ///
    /// Fails without returning the current block when moving the cursor exhausts the pool.
    pub fn allocate(&mut self) -> Result<LinkBlock> {
        let base = self.cursor;
        self.cursor = advance(base)?;
        Ok(LinkBlock { base })
    }
}

impl Default for LinkAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_and_wrap() {
        assert_eq!(
            advance(Ipv4Addr::new(120, 0, 0, 0)).unwrap(),
            Ipv4Addr::new(120, 0, 0, 4)
        );
        assert_eq!(
            advance(Ipv4Addr::new(120, 0, 0, 252)).unwrap(),
            Ipv4Addr::new(120, 0, 1, 0)
        );
    }

    #[test]
    fn test_carry_restarts_from_120() {
        assert_eq!(
            advance(Ipv4Addr::new(120, 0, 255, 252)).unwrap(),
            Ipv4Addr::new(120, 1, 120, 0)
        );
        assert_eq!(
            advance(Ipv4Addr::new(120, 255, 255, 252)).unwrap(),
            Ipv4Addr::new(121, 120, 120, 0)
        );
    }

    #[test]
    fn test_exhaustion() {
        assert!(matches!(
            advance(Ipv4Addr::new(255, 255, 255, 252)),
            Err(Error::AddressPoolExhausted)
        ));
        let mut allocator = LinkAllocator::starting_at(Ipv4Addr::new(255, 255, 255, 252));
        assert!(allocator.allocate().is_err());
        // a failed allocation leaves the cursor untouched
        assert_eq!(allocator.cursor(), Ipv4Addr::new(255, 255, 255, 252));
    }

    #[test]
    fn test_hosts() {
        let mut allocator = LinkAllocator::new();
        let first = allocator.allocate().unwrap();
        let second = allocator.allocate().unwrap();
        assert_eq!(first.host(1), Some(Ipv4Addr::new(120, 0, 0, 1)));
        assert_eq!(first.host(2), Some(Ipv4Addr::new(120, 0, 0, 2)));
        assert_eq!(second.base(), Ipv4Addr::new(120, 0, 0, 4));
    }

    #[test]
    fn test_host_stays_inside_the_block() {
        let mut allocator = LinkAllocator::starting_at(Ipv4Addr::new(120, 0, 0, 252));
        let last = allocator.allocate().unwrap();
        assert_eq!(last.host(3), Some(Ipv4Addr::new(120, 0, 0, 255)));
        assert_eq!(last.host(4), None);
        assert_eq!(last.host(u8::MAX), None);
    }
}
