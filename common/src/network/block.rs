//! # Candidate Address Blocks
//!
//! One contiguous block of candidate IPv4 addresses, parsed from CIDR
//! notation (e.g., `203.0.113.0/24`) or a bare address literal.
//!
//! Malformed input yields the invalid sentinel (`mask == -1`): it draws
//! nothing, and callers must filter it out before probing.

use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrBlock {
    base: Ipv4Addr,
    mask: i64,
}

impl AddrBlock {
    /// Parses CIDR text or a bare IPv4 literal. A bare literal (and a `/32`
    /// block) covers exactly one address. Anything unparseable becomes the
    /// invalid sentinel.
    pub fn parse(text: &str) -> Self {
        if let Ok(net) = Ipv4Network::from_str(text) {
            let host_bits = 32 - u32::from(net.prefix());
            let mask = if host_bits == 0 {
                0
            } else {
                (1i64 << host_bits) - 1
            };
            return Self {
                base: net.ip(),
                mask,
            };
        }
        warn!(text, "invalid candidate block");
        Self {
            base: Ipv4Addr::UNSPECIFIED,
            mask: -1,
        }
    }

    /// A block covering exactly `addr`.
    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            base: addr,
            mask: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.mask >= 0
    }

    /// Number of drawable addresses; zero for the invalid sentinel.
    pub fn size(&self) -> u64 {
        (self.mask + 1) as u64
    }

    /// Draws one uniformly random address by combining the fixed prefix
    /// bits with random low bits. Single-address blocks return their
    /// address unchanged.
    pub fn rand_addr(&self) -> Ipv4Addr {
        if self.mask > 0 {
            let low_bits: u32 = rand::rng().random_range(0..=self.mask as u32);
            return Ipv4Addr::from(u32::from(self.base) | low_bits);
        }
        self.base
    }
}
