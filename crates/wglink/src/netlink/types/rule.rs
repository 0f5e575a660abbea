//! Routing rule message types.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// FIB rule header (struct fib_rule_hdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct FibRuleHdr {
    /// Address family.
    pub family: u8,
    /// Destination prefix length.
    pub dst_len: u8,
    /// Source prefix length.
    pub src_len: u8,
    /// TOS.
    pub tos: u8,
    /// Routing table ID.
    pub table: u8,
    /// Reserved.
    pub res1: u8,
    /// Reserved.
    pub res2: u8,
    /// Action (FR_ACT_*).
    pub action: u8,
    /// Flags (FIB_RULE_*).
    pub flags: u32,
}

impl FibRuleHdr {
    /// Create a new rule header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address family.
    pub fn with_family(mut self, family: u8) -> Self {
        self.family = family;
        self
    }
}

/// Invert the rule match (the `not` keyword of `ip rule`).
pub const FIB_RULE_INVERT: u32 = 0x2;

/// FIB rule attributes (FRA_*), subset used by this crate.
pub mod fra {
    pub const PRIORITY: u16 = 6;
    pub const FWMARK: u16 = 10;
    pub const SUPPRESS_PREFIXLEN: u16 = 14;
    pub const TABLE: u16 = 15;
}

/// FIB rule actions (FR_ACT_*).
pub mod fr_act {
    pub const UNSPEC: u8 = 0;
    pub const TO_TBL: u8 = 1;
}
