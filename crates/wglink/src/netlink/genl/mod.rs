//! Generic netlink (GENL) support.
//!
//! The wireguard kernel module registers a generic netlink family for
//! device configuration. This module provides the pieces needed to talk
//! to it: family id resolution through the fixed control family, the
//! GENL message header, and a per-request transport.

mod family;
mod header;
mod transport;

pub use family::{FamilyId, resolve_family};
pub use header::{GENL_HDRLEN, GenlMsgHdr};
pub use transport::GenlTransport;

/// Control family id (fixed, not dynamically assigned).
pub const GENL_ID_CTRL: u16 = 0x10;

/// Control family commands.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlCmd {
    Unspec = 0,
    NewFamily = 1,
    DelFamily = 2,
    GetFamily = 3,
}

/// Control family attributes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlAttr {
    Unspec = 0,
    FamilyId = 1,
    FamilyName = 2,
    Version = 3,
    HdrSize = 4,
    MaxAttr = 5,
}
