//! WireGuard generic netlink protocol: attribute vocabulary, wire
//! records, and the get/set device commands.
//!
//! The numeric tags in this module are protocol constants fixed by the
//! kernel module; they must match it exactly.

mod device;
mod types;

pub use device::WgClient;
pub use types::{
    AllowedIp, KEY_LEN, WgDevice, WgPeer, decode_endpoint, decode_timestamp, encode_endpoint,
};

/// WireGuard generic netlink family name.
pub const WG_GENL_NAME: &str = "wireguard";

/// WireGuard generic netlink protocol version.
pub const WG_GENL_VERSION: u8 = 1;

/// WireGuard GENL commands.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgCmd {
    GetDevice = 0,
    SetDevice = 1,
}

/// WireGuard device attributes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgDeviceAttr {
    Unspec = 0,
    Ifindex = 1,
    Ifname = 2,
    PrivateKey = 3,
    PublicKey = 4,
    Flags = 5,
    ListenPort = 6,
    Fwmark = 7,
    Peers = 8,
}

impl From<u16> for WgDeviceAttr {
    fn from(val: u16) -> Self {
        match val {
            1 => Self::Ifindex,
            2 => Self::Ifname,
            3 => Self::PrivateKey,
            4 => Self::PublicKey,
            5 => Self::Flags,
            6 => Self::ListenPort,
            7 => Self::Fwmark,
            8 => Self::Peers,
            _ => Self::Unspec,
        }
    }
}

/// WireGuard peer attributes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgPeerAttr {
    Unspec = 0,
    PublicKey = 1,
    PresharedKey = 2,
    Flags = 3,
    Endpoint = 4,
    PersistentKeepalive = 5,
    LastHandshake = 6,
    RxBytes = 7,
    TxBytes = 8,
    AllowedIps = 9,
}

impl From<u16> for WgPeerAttr {
    fn from(val: u16) -> Self {
        match val {
            1 => Self::PublicKey,
            2 => Self::PresharedKey,
            3 => Self::Flags,
            4 => Self::Endpoint,
            5 => Self::PersistentKeepalive,
            6 => Self::LastHandshake,
            7 => Self::RxBytes,
            8 => Self::TxBytes,
            9 => Self::AllowedIps,
            _ => Self::Unspec,
        }
    }
}

/// WireGuard allowed IP attributes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgAllowedIpAttr {
    Unspec = 0,
    Family = 1,
    IpAddr = 2,
    CidrMask = 3,
}

impl From<u16> for WgAllowedIpAttr {
    fn from(val: u16) -> Self {
        match val {
            1 => Self::Family,
            2 => Self::IpAddr,
            3 => Self::CidrMask,
            _ => Self::Unspec,
        }
    }
}

/// WireGuard device flags.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgDeviceFlag {
    /// Replace all peers instead of merging.
    ReplacePeers = 1 << 0,
}
