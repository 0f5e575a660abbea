//! WireGuard device snapshot types and fixed-layout wire records.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Size of a WireGuard key in bytes.
pub const KEY_LEN: usize = 32;

/// Kernel-observed WireGuard device state.
///
/// This is a snapshot, reconstructed fresh on every query; nothing is
/// cached between reads.
#[derive(Debug, Clone, Default)]
pub struct WgDevice {
    /// Interface name.
    pub name: String,
    /// UDP listen port.
    pub listen_port: u16,
    /// Public key (derived from the private key).
    pub public_key: Option<[u8; KEY_LEN]>,
    /// Private key, as reported by the kernel.
    pub private_key: Option<[u8; KEY_LEN]>,
    /// Firewall mark for outgoing packets (0 = unset).
    pub fwmark: u32,
    /// Configured peers, in kernel iteration order.
    pub peers: Vec<WgPeer>,
}

impl WgDevice {
    /// Look up a peer by its public key.
    ///
    /// Peer order mirrors kernel iteration order and is not stable
    /// across calls; a specific peer is found by key, not by position.
    pub fn peer(&self, public_key: &[u8; KEY_LEN]) -> Option<&WgPeer> {
        self.peers.iter().find(|p| &p.public_key == public_key)
    }
}

/// Kernel-observed state of one peer.
#[derive(Debug, Clone, Default)]
pub struct WgPeer {
    /// Peer's public key (identifies the peer).
    pub public_key: [u8; KEY_LEN],
    /// Preshared key; all-zero on the wire means "none".
    pub preshared_key: Option<[u8; KEY_LEN]>,
    /// Peer's endpoint (IP:port).
    pub endpoint: Option<SocketAddr>,
    /// Allowed IP prefixes for this peer.
    pub allowed_ips: Vec<AllowedIp>,
    /// Last successful handshake; `None` means never.
    pub last_handshake: Option<SystemTime>,
    /// Persistent keepalive interval in seconds (0 = disabled).
    pub persistent_keepalive: u16,
    /// Cumulative bytes received from this peer.
    pub rx_bytes: u64,
    /// Cumulative bytes sent to this peer.
    pub tx_bytes: u64,
}

/// An allowed IP prefix for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedIp {
    /// IP address (network portion).
    pub addr: IpAddr,
    /// CIDR prefix length.
    pub cidr: u8,
}

impl AllowedIp {
    /// Create an IPv4 allowed IP prefix.
    pub fn v4(addr: Ipv4Addr, cidr: u8) -> Self {
        Self {
            addr: IpAddr::V4(addr),
            cidr: cidr.min(32),
        }
    }

    /// Create an IPv6 allowed IP prefix.
    pub fn v6(addr: Ipv6Addr, cidr: u8) -> Self {
        Self {
            addr: IpAddr::V6(addr),
            cidr: cidr.min(128),
        }
    }

    /// Get the address family (AF_INET or AF_INET6).
    pub fn family(&self) -> u16 {
        match self.addr {
            IpAddr::V4(_) => libc::AF_INET as u16,
            IpAddr::V6(_) => libc::AF_INET6 as u16,
        }
    }

    /// Get the address bytes.
    pub fn addr_bytes(&self) -> Vec<u8> {
        match self.addr {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }

    /// A zero-length prefix matches all addresses and triggers
    /// full-tunnel policy routing.
    pub fn is_catch_all(&self) -> bool {
        self.cidr == 0
    }
}

impl std::fmt::Display for AllowedIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.cidr)
    }
}

/// Encode a peer endpoint as the kernel's sockaddr record.
///
/// Layout: family (u16), port (u16), then the address, padded to the
/// native sockaddr size: 16 bytes for sockaddr_in, 28 for sockaddr_in6
/// (the 4 bytes before the v6 address are the flowinfo field).
///
/// The family field is little-endian while port and address are network
/// order. The asymmetry is a kernel ABI quirk; it must be reproduced
/// exactly, not normalized.
pub fn encode_endpoint(addr: &SocketAddr) -> Vec<u8> {
    match addr {
        SocketAddr::V4(v4) => {
            let mut buf = vec![0u8; 16];
            buf[0..2].copy_from_slice(&(libc::AF_INET as u16).to_le_bytes());
            buf[2..4].copy_from_slice(&v4.port().to_be_bytes());
            buf[4..8].copy_from_slice(&v4.ip().octets());
            buf
        }
        SocketAddr::V6(v6) => {
            let mut buf = vec![0u8; 28];
            buf[0..2].copy_from_slice(&(libc::AF_INET6 as u16).to_le_bytes());
            buf[2..4].copy_from_slice(&v6.port().to_be_bytes());
            buf[8..24].copy_from_slice(&v6.ip().octets());
            buf
        }
    }
}

/// Decode a kernel sockaddr record into an endpoint.
pub fn decode_endpoint(data: &[u8]) -> Option<SocketAddr> {
    if data.len() < 8 {
        return None;
    }

    let family = u16::from_le_bytes([data[0], data[1]]);
    let port = u16::from_be_bytes([data[2], data[3]]);

    match family as i32 {
        libc::AF_INET => {
            let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
            Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }
        libc::AF_INET6 if data.len() >= 24 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&data[8..24]);
            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(octets),
                port,
                0,
                0,
            )))
        }
        _ => None,
    }
}

/// Decode a last-handshake timestamp record.
///
/// Seconds since the epoch as a little-endian u32; all-zero means the
/// handshake never happened and decodes to `None` rather than an error.
pub fn decode_timestamp(data: &[u8]) -> Option<SystemTime> {
    if data.len() < 4 {
        return None;
    }

    let secs = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if secs == 0 {
        return None;
    }

    Some(UNIX_EPOCH + Duration::from_secs(secs as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_ip_v4() {
        let ip = AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 8);
        assert_eq!(ip.family(), libc::AF_INET as u16);
        assert_eq!(ip.addr_bytes(), vec![10, 0, 0, 0]);
        assert!(!ip.is_catch_all());
        assert_eq!(ip.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn test_allowed_ip_catch_all() {
        assert!(AllowedIp::v4(Ipv4Addr::UNSPECIFIED, 0).is_catch_all());
        assert!(AllowedIp::v6(Ipv6Addr::UNSPECIFIED, 0).is_catch_all());
        assert!(!AllowedIp::v6("fd00::".parse().unwrap(), 64).is_catch_all());
    }

    #[test]
    fn test_endpoint_v4_layout() {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 51820));
        let bytes = encode_endpoint(&addr);

        assert_eq!(bytes.len(), 16);
        // Family little-endian, port network order.
        assert_eq!(&bytes[0..2], &(libc::AF_INET as u16).to_le_bytes());
        assert_eq!(&bytes[2..4], &51820u16.to_be_bytes());
        assert_eq!(&bytes[4..8], &[192, 168, 1, 1]);
        assert_eq!(&bytes[8..16], &[0u8; 8]);

        assert_eq!(decode_endpoint(&bytes), Some(addr));
    }

    #[test]
    fn test_endpoint_v6_layout() {
        let ip: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let addr = SocketAddr::V6(SocketAddrV6::new(ip, 51820, 0, 0));
        let bytes = encode_endpoint(&addr);

        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[0..2], &(libc::AF_INET6 as u16).to_le_bytes());
        assert_eq!(&bytes[2..4], &51820u16.to_be_bytes());
        assert_eq!(&bytes[8..24], &ip.octets());

        assert_eq!(decode_endpoint(&bytes), Some(addr));
    }

    #[test]
    fn test_endpoint_decode_garbage() {
        assert_eq!(decode_endpoint(&[]), None);
        assert_eq!(decode_endpoint(&[0xff; 8]), None);
    }

    #[test]
    fn test_timestamp_zero_is_never() {
        assert_eq!(decode_timestamp(&[0u8; 4]), None);
        assert_eq!(decode_timestamp(&[]), None);
    }

    #[test]
    fn test_timestamp_decodes_to_epoch_offset() {
        let bytes = 1609459200u32.to_le_bytes();
        let time = decode_timestamp(&bytes).unwrap();
        assert_eq!(time, UNIX_EPOCH + Duration::from_secs(1609459200));
    }

    #[test]
    fn test_device_peer_lookup() {
        let mut device = WgDevice::default();
        device.peers.push(WgPeer {
            public_key: [1u8; KEY_LEN],
            ..Default::default()
        });
        device.peers.push(WgPeer {
            public_key: [2u8; KEY_LEN],
            ..Default::default()
        });

        assert!(device.peer(&[2u8; KEY_LEN]).is_some());
        assert!(device.peer(&[3u8; KEY_LEN]).is_none());
    }
}
