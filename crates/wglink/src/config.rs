//! In-memory tunnel configuration.
//!
//! The configuration is produced and validated elsewhere (the YAML
//! layer owns parsing, key-file loading and semantic checks); this
//! crate only consumes the resulting value. Keys are fixed 32-byte
//! arrays, so wire-level encodability is enforced by construction.

use std::net::{IpAddr, SocketAddr};

use crate::wg::{AllowedIp, KEY_LEN};

/// Configuration for one WireGuard tunnel.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Free-form description; not pushed to the kernel.
    pub description: String,
    /// Address and prefix length to assign to the interface.
    pub address: Option<(IpAddr, u8)>,
    /// UDP listen port. Required and non-zero; also reused as the id of
    /// the tunnel's dedicated routing table.
    pub listen_port: u16,
    /// The interface's private key.
    pub private_key: [u8; KEY_LEN],
    /// Firewall mark for outgoing tunnel packets (0 = unset).
    pub fwmark: u32,
    /// Peers, in configuration order.
    pub peers: Vec<PeerSpec>,
    /// Hook argument vectors run after bring-up. Execution is owned by
    /// the caller; the core only carries the data.
    pub post_up: Vec<Vec<String>>,
    /// Hook argument vectors run before teardown.
    pub pre_down: Vec<Vec<String>>,
    /// Whether to install routes for the peers' allowed IPs.
    pub set_up_routes: bool,
}

impl TunnelConfig {
    /// Create a configuration with the required fields; routes are set
    /// up by default.
    pub fn new(listen_port: u16, private_key: [u8; KEY_LEN]) -> Self {
        Self {
            description: String::new(),
            address: None,
            listen_port,
            private_key,
            fwmark: 0,
            peers: Vec::new(),
            post_up: Vec::new(),
            pre_down: Vec::new(),
            set_up_routes: true,
        }
    }

    /// Look up a peer by its public key.
    pub fn peer(&self, public_key: &[u8; KEY_LEN]) -> Option<&PeerSpec> {
        self.peers.iter().find(|p| &p.public_key == public_key)
    }
}

/// Configuration for one peer of a tunnel.
#[derive(Debug, Clone)]
pub struct PeerSpec {
    /// Free-form description; not pushed to the kernel.
    pub description: String,
    /// The peer's public key; unique within a configuration.
    pub public_key: [u8; KEY_LEN],
    /// Optional preshared key. An all-zero key is the sentinel for
    /// "none" and is treated as absent.
    pub preshared_key: Option<[u8; KEY_LEN]>,
    /// The peer's UDP endpoint, when known up front.
    pub endpoint: Option<SocketAddr>,
    /// Allowed IP prefixes routed to this peer.
    pub allowed_ips: Vec<AllowedIp>,
    /// Persistent keepalive interval in seconds (0 = disabled).
    pub persistent_keepalive: u16,
}

impl PeerSpec {
    /// Create a peer with the given public key.
    pub fn new(public_key: [u8; KEY_LEN]) -> Self {
        Self {
            description: String::new(),
            public_key,
            preshared_key: None,
            endpoint: None,
            allowed_ips: Vec::new(),
            persistent_keepalive: 0,
        }
    }

    /// The preshared key, with the all-zero sentinel mapped to `None`.
    pub fn effective_preshared_key(&self) -> Option<&[u8; KEY_LEN]> {
        self.preshared_key
            .as_ref()
            .filter(|key| key.iter().any(|&b| b != 0))
    }

    /// Whether any allowed-IP prefix is the catch-all, making this a
    /// full-tunnel peer.
    pub fn is_full_tunnel(&self) -> bool {
        self.allowed_ips.iter().any(AllowedIp::is_catch_all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_routes_default_on() {
        let config = TunnelConfig::new(51820, [1u8; KEY_LEN]);
        assert!(config.set_up_routes);
        assert_eq!(config.fwmark, 0);
    }

    #[test]
    fn test_peer_lookup() {
        let mut config = TunnelConfig::new(51820, [1u8; KEY_LEN]);
        config.peers.push(PeerSpec::new([2u8; KEY_LEN]));
        config.peers.push(PeerSpec::new([3u8; KEY_LEN]));

        assert!(config.peer(&[3u8; KEY_LEN]).is_some());
        assert!(config.peer(&[9u8; KEY_LEN]).is_none());
    }

    #[test]
    fn test_preshared_key_sentinel() {
        let mut peer = PeerSpec::new([2u8; KEY_LEN]);
        assert!(peer.effective_preshared_key().is_none());

        peer.preshared_key = Some([0u8; KEY_LEN]);
        assert!(peer.effective_preshared_key().is_none());

        peer.preshared_key = Some([5u8; KEY_LEN]);
        assert_eq!(peer.effective_preshared_key(), Some(&[5u8; KEY_LEN]));
    }

    #[test]
    fn test_full_tunnel_detection() {
        let mut peer = PeerSpec::new([2u8; KEY_LEN]);
        peer.allowed_ips
            .push(AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24));
        assert!(!peer.is_full_tunnel());

        peer.allowed_ips
            .push(AllowedIp::v4(Ipv4Addr::UNSPECIFIED, 0));
        assert!(peer.is_full_tunnel());
    }
}
