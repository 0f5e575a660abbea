//! Get/set device commands for the wireguard family.

use super::types::{
    AllowedIp, WgDevice, WgPeer, decode_endpoint, decode_timestamp, encode_endpoint,
};
use super::{
    WG_GENL_VERSION, WgAllowedIpAttr, WgCmd, WgDeviceAttr, WgDeviceFlag, WgPeerAttr,
};
use crate::config::{PeerSpec, TunnelConfig};
use crate::netlink::attr::{AttrIter, NLA_F_NESTED, get};
use crate::netlink::genl::{FamilyId, GENL_HDRLEN, GenlTransport};
use crate::netlink::{Error, MessageBuilder, Result};

/// Client for the wireguard generic netlink family.
///
/// Holds nothing but the resolved family id; every request runs on its
/// own scoped channel.
pub struct WgClient {
    transport: GenlTransport,
}

impl WgClient {
    /// Create a client for an already-resolved family id.
    pub fn new(family: FamilyId) -> Self {
        Self {
            transport: GenlTransport::new(family, WG_GENL_VERSION),
        }
    }

    /// Read the current state of a device.
    ///
    /// Issues a dump keyed by interface name; large peer lists span
    /// multiple response messages, which are folded into one snapshot.
    pub async fn get_device(&self, name: &str) -> Result<WgDevice> {
        let responses = self
            .transport
            .dump(WgCmd::GetDevice as u8, "get_device", |builder| {
                builder.append_attr_str(WgDeviceAttr::Ifname as u16, name);
            })
            .await
            .map_err(|e| not_wireguard(e, name))?;

        if responses.is_empty() {
            return Err(Error::InterfaceNotFound {
                name: name.to_string(),
            });
        }

        let mut device = WgDevice::default();
        for response in &responses {
            if response.len() < GENL_HDRLEN {
                continue;
            }
            parse_device_attrs(&response[GENL_HDRLEN..], &mut device)?;
        }

        Ok(device)
    }

    /// Push a tunnel configuration into the kernel.
    ///
    /// With `replace_peers`, the configured peer list becomes the
    /// device's entire peer set; otherwise the peers are merged into
    /// the existing set and omitted peers are left untouched. This is
    /// the only place where that choice is made.
    pub async fn configure_device(
        &self,
        name: &str,
        config: &TunnelConfig,
        replace_peers: bool,
    ) -> Result<()> {
        self.transport
            .ack(WgCmd::SetDevice as u8, "set_device", |builder| {
                write_device_attrs(builder, name, config, replace_peers);
            })
            .await
            .map_err(|e| not_wireguard(e, name))
    }

    /// Set only the device's firewall mark.
    pub async fn set_fwmark(&self, name: &str, fwmark: u32) -> Result<()> {
        self.transport
            .ack(WgCmd::SetDevice as u8, "set_fwmark", |builder| {
                builder.append_attr_str(WgDeviceAttr::Ifname as u16, name);
                builder.append_attr_u32(WgDeviceAttr::Fwmark as u16, fwmark);
            })
            .await
            .map_err(|e| not_wireguard(e, name))
    }
}

/// The family rejects commands on interfaces of another link type with
/// EOPNOTSUPP; surface that as a domain error naming the interface.
fn not_wireguard(err: Error, name: &str) -> Error {
    match err {
        Error::NotSupported(_) => Error::NotWireguard {
            name: name.to_string(),
        },
        other => other,
    }
}

// ============================================================================
// Request construction
// ============================================================================

/// Write the SET_DEVICE attribute map for a tunnel configuration.
fn write_device_attrs(
    builder: &mut MessageBuilder,
    name: &str,
    config: &TunnelConfig,
    replace_peers: bool,
) {
    builder.append_attr_str(WgDeviceAttr::Ifname as u16, name);

    if replace_peers {
        builder.append_attr_u32(
            WgDeviceAttr::Flags as u16,
            WgDeviceFlag::ReplacePeers as u32,
        );
    }

    builder.append_attr(WgDeviceAttr::PrivateKey as u16, &config.private_key);
    builder.append_attr_u16(WgDeviceAttr::ListenPort as u16, config.listen_port);
    builder.append_attr_u32(WgDeviceAttr::Fwmark as u16, config.fwmark);

    if !config.peers.is_empty() {
        let peers = builder.nest_start(WgDeviceAttr::Peers as u16 | NLA_F_NESTED);
        for (idx, peer) in config.peers.iter().enumerate() {
            write_peer_attrs(builder, idx as u16, peer);
        }
        builder.nest_end(peers);
    }
}

/// Write one peer entry, keyed by its position in the peer list.
fn write_peer_attrs(builder: &mut MessageBuilder, idx: u16, peer: &PeerSpec) {
    let entry = builder.nest_start(idx | NLA_F_NESTED);

    builder.append_attr(WgPeerAttr::PublicKey as u16, &peer.public_key);

    // All-zero is the wire sentinel for "no preshared key"; such a key
    // is never sent.
    if let Some(psk) = peer.effective_preshared_key() {
        builder.append_attr(WgPeerAttr::PresharedKey as u16, psk);
    }

    if let Some(ref endpoint) = peer.endpoint {
        builder.append_attr(WgPeerAttr::Endpoint as u16, &encode_endpoint(endpoint));
    }

    if peer.persistent_keepalive > 0 {
        builder.append_attr_u16(
            WgPeerAttr::PersistentKeepalive as u16,
            peer.persistent_keepalive,
        );
    }

    if !peer.allowed_ips.is_empty() {
        let ips = builder.nest_start(WgPeerAttr::AllowedIps as u16 | NLA_F_NESTED);
        for (ip_idx, allowed_ip) in peer.allowed_ips.iter().enumerate() {
            let ip_entry = builder.nest_start(ip_idx as u16 | NLA_F_NESTED);
            builder.append_attr_u16(WgAllowedIpAttr::Family as u16, allowed_ip.family());
            builder.append_attr(WgAllowedIpAttr::IpAddr as u16, &allowed_ip.addr_bytes());
            builder.append_attr_u8(WgAllowedIpAttr::CidrMask as u16, allowed_ip.cidr);
            builder.nest_end(ip_entry);
        }
        builder.nest_end(ips);
    }

    builder.nest_end(entry);
}

// ============================================================================
// Response decoding
// ============================================================================

/// Fold one GET_DEVICE response message into the device snapshot.
fn parse_device_attrs(data: &[u8], device: &mut WgDevice) -> Result<()> {
    for attr in AttrIter::new(data) {
        let (tag, payload) = attr?;
        match WgDeviceAttr::from(tag) {
            WgDeviceAttr::Ifname => device.name = get::string(payload)?.to_string(),
            WgDeviceAttr::PrivateKey => device.private_key = Some(device_key(payload)?),
            WgDeviceAttr::PublicKey => device.public_key = Some(device_key(payload)?),
            WgDeviceAttr::ListenPort => device.listen_port = get::u16_ne(payload)?,
            WgDeviceAttr::Fwmark => device.fwmark = get::u32_ne(payload)?,
            WgDeviceAttr::Peers => parse_peers(payload, &mut device.peers)?,
            WgDeviceAttr::Unspec | WgDeviceAttr::Ifindex | WgDeviceAttr::Flags => {}
        }
    }
    Ok(())
}

/// Parse the nested peer list; entries are keyed by position.
fn parse_peers(data: &[u8], peers: &mut Vec<WgPeer>) -> Result<()> {
    for entry in AttrIter::new(data) {
        let (_idx, peer_data) = entry?;
        peers.push(parse_peer_attrs(peer_data)?);
    }
    Ok(())
}

/// Parse one peer entry.
fn parse_peer_attrs(data: &[u8]) -> Result<WgPeer> {
    let mut peer = WgPeer::default();

    for attr in AttrIter::new(data) {
        let (tag, payload) = attr?;
        match WgPeerAttr::from(tag) {
            WgPeerAttr::PublicKey => peer.public_key = peer_key(payload)?,
            WgPeerAttr::PresharedKey => {
                let key = peer_key(payload)?;
                // The kernel reports an all-zero key when none is set.
                if key.iter().any(|&b| b != 0) {
                    peer.preshared_key = Some(key);
                }
            }
            WgPeerAttr::Endpoint => peer.endpoint = decode_endpoint(payload),
            WgPeerAttr::PersistentKeepalive => peer.persistent_keepalive = get::u16_ne(payload)?,
            WgPeerAttr::LastHandshake => peer.last_handshake = decode_timestamp(payload),
            WgPeerAttr::RxBytes => peer.rx_bytes = get::u64_ne(payload)?,
            WgPeerAttr::TxBytes => peer.tx_bytes = get::u64_ne(payload)?,
            WgPeerAttr::AllowedIps => parse_allowed_ips(payload, &mut peer.allowed_ips)?,
            WgPeerAttr::Unspec | WgPeerAttr::Flags => {}
        }
    }

    Ok(peer)
}

/// Parse the nested allowed-IP list of one peer.
fn parse_allowed_ips(data: &[u8], allowed_ips: &mut Vec<AllowedIp>) -> Result<()> {
    for entry in AttrIter::new(data) {
        let (_idx, ip_data) = entry?;
        if let Some(ip) = parse_allowed_ip_attrs(ip_data)? {
            allowed_ips.push(ip);
        }
    }
    Ok(())
}

/// Parse one allowed-IP entry; incomplete entries are skipped.
fn parse_allowed_ip_attrs(data: &[u8]) -> Result<Option<AllowedIp>> {
    let mut family: Option<u16> = None;
    let mut addr_bytes: Option<&[u8]> = None;
    let mut cidr: Option<u8> = None;

    for attr in AttrIter::new(data) {
        let (tag, payload) = attr?;
        match WgAllowedIpAttr::from(tag) {
            WgAllowedIpAttr::Family => family = Some(get::u16_ne(payload)?),
            WgAllowedIpAttr::IpAddr => addr_bytes = Some(payload),
            WgAllowedIpAttr::CidrMask => cidr = Some(get::u8(payload)?),
            WgAllowedIpAttr::Unspec => {}
        }
    }

    let (family, addr_bytes, cidr) = match (family, addr_bytes, cidr) {
        (Some(f), Some(a), Some(c)) => (f, a, c),
        _ => return Ok(None),
    };

    let addr = match family as i32 {
        libc::AF_INET if addr_bytes.len() >= 4 => std::net::IpAddr::V4(
            std::net::Ipv4Addr::new(addr_bytes[0], addr_bytes[1], addr_bytes[2], addr_bytes[3]),
        ),
        libc::AF_INET6 if addr_bytes.len() >= 16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&addr_bytes[..16]);
            std::net::IpAddr::V6(std::net::Ipv6Addr::from(octets))
        }
        _ => return Ok(None),
    };

    Ok(Some(AllowedIp { addr, cidr }))
}

fn device_key(payload: &[u8]) -> Result<[u8; 32]> {
    get::key(payload).map_err(|_| Error::InvalidAttribute("device key must be 32 bytes".into()))
}

fn peer_key(payload: &[u8]) -> Result<[u8; 32]> {
    get::key(payload).map_err(|_| Error::InvalidAttribute("peer key must be 32 bytes".into()))
}
