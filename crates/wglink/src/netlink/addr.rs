//! Interface address management.

use std::net::IpAddr;

use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::Result;
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::types::addr::{IfAddrMsg, ifa};
use crate::util::ifname;

/// Build the RTM_NEWADDR message for one interface address.
fn build_add(ifindex: u32, address: IpAddr, prefix_len: u8) -> MessageBuilder {
    let mut builder = MessageBuilder::new(
        NlMsgType::RTM_NEWADDR,
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
    );

    match address {
        IpAddr::V4(v4) => {
            let ifaddr = IfAddrMsg::new()
                .with_family(libc::AF_INET as u8)
                .with_prefixlen(prefix_len)
                .with_index(ifindex);
            builder.append(&ifaddr);
            // Point-to-point-less interface: local and address coincide.
            builder.append_attr(ifa::LOCAL, &v4.octets());
            builder.append_attr(ifa::ADDRESS, &v4.octets());
        }
        IpAddr::V6(v6) => {
            let ifaddr = IfAddrMsg::new()
                .with_family(libc::AF_INET6 as u8)
                .with_prefixlen(prefix_len)
                .with_index(ifindex);
            builder.append(&ifaddr);
            builder.append_attr(ifa::ADDRESS, &v6.octets());
        }
    }

    builder
}

impl Connection {
    /// Assign an address/prefix to an interface.
    pub async fn add_address(&self, name: &str, address: IpAddr, prefix_len: u8) -> Result<()> {
        let ifindex = ifname::name_to_index(name)?;
        self.request_ack(build_add(ifindex, address, prefix_len))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::AttrIter;
    use crate::netlink::message::NLMSG_HDRLEN;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_build_add_v4() {
        let msg = build_add(3, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 24).finish();

        let hdr_end = NLMSG_HDRLEN + std::mem::size_of::<IfAddrMsg>();
        let ifaddr = &msg[NLMSG_HDRLEN..hdr_end];
        assert_eq!(ifaddr[0], libc::AF_INET as u8);
        assert_eq!(ifaddr[1], 24);

        let attrs: Vec<_> = AttrIter::new(&msg[hdr_end..])
            .collect::<crate::netlink::error::Result<_>>()
            .unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].0, ifa::LOCAL);
        assert_eq!(attrs[0].1, &[10, 0, 0, 1]);
        assert_eq!(attrs[1].0, ifa::ADDRESS);
    }

    #[test]
    fn test_build_add_v6() {
        let ip: Ipv6Addr = "fd00::1".parse().unwrap();
        let msg = build_add(3, IpAddr::V6(ip), 64).finish();

        let hdr_end = NLMSG_HDRLEN + std::mem::size_of::<IfAddrMsg>();
        assert_eq!(msg[NLMSG_HDRLEN], libc::AF_INET6 as u8);

        let attrs: Vec<_> = AttrIter::new(&msg[hdr_end..])
            .collect::<crate::netlink::error::Result<_>>()
            .unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].0, ifa::ADDRESS);
        assert_eq!(attrs[0].1, &ip.octets());
    }
}
