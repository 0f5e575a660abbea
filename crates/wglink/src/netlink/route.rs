//! Route management.

use std::net::IpAddr;

use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::Result;
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::types::route::{RtMsg, rt_scope, rt_table, rta, rtn, rtprot};

/// Builder for a unicast route through a device.
///
/// Covers the two shapes this crate installs: a direct route for an
/// allowed-IP prefix in the main table, and the catch-all route in a
/// tunnel's dedicated table.
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    destination: IpAddr,
    prefix_len: u8,
    oif: Option<u32>,
    table: u32,
}

impl RouteBuilder {
    /// Create a new route towards `destination/prefix_len`.
    pub fn new(destination: IpAddr, prefix_len: u8) -> Self {
        Self {
            destination,
            prefix_len,
            oif: None,
            table: rt_table::MAIN,
        }
    }

    /// Set the output interface by index.
    pub fn oif(mut self, ifindex: u32) -> Self {
        self.oif = Some(ifindex);
        self
    }

    /// Set the routing table.
    pub fn table(mut self, table: u32) -> Self {
        self.table = table;
        self
    }

    fn family(&self) -> u8 {
        match self.destination {
            IpAddr::V4(_) => libc::AF_INET as u8,
            IpAddr::V6(_) => libc::AF_INET6 as u8,
        }
    }

    /// Build the RTM_NEWROUTE message for this route.
    pub(crate) fn build(&self) -> MessageBuilder {
        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWROUTE,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        );

        let table_u8 = if self.table > 255 {
            rt_table::UNSPEC
        } else {
            self.table as u8
        };

        let rtmsg = RtMsg::new()
            .with_family(self.family())
            .with_dst_len(self.prefix_len)
            .with_table(table_u8)
            .with_protocol(rtprot::BOOT)
            .with_scope(if self.oif.is_some() {
                rt_scope::LINK
            } else {
                rt_scope::UNIVERSE
            })
            .with_type(rtn::UNICAST);

        builder.append(&rtmsg);

        // RTA_DST (absent for the catch-all prefix)
        if self.prefix_len > 0 {
            match self.destination {
                IpAddr::V4(v4) => builder.append_attr(rta::DST, &v4.octets()),
                IpAddr::V6(v6) => builder.append_attr(rta::DST, &v6.octets()),
            }
        }

        // RTA_OIF
        if let Some(ifindex) = self.oif {
            builder.append_attr_u32(rta::OIF, ifindex);
        }

        // RTA_TABLE (for table ids beyond the u8 header field)
        if self.table > 255 {
            builder.append_attr_u32(rta::TABLE, self.table);
        }

        builder
    }
}

impl Connection {
    /// Install a route.
    pub async fn add_route(&self, route: RouteBuilder) -> Result<()> {
        self.request_ack(route.build()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{AttrIter, get};
    use crate::netlink::message::NLMSG_HDRLEN;
    use std::net::Ipv4Addr;

    fn attrs_of(msg: &[u8]) -> Vec<(u16, Vec<u8>)> {
        let start = NLMSG_HDRLEN + std::mem::size_of::<RtMsg>();
        AttrIter::new(&msg[start..])
            .map(|r| r.map(|(t, v)| (t, v.to_vec())))
            .collect::<crate::netlink::error::Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_direct_route() {
        let msg = RouteBuilder::new(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 0)), 24)
            .oif(5)
            .build()
            .finish();

        let rtmsg = &msg[NLMSG_HDRLEN..];
        assert_eq!(rtmsg[0], libc::AF_INET as u8);
        assert_eq!(rtmsg[1], 24);
        assert_eq!(rtmsg[4], 254); // main table

        let attrs = attrs_of(&msg);
        assert_eq!(attrs[0].0, rta::DST);
        assert_eq!(attrs[0].1, vec![10, 1, 2, 0]);
        assert_eq!(attrs[1].0, rta::OIF);
        assert_eq!(get::u32_ne(&attrs[1].1).unwrap(), 5);
    }

    #[test]
    fn test_catch_all_route_in_port_table() {
        let msg = RouteBuilder::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
            .oif(7)
            .table(51820)
            .build()
            .finish();

        let rtmsg = &msg[NLMSG_HDRLEN..];
        assert_eq!(rtmsg[1], 0);
        assert_eq!(rtmsg[4], rt_table::UNSPEC); // table id goes in RTA_TABLE

        let attrs = attrs_of(&msg);
        // No RTA_DST for the catch-all prefix.
        assert!(attrs.iter().all(|(t, _)| *t != rta::DST));
        let table = attrs.iter().find(|(t, _)| *t == rta::TABLE).unwrap();
        assert_eq!(get::u32_ne(&table.1).unwrap(), 51820);
    }
}
