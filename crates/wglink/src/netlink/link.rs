//! Virtual link management.
//!
//! WireGuard link creation goes through standard rtnetlink; only the
//! configuration of keys and peers uses generic netlink.

use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::Result;
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::types::link::{IfInfoMsg, iff, ifla, ifla_info};
use crate::util::ifname;

/// Configuration for a wireguard-type virtual link.
///
/// The link is created empty; keys and peers are pushed afterwards via
/// the generic netlink family.
#[derive(Debug, Clone)]
pub struct WireguardLink {
    name: String,
    mtu: Option<u32>,
}

impl WireguardLink {
    /// Create a new wireguard link configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mtu: None,
        }
    }

    /// Set the MTU for this interface.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Build the RTM_NEWLINK message for creating this link.
    pub(crate) fn build(&self) -> MessageBuilder {
        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWLINK,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        );

        builder.append(&IfInfoMsg::new());
        builder.append_attr_str(ifla::IFNAME, &self.name);

        if let Some(mtu) = self.mtu {
            builder.append_attr_u32(ifla::MTU, mtu);
        }

        // IFLA_LINKINFO -> IFLA_INFO_KIND
        let linkinfo = builder.nest_start(ifla::LINKINFO);
        builder.append_attr_str(ifla_info::KIND, "wireguard");
        builder.nest_end(linkinfo);

        builder
    }
}

impl Connection {
    /// Create a new wireguard link.
    ///
    /// Fails with EEXIST if a link of that name already exists; the
    /// kernel operation is not idempotent and is never retried.
    pub async fn add_link(&self, config: WireguardLink) -> Result<()> {
        self.request_ack(config.build()).await
    }

    /// Bring a network interface administratively up.
    pub async fn set_link_up(&self, name: &str) -> Result<()> {
        let ifindex = ifname::name_to_index(name)?;

        let mut ifinfo = IfInfoMsg::new().with_index(ifindex as i32);
        ifinfo.ifi_flags = iff::UP;
        ifinfo.ifi_change = iff::UP;

        let mut builder = MessageBuilder::new(NlMsgType::RTM_SETLINK, NLM_F_REQUEST | NLM_F_ACK);
        builder.append(&ifinfo);

        self.request_ack(builder).await
    }

    /// Delete a network interface.
    ///
    /// A missing interface is reported as an error, not ignored.
    pub async fn del_link(&self, name: &str) -> Result<()> {
        let ifindex = ifname::name_to_index(name)?;

        let mut builder = MessageBuilder::new(NlMsgType::RTM_DELLINK, NLM_F_REQUEST | NLM_F_ACK);
        builder.append(&IfInfoMsg::new().with_index(ifindex as i32));

        self.request_ack(builder).await
    }
}
