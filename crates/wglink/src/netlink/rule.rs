//! Policy routing rule management.

use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::Result;
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::types::rule::{FIB_RULE_INVERT, FibRuleHdr, fr_act, fra};

/// Builder for IPv4 policy routing rules.
///
/// Deletion matches on whatever fields are set; a rule built with only
/// a priority deletes the rule at that priority regardless of its
/// target table.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    priority: Option<u32>,
    table: Option<u32>,
    fwmark: Option<u32>,
    invert: bool,
    suppress_prefixlen: Option<u32>,
}

impl RuleBuilder {
    /// Create a new IPv4 rule builder.
    pub fn v4() -> Self {
        Self {
            priority: None,
            table: None,
            fwmark: None,
            invert: false,
            suppress_prefixlen: None,
        }
    }

    /// Set the rule priority.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the routing table to look up.
    pub fn table(mut self, table: u32) -> Self {
        self.table = Some(table);
        self
    }

    /// Match packets carrying this firewall mark.
    pub fn fwmark(mut self, mark: u32) -> Self {
        self.fwmark = Some(mark);
        self
    }

    /// Invert the match (the `not` keyword of `ip rule`).
    pub fn invert(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Suppress table results whose prefix length is at or below `len`.
    ///
    /// With 0, a matched default route is suppressed and rule
    /// evaluation continues.
    pub fn suppress_prefixlen(mut self, len: u32) -> Self {
        self.suppress_prefixlen = Some(len);
        self
    }

    /// Build the RTM_NEWRULE message for adding this rule.
    pub(crate) fn build(&self) -> MessageBuilder {
        self.build_internal(NlMsgType::RTM_NEWRULE, true)
    }

    /// Build the RTM_DELRULE message for deleting this rule.
    pub(crate) fn build_delete(&self) -> MessageBuilder {
        self.build_internal(NlMsgType::RTM_DELRULE, false)
    }

    fn build_internal(&self, msg_type: u16, create: bool) -> MessageBuilder {
        let mut flags = NLM_F_REQUEST | NLM_F_ACK;
        if create {
            flags |= NLM_F_CREATE | NLM_F_EXCL;
        }

        let mut builder = MessageBuilder::new(msg_type, flags);

        let mut hdr = FibRuleHdr::new().with_family(libc::AF_INET as u8);
        if self.invert {
            hdr.flags |= FIB_RULE_INVERT;
        }
        if let Some(table) = self.table {
            hdr.action = fr_act::TO_TBL;
            hdr.table = if table <= 255 { table as u8 } else { 0 };
        } else {
            hdr.action = fr_act::UNSPEC;
        }

        builder.append(&hdr);

        if let Some(prio) = self.priority {
            builder.append_attr_u32(fra::PRIORITY, prio);
        }

        if let Some(mark) = self.fwmark {
            builder.append_attr_u32(fra::FWMARK, mark);
        }

        if let Some(len) = self.suppress_prefixlen {
            builder.append_attr_u32(fra::SUPPRESS_PREFIXLEN, len);
        }

        if let Some(table) = self.table
            && table > 255
        {
            builder.append_attr_u32(fra::TABLE, table);
        }

        builder
    }
}

impl Connection {
    /// Install a policy routing rule.
    pub async fn add_rule(&self, rule: RuleBuilder) -> Result<()> {
        self.request_ack(rule.build()).await
    }

    /// Delete a policy routing rule.
    pub async fn del_rule(&self, rule: RuleBuilder) -> Result<()> {
        self.request_ack(rule.build_delete()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{AttrIter, get};
    use crate::netlink::message::{NLMSG_HDRLEN, NlMsgHdr};

    fn header_and_attrs(msg: &[u8]) -> (FibRuleHdr, Vec<(u16, Vec<u8>)>) {
        let hdr_end = NLMSG_HDRLEN + std::mem::size_of::<FibRuleHdr>();
        let mut hdr = FibRuleHdr::new();
        let hdr_bytes = &msg[NLMSG_HDRLEN..hdr_end];
        hdr.family = hdr_bytes[0];
        hdr.table = hdr_bytes[4];
        hdr.action = hdr_bytes[7];
        hdr.flags = u32::from_ne_bytes(hdr_bytes[8..12].try_into().unwrap());
        let attrs = AttrIter::new(&msg[hdr_end..])
            .map(|r| r.map(|(t, v)| (t, v.to_vec())))
            .collect::<crate::netlink::error::Result<_>>()
            .unwrap();
        (hdr, attrs)
    }

    #[test]
    fn test_suppress_rule() {
        let msg = RuleBuilder::v4()
            .priority(32000)
            .suppress_prefixlen(0)
            .table(254)
            .build()
            .finish();

        let (hdr, attrs) = header_and_attrs(&msg);
        assert_eq!(hdr.table, 254);
        assert_eq!(hdr.action, fr_act::TO_TBL);
        assert_eq!(hdr.flags & FIB_RULE_INVERT, 0);

        let prio = attrs.iter().find(|(t, _)| *t == fra::PRIORITY).unwrap();
        assert_eq!(get::u32_ne(&prio.1).unwrap(), 32000);
        let suppress = attrs
            .iter()
            .find(|(t, _)| *t == fra::SUPPRESS_PREFIXLEN)
            .unwrap();
        assert_eq!(get::u32_ne(&suppress.1).unwrap(), 0);
    }

    #[test]
    fn test_inverted_fwmark_rule() {
        let msg = RuleBuilder::v4()
            .priority(32001)
            .fwmark(51820)
            .invert()
            .table(51820)
            .build()
            .finish();

        let (hdr, attrs) = header_and_attrs(&msg);
        assert_ne!(hdr.flags & FIB_RULE_INVERT, 0);
        assert_eq!(hdr.table, 0); // table id beyond u8 goes in FRA_TABLE

        let mark = attrs.iter().find(|(t, _)| *t == fra::FWMARK).unwrap();
        assert_eq!(get::u32_ne(&mark.1).unwrap(), 51820);
        let table = attrs.iter().find(|(t, _)| *t == fra::TABLE).unwrap();
        assert_eq!(get::u32_ne(&table.1).unwrap(), 51820);
    }

    #[test]
    fn test_delete_by_priority_only() {
        let msg = RuleBuilder::v4().priority(32001).build_delete().finish();

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_DELRULE);
        assert_eq!(header.nlmsg_flags & NLM_F_CREATE, 0);

        let (hdr, attrs) = header_and_attrs(&msg);
        // Unset table and action so the kernel matches on priority alone.
        assert_eq!(hdr.table, 0);
        assert_eq!(hdr.action, fr_act::UNSPEC);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].0, fra::PRIORITY);
    }
}
