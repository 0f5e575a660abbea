//! Generic netlink family resolution.
//!
//! Family identifiers are dynamically assigned by the kernel and must be
//! resolved by name through the fixed control family. Resolution happens
//! once at startup; the resulting [`FamilyId`] is an immutable value
//! threaded into the transport, not global state.

use super::header::{GENL_HDRLEN, GenlMsgHdr};
use super::{CtrlAttr, CtrlCmd, GENL_ID_CTRL};
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::builder::MessageBuilder;
use crate::netlink::error::{Error, Result};
use crate::netlink::message::{MessageIter, NLM_F_ACK, NLM_F_REQUEST, NlMsgError};
use crate::netlink::socket::{NetlinkSocket, Protocol};

/// Numeric identifier of a resolved generic netlink family.
///
/// Used as the `nlmsg_type` of every request sent to that family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyId(pub u16);

/// Resolve the kernel family identifier for a generic netlink family.
///
/// A missing family means the corresponding kernel module is not loaded.
/// That is a fatal, unrecoverable startup condition: the error is
/// returned to the caller and never retried.
pub async fn resolve_family(name: &str) -> Result<FamilyId> {
    let socket = NetlinkSocket::new(Protocol::Generic)?;

    let mut builder = MessageBuilder::new(GENL_ID_CTRL, NLM_F_REQUEST | NLM_F_ACK);
    builder.append(&GenlMsgHdr::new(CtrlCmd::GetFamily as u8, 1));
    builder.append_attr_str(CtrlAttr::FamilyName as u16, name);

    let seq = socket.next_seq();
    builder.set_seq(seq);
    builder.set_pid(socket.pid());

    socket.send(&builder.finish()).await?;
    let response = socket.recv_msg().await?;

    let id = parse_family_response(&response, seq, name)?;
    tracing::debug!(family = name, id = id.0, "resolved generic netlink family");
    Ok(id)
}

/// Parse a CTRL_CMD_GETFAMILY response down to the family id attribute.
fn parse_family_response(data: &[u8], seq: u32, name: &str) -> Result<FamilyId> {
    for result in MessageIter::new(data) {
        let (header, payload) = result?;

        if header.nlmsg_seq != seq {
            continue;
        }

        if header.is_error() {
            let err = NlMsgError::from_bytes(payload)?;
            if !err.is_ack() {
                if err.error == -libc::ENOENT {
                    return Err(Error::FamilyNotFound {
                        name: name.to_string(),
                    });
                }
                return Err(Error::from_errno(err.error));
            }
            continue;
        }

        if header.is_done() {
            continue;
        }

        if payload.len() < GENL_HDRLEN {
            return Err(Error::InvalidMessage("GENL header too short".into()));
        }

        for attr in AttrIter::new(&payload[GENL_HDRLEN..]) {
            let (tag, value) = attr?;
            if tag == CtrlAttr::FamilyId as u16 {
                return Ok(FamilyId(get::u16_ne(value)?));
            }
        }

        return Err(Error::InvalidMessage(
            "family response carried no family id".into(),
        ));
    }

    Err(Error::FamilyNotFound {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::{NLMSG_HDRLEN, NlMsgHdr};

    fn family_reply(seq: u32, id: u16) -> Vec<u8> {
        let mut builder = MessageBuilder::new(GENL_ID_CTRL, 0);
        builder.append(&GenlMsgHdr::new(CtrlCmd::NewFamily as u8, 2));
        builder.append_attr_str(CtrlAttr::FamilyName as u16, "wireguard");
        builder.append_attr_u16(CtrlAttr::FamilyId as u16, id);
        builder.set_seq(seq);
        builder.finish()
    }

    #[test]
    fn test_parse_family_response() {
        let reply = family_reply(7, 0x1c);
        let id = parse_family_response(&reply, 7, "wireguard").unwrap();
        assert_eq!(id, FamilyId(0x1c));
    }

    #[test]
    fn test_parse_family_response_enoent() {
        let mut buf = Vec::new();
        let mut hdr = NlMsgHdr::new(crate::netlink::message::NlMsgType::ERROR, 0);
        hdr.nlmsg_seq = 3;
        hdr.nlmsg_len = (NLMSG_HDRLEN + 4 + NLMSG_HDRLEN) as u32;
        buf.extend_from_slice(hdr.as_bytes());
        buf.extend_from_slice(&(-libc::ENOENT).to_ne_bytes());
        buf.extend_from_slice(NlMsgHdr::new(0, 0).as_bytes());

        let err = parse_family_response(&buf, 3, "wireguard").unwrap_err();
        assert!(matches!(err, Error::FamilyNotFound { name } if name == "wireguard"));
    }

    #[test]
    fn test_parse_family_response_ignores_other_sequences() {
        let reply = family_reply(9, 0x1c);
        let err = parse_family_response(&reply, 10, "wireguard").unwrap_err();
        assert!(matches!(err, Error::FamilyNotFound { .. }));
    }
}
