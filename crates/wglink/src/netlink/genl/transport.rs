//! Generic netlink request/response transport.

use super::family::FamilyId;
use super::header::GenlMsgHdr;
use crate::netlink::builder::MessageBuilder;
use crate::netlink::error::{Error, Result};
use crate::netlink::message::{
    MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NlMsgError,
};
use crate::netlink::socket::{NetlinkSocket, Protocol};

/// Transport for one resolved generic netlink family.
///
/// Each exchange opens a dedicated socket that is released on every
/// exit path, including attribute-encode and decode failures; no state
/// is shared between requests beyond the immutable family id.
pub struct GenlTransport {
    family: FamilyId,
    version: u8,
}

impl GenlTransport {
    /// Create a transport for the given family and protocol version.
    pub fn new(family: FamilyId, version: u8) -> Self {
        Self { family, version }
    }

    /// The resolved family id this transport talks to.
    pub fn family(&self) -> FamilyId {
        self.family
    }

    /// Send a command expecting a single acknowledgment.
    ///
    /// Used for write commands (NLM_F_REQUEST | NLM_F_ACK).
    pub async fn ack(
        &self,
        cmd: u8,
        operation: &'static str,
        build_attrs: impl FnOnce(&mut MessageBuilder),
    ) -> Result<()> {
        let socket = NetlinkSocket::new(Protocol::Generic)?;

        let mut builder = MessageBuilder::new(self.family.0, NLM_F_REQUEST | NLM_F_ACK);
        builder.append(&GenlMsgHdr::new(cmd, self.version));
        build_attrs(&mut builder);

        let seq = socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(socket.pid());

        socket.send(&builder.finish()).await?;
        let response = socket.recv_msg().await?;

        process_ack(&response, seq).map_err(|e| translate(e, operation))
    }

    /// Send a dump command and collect every response payload.
    ///
    /// Used for read queries (NLM_F_REQUEST | NLM_F_DUMP) whose reply
    /// may span multiple messages. Each returned buffer starts with the
    /// GENL header.
    pub async fn dump(
        &self,
        cmd: u8,
        operation: &'static str,
        build_attrs: impl FnOnce(&mut MessageBuilder),
    ) -> Result<Vec<Vec<u8>>> {
        let socket = NetlinkSocket::new(Protocol::Generic)?;

        let mut builder = MessageBuilder::new(self.family.0, NLM_F_REQUEST | NLM_F_DUMP);
        builder.append(&GenlMsgHdr::new(cmd, self.version));
        build_attrs(&mut builder);

        let seq = socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(socket.pid());

        socket.send(&builder.finish()).await?;

        let mut responses = Vec::new();

        loop {
            let data = socket.recv_msg().await?;
            let mut done = false;

            for result in MessageIter::new(&data) {
                let (header, payload) = result?;

                if header.nlmsg_seq != seq {
                    continue;
                }

                if header.is_error() {
                    let err = NlMsgError::from_bytes(payload)?;
                    if !err.is_ack() {
                        return Err(translate(Error::from_errno(err.error), operation));
                    }
                    continue;
                }

                if header.is_done() {
                    done = true;
                    break;
                }

                responses.push(payload.to_vec());
            }

            if done {
                break;
            }
        }

        Ok(responses)
    }
}

/// Attach the command name to kernel errors and remap EOPNOTSUPP, which
/// the wireguard family returns for interfaces of another link type.
fn translate(err: Error, operation: &'static str) -> Error {
    if err.is_not_supported() {
        return Error::NotSupported(operation.to_string());
    }
    err.with_context(operation)
}

/// Scan a reply for the matching ACK, surfacing kernel errors.
fn process_ack(data: &[u8], seq: u32) -> Result<()> {
    for result in MessageIter::new(data) {
        let (header, payload) = result?;

        if header.nlmsg_seq != seq {
            continue;
        }

        if header.is_error() {
            let err = NlMsgError::from_bytes(payload)?;
            if !err.is_ack() {
                return Err(Error::from_errno(err.error));
            }
            return Ok(());
        }
    }

    Err(Error::InvalidMessage("expected ACK message".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_remaps_eopnotsupp() {
        let err = translate(Error::from_errno(-libc::EOPNOTSUPP), "get_device");
        assert!(matches!(err, Error::NotSupported(op) if op == "get_device"));
    }

    #[test]
    fn test_translate_adds_context() {
        let err = translate(Error::from_errno(-libc::EPERM), "set_device");
        assert!(err.to_string().contains("set_device"));
    }
}
