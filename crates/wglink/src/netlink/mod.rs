//! Netlink plumbing: sockets, message framing, the attribute codec, and
//! the rtnetlink/generic-netlink operations built on top of them.

pub mod addr;
pub mod attr;
mod builder;
pub mod connection;
mod error;
pub mod genl;
pub mod link;
pub mod message;
pub mod route;
pub mod rule;
mod socket;
pub mod types;

pub use builder::MessageBuilder;
pub use connection::Connection;
pub use error::{Error, Result};
pub use link::WireguardLink;
pub use route::RouteBuilder;
pub use rule::RuleBuilder;
pub use socket::{NetlinkSocket, Protocol};
