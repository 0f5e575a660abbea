//! WireGuard tunnel control plane over netlink.
//!
//! This crate manages kernel WireGuard interfaces on Linux: it creates
//! and destroys the virtual link via rtnetlink, pushes cryptographic
//! and peer configuration through the wireguard generic netlink family,
//! and installs the policy routes needed for full-tunnel peers. The
//! kernel implements the tunnel itself; this crate only drives its
//! control plane.
//!
//! # Example
//!
//! ```ignore
//! use wglink::{TunnelConfig, TunnelManager};
//!
//! # async fn example(config: TunnelConfig) -> wglink::Result<()> {
//! let manager = TunnelManager::new().await?;
//!
//! manager.add_device("wg0", config.address).await?;
//! manager.configure_device("wg0", &config, true).await?;
//! if config.set_up_routes {
//!     manager.add_device_routes("wg0", &config).await?;
//! }
//!
//! let device = manager.get_device("wg0").await?;
//! for peer in &device.peers {
//!     println!("peer {:?}: {} rx / {} tx", peer.public_key, peer.rx_bytes, peer.tx_bytes);
//! }
//!
//! manager.delete_device("wg0").await?;
//! # Ok(())
//! # }
//! ```
//!
//! Operations race at the kernel level if two processes drive the same
//! interface concurrently; this crate does not serialize across
//! processes.

pub mod config;
pub mod netlink;
pub mod tunnel;
pub mod util;
pub mod wg;

pub use config::{PeerSpec, TunnelConfig};
pub use netlink::{Error, Result};
pub use tunnel::TunnelManager;
pub use wg::{AllowedIp, WgDevice, WgPeer};
