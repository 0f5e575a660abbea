//! Tunnel device lifecycle.
//!
//! Orchestrates link creation, addressing, bring-up, configuration
//! push, route installation and teardown. Kernel operations here have
//! real side effects and no transactions: each step's failure aborts
//! the remaining steps and surfaces which step failed, leaving the
//! device in whatever partial state it reached. Cleanup of a partially
//! created device is the caller's responsibility.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::TunnelConfig;
use crate::netlink::genl::{FamilyId, resolve_family};
use crate::netlink::types::route::rt_table;
use crate::netlink::{Connection, Protocol, Result, RouteBuilder, RuleBuilder, WireguardLink};
use crate::util::ifname;
use crate::wg::{AllowedIp, WG_GENL_NAME, WgClient, WgDevice};

/// Priority of the suppress-default-routes rule. Evaluated first.
pub const SUPPRESS_RULE_PRIORITY: u32 = 32000;

/// Priority of the inverted fwmark rule directing unmarked traffic into
/// the tunnel's table.
pub const FWMARK_RULE_PRIORITY: u32 = 32001;

/// Sysctl directory holding per-interface reverse-path filter knobs.
const RP_FILTER_DIR: &str = "/proc/sys/net/ipv4/conf";

/// Manager for one host's WireGuard devices.
///
/// Construction resolves the wireguard generic netlink family exactly
/// once; the resolved id is carried as an immutable value. A missing
/// family (module not loaded) is fatal and never retried.
pub struct TunnelManager {
    family: FamilyId,
}

impl TunnelManager {
    /// Resolve the wireguard family and create a manager.
    pub async fn new() -> Result<Self> {
        let family = resolve_family(WG_GENL_NAME).await?;
        Ok(Self { family })
    }

    /// Create a manager for an already-resolved family id.
    pub fn with_family(family: FamilyId) -> Self {
        Self { family }
    }

    fn client(&self) -> WgClient {
        WgClient::new(self.family)
    }

    /// Read the current kernel state of a device.
    ///
    /// Always re-queries the kernel; no state is cached between calls.
    pub async fn get_device(&self, name: &str) -> Result<WgDevice> {
        self.client().get_device(name).await
    }

    /// Create the virtual link, optionally assign its address, and
    /// bring it up.
    ///
    /// No rollback is attempted on partial failure; the error names the
    /// failing sub-step.
    pub async fn add_device(&self, name: &str, address: Option<(std::net::IpAddr, u8)>) -> Result<()> {
        let conn = Connection::new(Protocol::Route)?;

        conn.add_link(WireguardLink::new(name))
            .await
            .map_err(|e| e.with_context(format!("creating link {name}")))?;
        debug!(name, "created wireguard link");

        if let Some((addr, prefix_len)) = address {
            conn.add_address(name, addr, prefix_len)
                .await
                .map_err(|e| e.with_context(format!("assigning {addr}/{prefix_len} to {name}")))?;
            debug!(name, %addr, prefix_len, "assigned address");
        }

        conn.set_link_up(name)
            .await
            .map_err(|e| e.with_context(format!("bringing up {name}")))?;

        info!(name, "device is up");
        Ok(())
    }

    /// Push keys, listen port, fwmark and peers into the kernel.
    ///
    /// This is the only step that transfers cryptographic material. See
    /// [`WgClient::configure_device`] for the replace-vs-merge peer
    /// semantics selected by `replace_peers`.
    pub async fn configure_device(
        &self,
        name: &str,
        config: &TunnelConfig,
        replace_peers: bool,
    ) -> Result<()> {
        self.client()
            .configure_device(name, config, replace_peers)
            .await?;
        info!(name, peers = config.peers.len(), replace_peers, "configured device");
        Ok(())
    }

    /// Set only the device's firewall mark.
    pub async fn set_fwmark(&self, name: &str, fwmark: u32) -> Result<()> {
        self.client().set_fwmark(name, fwmark).await
    }

    /// Install routes for every peer's allowed IPs.
    ///
    /// A catch-all prefix switches that peer to full-tunnel policy
    /// routing; every other prefix becomes a direct route through the
    /// link in the main table.
    pub async fn add_device_routes(&self, name: &str, config: &TunnelConfig) -> Result<()> {
        let conn = Connection::new(Protocol::Route)?;
        let ifindex = ifname::name_to_index(name)?;

        for peer in &config.peers {
            for allowed_ip in &peer.allowed_ips {
                if allowed_ip.is_catch_all() {
                    self.enable_full_tunnel(&conn, name, ifindex, allowed_ip, config)
                        .await?;
                } else {
                    conn.add_route(
                        RouteBuilder::new(allowed_ip.addr, allowed_ip.cidr).oif(ifindex),
                    )
                    .await
                    .map_err(|e| {
                        e.with_context(format!("adding route {allowed_ip} via {name}"))
                    })?;
                    debug!(name, %allowed_ip, "added route");
                }
            }
        }

        Ok(())
    }

    /// Route all traffic through the tunnel without looping its own
    /// encrypted packets.
    ///
    /// The tunnel's packets carry the device fwmark and bypass the
    /// inverted rule, exiting via the pre-existing default route; all
    /// other traffic is steered into the tunnel's dedicated table. The
    /// listen port doubles as the table id, a convention that yields a
    /// collision-free, tunnel-scoped identifier.
    async fn enable_full_tunnel(
        &self,
        conn: &Connection,
        name: &str,
        ifindex: u32,
        catch_all: &AllowedIp,
        config: &TunnelConfig,
    ) -> Result<()> {
        let port = config.listen_port as u32;

        self.set_fwmark(name, port)
            .await
            .map_err(|e| e.with_context(format!("marking packets of {name}")))?;

        relax_rp_filter().await?;

        conn.add_route(
            RouteBuilder::new(catch_all.addr, catch_all.cidr)
                .oif(ifindex)
                .table(port),
        )
        .await
        .map_err(|e| e.with_context(format!("installing catch-all route for {name}")))?;

        // Evaluated first: keep the main table's default route from
        // matching while policy routing is active.
        conn.add_rule(
            RuleBuilder::v4()
                .priority(SUPPRESS_RULE_PRIORITY)
                .suppress_prefixlen(0)
                .table(rt_table::MAIN),
        )
        .await
        .map_err(|e| e.with_context(format!("installing suppress rule for {name}")))?;

        // Unmarked packets go to the tunnel's table; the tunnel's own
        // marked packets fall through to normal routing.
        conn.add_rule(
            RuleBuilder::v4()
                .priority(FWMARK_RULE_PRIORITY)
                .fwmark(port)
                .invert()
                .table(port),
        )
        .await
        .map_err(|e| e.with_context(format!("installing fwmark rule for {name}")))?;

        info!(name, table = port, "full-tunnel routing enabled");
        Ok(())
    }

    /// Delete the device and tear down full-tunnel routing.
    ///
    /// Directly attached routes are cascade-removed by the kernel with
    /// the link. The two policy rules are removed by their fixed
    /// priorities, tolerating their absence; a missing link is still a
    /// reported error.
    pub async fn delete_device(&self, name: &str) -> Result<()> {
        let conn = Connection::new(Protocol::Route)?;

        let link_result = conn
            .del_link(name)
            .await
            .map_err(|e| e.with_context(format!("deleting link {name}")));

        for priority in [SUPPRESS_RULE_PRIORITY, FWMARK_RULE_PRIORITY] {
            match conn.del_rule(RuleBuilder::v4().priority(priority)).await {
                Ok(()) => debug!(name, priority, "removed policy rule"),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.with_context(format!("removing rule {priority}"))),
            }
        }

        link_result?;
        info!(name, "device deleted");
        Ok(())
    }
}

/// Relax strict reverse-path filtering to loose mode on every interface
/// that has it enabled.
///
/// Strict mode drops return traffic once routing is split across
/// tables.
async fn relax_rp_filter() -> Result<()> {
    relax_rp_filter_under(Path::new(RP_FILTER_DIR)).await
}

async fn relax_rp_filter_under(dir: &Path) -> Result<()> {
    let sysctl_err = |path: &Path, source: std::io::Error| crate::netlink::Error::Sysctl {
        path: path.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| sysctl_err(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| sysctl_err(dir, e))?
    {
        let path = entry.path().join("rp_filter");
        let value = match tokio::fs::read_to_string(&path).await {
            Ok(value) => value,
            // Not every conf entry carries the knob.
            Err(_) => continue,
        };

        if value.trim() == "1" {
            tokio::fs::write(&path, "2")
                .await
                .map_err(|e| sysctl_err(&path, e))?;
            warn!(path = %path.display(), "relaxed strict reverse-path filter to loose");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_priorities_are_ordered() {
        // The suppress rule must be evaluated before the fwmark rule.
        assert!(SUPPRESS_RULE_PRIORITY < FWMARK_RULE_PRIORITY);
    }

    #[tokio::test]
    async fn test_relax_rp_filter() {
        let dir = std::env::temp_dir().join(format!("wglink-rpf-{}", std::process::id()));
        for (ifname, value) in [("all", "1"), ("eth0", "2"), ("wg0", "0")] {
            let sub = dir.join(ifname);
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join("rp_filter"), value).unwrap();
        }

        relax_rp_filter_under(&dir).await.unwrap();

        // Only the strict entry is rewritten.
        assert_eq!(std::fs::read_to_string(dir.join("all/rp_filter")).unwrap(), "2");
        assert_eq!(std::fs::read_to_string(dir.join("eth0/rp_filter")).unwrap(), "2");
        assert_eq!(std::fs::read_to_string(dir.join("wg0/rp_filter")).unwrap(), "0");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_relax_rp_filter_missing_dir() {
        let err = relax_rp_filter_under(Path::new("/nonexistent-sysctl-dir"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::netlink::Error::Sysctl { .. }));
    }
}
