// ── SwitchDriver trait ──
//
// The one seam between provisioning logic and the switch. Backends talk
// OVSDB (or simulate it); callers only see idempotent verbs and boolean
// facts. Every query reflects live state; a backend must never answer
// from a cache that can say "present" for something the switch lost.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::types::{BridgeDescription, DeviceId, TunnelDescription};

/// Southbound driver for a node's switch.
///
/// All mutating operations are idempotent: creating a bridge that exists
/// or adding a tunnel interface that exists is a no-op, not an error.
/// Object-safe so the reconciler can hold `Arc<dyn SwitchDriver>`.
#[async_trait]
pub trait SwitchDriver: Send + Sync {
    /// Initiate a management-channel session to `management:port`.
    ///
    /// Dialing is asynchronous on real backends: a successful return means
    /// the attempt is underway, not that the channel is up. Callers learn
    /// about the established session from the topology feed and from
    /// [`is_connected`](Self::is_connected).
    async fn connect(&self, management: IpAddr, port: u16) -> Result<(), DriverError>;

    /// Whether a live management-channel session exists for `channel`.
    async fn is_connected(&self, channel: &DeviceId) -> bool;

    /// Whether the bridge datapath is present and available.
    async fn is_bridge_available(&self, bridge: &DeviceId) -> bool;

    /// Create the described bridge through `channel`. No-op if a bridge
    /// with the same name already exists there.
    async fn create_bridge(
        &self,
        channel: &DeviceId,
        desc: &BridgeDescription,
    ) -> Result<(), DriverError>;

    /// Whether `interface` exists on the bridge and is administratively
    /// enabled.
    async fn is_tunnel_enabled(&self, bridge: &DeviceId, interface: &str) -> bool;

    /// Attach the described tunnel interface through `channel`. No-op if
    /// the interface already exists on the bridge.
    async fn add_tunnel(
        &self,
        channel: &DeviceId,
        desc: &TunnelDescription,
    ) -> Result<(), DriverError>;

    /// Remove the named bridge through `channel`.
    async fn drop_bridge(&self, channel: &DeviceId, bridge_name: &str) -> Result<(), DriverError>;

    /// Tear down the management-channel session.
    async fn disconnect(&self, channel: &DeviceId) -> Result<(), DriverError>;
}
