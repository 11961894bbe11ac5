// ── In-memory driver backend ──
//
// Faithful simulation of the southbound semantics: idempotent mutation,
// live boolean facts, and sessions that come up only when the simulated
// switch side accepts them. Used by the core's test suites and by
// embeddings that want a dry-run backend; records every mutating call so
// callers can assert on exactly what was issued.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::driver::SwitchDriver;
use crate::error::DriverError;
use crate::types::{BridgeDescription, DeviceId, TunnelDescription};

/// One mutating driver invocation, in issue order.
///
/// Queries are not recorded; they are free to repeat and carry no
/// side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOp {
    Connect { management: IpAddr, port: u16 },
    CreateBridge { channel: DeviceId, name: String },
    AddTunnel { bridge: String, interface: String },
    DropBridge { channel: DeviceId, name: String },
    Disconnect { channel: DeviceId },
}

#[derive(Debug, Default)]
struct ChannelState {
    connected: bool,
}

#[derive(Debug)]
struct BridgeState {
    name: String,
    channel: DeviceId,
    available: bool,
    /// interface name -> administratively enabled
    ports: std::collections::HashMap<String, bool>,
}

/// In-memory [`SwitchDriver`] backend.
///
/// Dialing never completes on its own: [`connect`](SwitchDriver::connect)
/// registers the attempt and [`open_channel`](Self::open_channel) plays
/// the switch side accepting it, which is how real sessions behave from
/// the caller's point of view. Bridge and port state mutate instantly.
#[derive(Default)]
pub struct MemoryDriver {
    channels: DashMap<DeviceId, ChannelState>,
    bridges: DashMap<DeviceId, BridgeState>,
    ops: Mutex<Vec<DriverOp>>,
    refuse_drops: AtomicBool,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Simulation controls ─────────────────────────────────────────

    /// Bring the management-channel session for `management` up, as if
    /// the switch accepted the dial. Returns the channel id.
    pub fn open_channel(&self, management: IpAddr) -> DeviceId {
        let id = DeviceId::ovsdb(management);
        self.channels.entry(id.clone()).or_default().connected = true;
        id
    }

    /// Drop the session without a driver `disconnect` call (switch-side
    /// loss).
    pub fn close_channel(&self, channel: &DeviceId) {
        if let Some(mut state) = self.channels.get_mut(channel) {
            state.connected = false;
        }
    }

    /// Flip a bridge's availability (datapath up/down).
    pub fn set_bridge_available(&self, bridge: &DeviceId, available: bool) {
        if let Some(mut state) = self.bridges.get_mut(bridge) {
            state.available = available;
        }
    }

    /// Flip a port's administrative state.
    pub fn set_port_enabled(&self, bridge: &DeviceId, interface: &str, enabled: bool) {
        if let Some(mut state) = self.bridges.get_mut(bridge) {
            if let Some(port) = state.ports.get_mut(interface) {
                *port = enabled;
            }
        }
    }

    /// Remove a port from a bridge (operator deleted it out of band).
    pub fn remove_port(&self, bridge: &DeviceId, interface: &str) {
        if let Some(mut state) = self.bridges.get_mut(bridge) {
            state.ports.remove(interface);
        }
    }

    /// Make every subsequent `drop_bridge` fail, playing a switch that
    /// refuses to release its bridge.
    pub fn refuse_bridge_drops(&self) {
        self.refuse_drops.store(true, Ordering::Relaxed);
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }

    /// Interface names currently attached to `bridge`, unordered.
    pub fn port_names(&self, bridge: &DeviceId) -> Vec<String> {
        self.bridges
            .get(bridge)
            .map_or_else(Vec::new, |b| b.ports.keys().cloned().collect())
    }

    /// Every mutating call issued so far, in order.
    pub fn operations(&self) -> Vec<DriverOp> {
        self.lock_ops().clone()
    }

    /// Drain the recorded calls, returning them. Lets tests assert on
    /// one provisioning step at a time.
    pub fn take_operations(&self) -> Vec<DriverOp> {
        std::mem::take(&mut *self.lock_ops())
    }

    // ── Internals ───────────────────────────────────────────────────

    fn lock_ops(&self) -> std::sync::MutexGuard<'_, Vec<DriverOp>> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: DriverOp) {
        self.lock_ops().push(op);
    }

    fn channel_connected(&self, channel: &DeviceId) -> bool {
        self.channels.get(channel).is_some_and(|c| c.connected)
    }

    fn bridge_id_for(&self, channel: &DeviceId, bridge_name: &str) -> Option<DeviceId> {
        self.bridges
            .iter()
            .find(|entry| entry.value().channel == *channel && entry.value().name == bridge_name)
            .map(|entry| entry.key().clone())
    }
}

#[async_trait]
impl SwitchDriver for MemoryDriver {
    async fn connect(&self, management: IpAddr, port: u16) -> Result<(), DriverError> {
        self.record(DriverOp::Connect { management, port });
        // Register the pending dial; `open_channel` completes it.
        self.channels.entry(DeviceId::ovsdb(management)).or_default();
        Ok(())
    }

    async fn is_connected(&self, channel: &DeviceId) -> bool {
        self.channel_connected(channel)
    }

    async fn is_bridge_available(&self, bridge: &DeviceId) -> bool {
        self.bridges.get(bridge).is_some_and(|b| b.available)
    }

    async fn create_bridge(
        &self,
        channel: &DeviceId,
        desc: &BridgeDescription,
    ) -> Result<(), DriverError> {
        self.record(DriverOp::CreateBridge {
            channel: channel.clone(),
            name: desc.name.clone(),
        });

        if !self.channel_connected(channel) {
            return Err(DriverError::NotConnected(channel.clone()));
        }
        let Some(dpid) = desc.datapath_id.as_deref() else {
            return Err(DriverError::Rejected {
                device: channel.clone(),
                message: "memory backend requires an explicit datapath id".to_owned(),
            });
        };

        let id = DeviceId::from(format!("of:{dpid}"));
        if self.bridges.contains_key(&id) {
            return Ok(());
        }

        debug!(channel = %channel, bridge = %desc.name, dpid, "bridge created");
        self.bridges.insert(
            id,
            BridgeState {
                name: desc.name.clone(),
                channel: channel.clone(),
                available: true,
                ports: std::collections::HashMap::new(),
            },
        );
        Ok(())
    }

    async fn is_tunnel_enabled(&self, bridge: &DeviceId, interface: &str) -> bool {
        self.bridges.get(bridge).is_some_and(|b| {
            b.available && b.ports.get(interface).copied().unwrap_or(false)
        })
    }

    async fn add_tunnel(
        &self,
        channel: &DeviceId,
        desc: &TunnelDescription,
    ) -> Result<(), DriverError> {
        self.record(DriverOp::AddTunnel {
            bridge: desc.bridge.clone(),
            interface: desc.interface.clone(),
        });

        if !self.channel_connected(channel) {
            return Err(DriverError::NotConnected(channel.clone()));
        }
        let Some(id) = self.bridge_id_for(channel, &desc.bridge) else {
            return Err(DriverError::UnknownBridge {
                channel: channel.clone(),
                bridge: desc.bridge.clone(),
            });
        };

        if let Some(mut state) = self.bridges.get_mut(&id) {
            if !state.ports.contains_key(&desc.interface) {
                debug!(bridge = %desc.bridge, interface = %desc.interface, kind = %desc.kind, "tunnel interface attached");
                state.ports.insert(desc.interface.clone(), true);
            }
        }
        Ok(())
    }

    async fn drop_bridge(&self, channel: &DeviceId, bridge_name: &str) -> Result<(), DriverError> {
        self.record(DriverOp::DropBridge {
            channel: channel.clone(),
            name: bridge_name.to_owned(),
        });

        if !self.channel_connected(channel) {
            return Err(DriverError::NotConnected(channel.clone()));
        }
        if self.refuse_drops.load(Ordering::Relaxed) {
            return Err(DriverError::Rejected {
                device: channel.clone(),
                message: "bridge is in use".to_owned(),
            });
        }
        if let Some(id) = self.bridge_id_for(channel, bridge_name) {
            debug!(channel = %channel, bridge = %bridge_name, "bridge dropped");
            self.bridges.remove(&id);
        }
        Ok(())
    }

    async fn disconnect(&self, channel: &DeviceId) -> Result<(), DriverError> {
        self.record(DriverOp::Disconnect {
            channel: channel.clone(),
        });
        if let Some(mut state) = self.channels.get_mut(channel) {
            state.connected = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{ControlProtocol, ControllerEndpoint, FailMode, TunnelKind};

    const MGMT: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 10, 1, 5));

    fn bridge_desc() -> BridgeDescription {
        BridgeDescription {
            name: "br-int".into(),
            datapath_id: Some("00000000000000a1".into()),
            fail_mode: FailMode::Secure,
            disable_in_band: true,
            controllers: vec![ControllerEndpoint {
                address: IpAddr::V4(Ipv4Addr::new(10, 10, 0, 2)),
                port: 6653,
                protocol: ControlProtocol::Tcp,
            }],
        }
    }

    #[tokio::test]
    async fn connect_is_pending_until_channel_opens() {
        let driver = MemoryDriver::new();
        let channel = DeviceId::ovsdb(MGMT);

        driver.connect(MGMT, 6640).await.unwrap();
        assert!(!driver.is_connected(&channel).await);

        driver.open_channel(MGMT);
        assert!(driver.is_connected(&channel).await);
    }

    #[tokio::test]
    async fn create_bridge_twice_yields_one_bridge() {
        let driver = MemoryDriver::new();
        let channel = driver.open_channel(MGMT);

        driver.create_bridge(&channel, &bridge_desc()).await.unwrap();
        driver.create_bridge(&channel, &bridge_desc()).await.unwrap();

        assert_eq!(driver.bridge_count(), 1);
        let bridge = DeviceId::from("of:00000000000000a1");
        assert!(driver.is_bridge_available(&bridge).await);
        // Both invocations are still visible to assertions.
        assert_eq!(
            driver
                .operations()
                .iter()
                .filter(|op| matches!(op, DriverOp::CreateBridge { .. }))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn create_bridge_requires_live_channel() {
        let driver = MemoryDriver::new();
        let channel = DeviceId::ovsdb(MGMT);

        let err = driver.create_bridge(&channel, &bridge_desc()).await;
        assert!(matches!(err, Err(DriverError::NotConnected(_))));
    }

    #[tokio::test]
    async fn add_tunnel_is_idempotent_and_enables_port() {
        let driver = MemoryDriver::new();
        let channel = driver.open_channel(MGMT);
        driver.create_bridge(&channel, &bridge_desc()).await.unwrap();

        let bridge = DeviceId::from("of:00000000000000a1");
        let desc = TunnelDescription::flow_based("br-int", TunnelKind::Vxlan);
        driver.add_tunnel(&channel, &desc).await.unwrap();
        driver.add_tunnel(&channel, &desc).await.unwrap();

        assert_eq!(driver.port_names(&bridge), vec!["vxlan".to_owned()]);
        assert!(driver.is_tunnel_enabled(&bridge, "vxlan").await);
        assert!(!driver.is_tunnel_enabled(&bridge, "gre").await);
    }

    #[tokio::test]
    async fn tunnel_on_unavailable_bridge_reports_disabled() {
        let driver = MemoryDriver::new();
        let channel = driver.open_channel(MGMT);
        driver.create_bridge(&channel, &bridge_desc()).await.unwrap();

        let bridge = DeviceId::from("of:00000000000000a1");
        let desc = TunnelDescription::flow_based("br-int", TunnelKind::Gre);
        driver.add_tunnel(&channel, &desc).await.unwrap();
        assert!(driver.is_tunnel_enabled(&bridge, "gre").await);

        driver.set_bridge_available(&bridge, false);
        assert!(!driver.is_tunnel_enabled(&bridge, "gre").await);
    }

    #[tokio::test]
    async fn replaying_add_tunnel_does_not_reenable_a_downed_port() {
        let driver = MemoryDriver::new();
        let channel = driver.open_channel(MGMT);
        driver.create_bridge(&channel, &bridge_desc()).await.unwrap();

        let bridge = DeviceId::from("of:00000000000000a1");
        let desc = TunnelDescription::flow_based("br-int", TunnelKind::Geneve);
        driver.add_tunnel(&channel, &desc).await.unwrap();

        driver.set_port_enabled(&bridge, "geneve", false);
        assert!(!driver.is_tunnel_enabled(&bridge, "geneve").await);

        // Port status is switch-side state; re-adding the interface
        // config does not bring a downed port back up.
        driver.add_tunnel(&channel, &desc).await.unwrap();
        assert!(!driver.is_tunnel_enabled(&bridge, "geneve").await);

        driver.set_port_enabled(&bridge, "geneve", true);
        assert!(driver.is_tunnel_enabled(&bridge, "geneve").await);
    }

    #[tokio::test]
    async fn drop_and_disconnect_tear_state_down() {
        let driver = MemoryDriver::new();
        let channel = driver.open_channel(MGMT);
        driver.create_bridge(&channel, &bridge_desc()).await.unwrap();

        driver.drop_bridge(&channel, "br-int").await.unwrap();
        assert_eq!(driver.bridge_count(), 0);

        driver.disconnect(&channel).await.unwrap();
        assert!(!driver.is_connected(&channel).await);

        let ops = driver.take_operations();
        assert_eq!(
            ops.last(),
            Some(&DriverOp::Disconnect {
                channel: channel.clone()
            })
        );
        assert!(driver.operations().is_empty());
    }
}
