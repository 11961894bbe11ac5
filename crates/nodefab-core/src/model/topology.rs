// ── Topology events ──
//
// What the external topology watcher reports about devices and their
// ports. Delivered to the provisioner over a broadcast channel; this
// crate never discovers topology itself.

use nodefab_driver::DeviceId;
use serde::{Deserialize, Serialize};

/// Which face of a node's switch a device id names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// The management channel (`ovsdb:` id family).
    ManagementChannel,
    /// An OpenFlow datapath (`of:` id family).
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyEventType {
    Added,
    AvailabilityChanged,
    Removed,
    PortAdded,
    PortUpdated,
    PortRemoved,
}

/// A port as reported by the topology watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub name: String,
    pub enabled: bool,
}

impl PortInfo {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}

/// One change reported by the topology watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEvent {
    pub kind: DeviceKind,
    pub event: TopologyEventType,
    pub device: DeviceId,
    /// Present on the `Port*` event types.
    pub port: Option<PortInfo>,
}

impl TopologyEvent {
    pub fn new(kind: DeviceKind, event: TopologyEventType, device: DeviceId) -> Self {
        Self {
            kind,
            event,
            device,
            port: None,
        }
    }

    pub fn with_port(mut self, port: PortInfo) -> Self {
        self.port = Some(port);
        self
    }
}
