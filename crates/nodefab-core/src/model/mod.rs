// ── Node domain model ──
//
// Canonical types for the provisioning layer: the node record with its
// state machine states, plus the event types flowing in (topology
// watcher) and out (node lifecycle).

pub mod event;
pub mod node;
pub mod topology;

// ── Re-exports ──────────────────────────────────────────────────────

pub use event::NodeEvent;
pub use node::{NodeRecord, NodeState};
pub use topology::{DeviceKind, PortInfo, TopologyEvent, TopologyEventType};
