//! Node store, leadership gating, and the bootstrap reconciler for the
//! nodefab workspace.
//!
//! This crate owns the provisioning logic that turns a registered node
//! record into a working network data plane:
//!
//! - **[`Provisioner`]** — Event-driven engine.
//!   [`start()`](Provisioner::start) wires a topology feed and the store
//!   subscription into one serialized work queue drained by a single
//!   worker task; [`shutdown()`](Provisioner::shutdown) cancels and
//!   joins. Leadership is re-checked as each item executes.
//!
//! - **[`Reconciler`]** — The per-node state machine
//!   (`INIT → DEVICE_CREATED → COMPLETE`, degrading to `INCOMPLETE`).
//!   Completion predicates read live switch facts through
//!   `nodefab_driver::SwitchDriver`; entry actions are idempotent, so
//!   replays and partial failures converge instead of erroring.
//!
//! - **[`NodeStore`]** — Registry trait plus [`MemoryNodeStore`]
//!   (`DashMap` + broadcast events + `watch` snapshots). Every mutation
//!   republishes a [`NodeEvent`], closing the reconciliation loop.
//!
//! - **[`LeaderGate`]** — Keyhole view of the external cluster election:
//!   `is_leader()` gates the worker, `members()` becomes the integration
//!   bridge's OpenFlow controller list.
//!
//! - **[`NodeStream`]** — Watch-backed reactive view of the node set for
//!   UIs and health surfaces.
//!
//! The crate never discovers topology, speaks a switch wire protocol,
//! or runs an election; all three arrive through interfaces owned here.

pub mod config;
pub mod error;
pub mod handler;
pub mod leadership;
pub mod model;
pub mod reconciler;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BootstrapConfig, DEFAULT_OPENFLOW_PORT, DEFAULT_OVSDB_PORT};
pub use error::CoreError;
pub use handler::Provisioner;
pub use leadership::{ClusterView, LeaderGate, SharedGate, StaticGate};
pub use reconciler::{INTEGRATION_BRIDGE, Reconciler};
pub use store::{MemoryNodeStore, NodeStore};
pub use stream::{NodeStream, NodeWatchStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    DeviceKind, NodeEvent, NodeRecord, NodeState, PortInfo, TopologyEvent, TopologyEventType,
};
