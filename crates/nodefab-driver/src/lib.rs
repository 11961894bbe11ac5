//! Southbound switch-programming surface for the nodefab workspace.
//!
//! Everything the provisioning layer knows about a node's virtual switch
//! goes through this crate:
//!
//! - **[`SwitchDriver`]** — The facts-and-verbs trait. Facts
//!   ([`is_connected()`](SwitchDriver::is_connected),
//!   [`is_bridge_available()`](SwitchDriver::is_bridge_available),
//!   [`is_tunnel_enabled()`](SwitchDriver::is_tunnel_enabled)) read live
//!   switch state and never consult caches; verbs
//!   ([`connect()`](SwitchDriver::connect),
//!   [`create_bridge()`](SwitchDriver::create_bridge),
//!   [`add_tunnel()`](SwitchDriver::add_tunnel), ...) are idempotent so
//!   the reconciler above can replay them freely.
//!
//! - **Device addressing** ([`DeviceId`]) — Two id families name the two
//!   faces of one switch: `ovsdb:<ip>` for the management channel and
//!   `of:<16-hex-dpid>` for the integration bridge's datapath.
//!
//! - **Descriptions** ([`BridgeDescription`], [`TunnelDescription`]) —
//!   Declarative inputs to the verbs. Tunnels default to flow-based
//!   endpoints and keys so one interface serves every peer.
//!
//! - **[`MemoryDriver`]** — In-memory backend with the full idempotent
//!   semantics plus an operation log, for tests and dry runs.

pub mod driver;
pub mod error;
pub mod memory;
pub mod types;

// ── Primary re-exports ──────────────────────────────────────────────
pub use driver::SwitchDriver;
pub use error::DriverError;
pub use memory::{DriverOp, MemoryDriver};
pub use types::{
    BridgeDescription, ControlProtocol, ControllerEndpoint, DeviceId, FailMode, TunnelDescription,
    TunnelEndpoint, TunnelKey, TunnelKind,
};
