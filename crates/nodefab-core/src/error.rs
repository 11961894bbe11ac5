// ── Core error types ──
//
// Consumer-facing errors from nodefab-core. Driver failures inside the
// reconciliation loop are logged and absorbed there; the
// `From<DriverError>` impl covers the paths that do surface them
// (direct reconciler and store calls).

use nodefab_driver::DriverError;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Store errors ─────────────────────────────────────────────────
    #[error("node already registered: {hostname}")]
    NodeExists { hostname: String },

    #[error("node not found: {identifier}")]
    NodeNotFound { identifier: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("provisioner already started")]
    AlreadyStarted,

    // ── Southbound errors (wrapped) ──────────────────────────────────
    #[error("switch driver: {0}")]
    Driver(#[from] DriverError),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}
