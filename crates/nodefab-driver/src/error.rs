use thiserror::Error;

use crate::types::DeviceId;

/// Top-level error type for the `nodefab-driver` crate.
///
/// Covers every failure mode a southbound driver can surface:
/// dialing, per-channel session state, and bridge/interface mutation.
/// `nodefab-core` maps these into its own diagnostics and treats all of
/// them as retryable-on-next-event.
#[derive(Debug, Error)]
pub enum DriverError {
    // ── Session ─────────────────────────────────────────────────────
    /// No live management-channel session for the device.
    #[error("no live management channel for {0}")]
    NotConnected(DeviceId),

    /// Dialing the management endpoint failed outright.
    #[error("cannot reach management endpoint {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    // ── Mutation ────────────────────────────────────────────────────
    /// The switch rejected a configuration request.
    #[error("switch rejected request on {device}: {message}")]
    Rejected { device: DeviceId, message: String },

    /// A bridge referenced by name does not exist on the channel.
    #[error("bridge {bridge} not present on {channel}")]
    UnknownBridge { channel: DeviceId, bridge: String },

    // ── Internal ────────────────────────────────────────────────────
    /// Driver-internal failure (codec, task, bookkeeping).
    #[error("driver internal error: {0}")]
    Internal(String),
}

impl DriverError {
    /// Returns `true` if retrying after a future topology event is
    /// reasonable. Everything except internal bookkeeping failures is.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}
