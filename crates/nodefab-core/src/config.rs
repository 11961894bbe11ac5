// ── Bootstrap configuration ──
//
// Tunables for the provisioning layer. Built by the embedding process
// (usually through `nodefab-config`) and handed to the `Provisioner`;
// core never reads config files itself.

use serde::{Deserialize, Serialize};

/// OVSDB server listen port on the nodes.
pub const DEFAULT_OVSDB_PORT: u16 = 6640;

/// OpenFlow port cluster members listen on.
pub const DEFAULT_OPENFLOW_PORT: u16 = 6653;

/// Provisioning tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// TCP port the nodes' switch management channel listens on.
    pub ovsdb_port: u16,
    /// Re-arm nodes stuck in `INCOMPLETE` or `DEVICE_CREATED` back to
    /// `INIT` when their switch reconnects.
    pub auto_recovery: bool,
    /// OpenFlow port written into the integration bridge's controller
    /// list, one entry per cluster member.
    pub openflow_port: u16,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            ovsdb_port: DEFAULT_OVSDB_PORT,
            auto_recovery: true,
            openflow_port: DEFAULT_OPENFLOW_PORT,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_wire_conventions() {
        let config = BootstrapConfig::default();
        assert_eq!(config.ovsdb_port, 6640);
        assert_eq!(config.openflow_port, 6653);
        assert!(config.auto_recovery);
    }

    #[test]
    fn partial_deserialization_fills_defaults() {
        let config: BootstrapConfig = serde_json::from_str(r#"{"auto_recovery": false}"#).unwrap();
        assert!(!config.auto_recovery);
        assert_eq!(config.ovsdb_port, 6640);
    }
}
