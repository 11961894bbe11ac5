// ── Bootstrap reconciler ──
//
// The per-node state machine and its idempotent entry actions. Each
// working state pairs a completion predicate over live switch facts
// with an entry action that moves reality toward that predicate;
// `bootstrap` advances the state when the predicate holds and otherwise
// (re)runs the action. Predicates never consult cached progress, so a
// partially failed action is simply retried by the next event.
//
// Only this type writes `state`.

use std::sync::Arc;

use nodefab_driver::{
    BridgeDescription, ControlProtocol, ControllerEndpoint, FailMode, SwitchDriver,
    TunnelDescription, TunnelKind,
};
use tracing::{error, info, trace, warn};

use crate::config::BootstrapConfig;
use crate::error::CoreError;
use crate::leadership::LeaderGate;
use crate::model::{NodeRecord, NodeState};
use crate::store::NodeStore;

/// Name of the integration bridge created on every node.
pub const INTEGRATION_BRIDGE: &str = "br-int";

/// Drives node records through the provisioning state machine.
pub struct Reconciler {
    driver: Arc<dyn SwitchDriver>,
    store: Arc<dyn NodeStore>,
    gate: Arc<dyn LeaderGate>,
    config: BootstrapConfig,
}

impl Reconciler {
    pub fn new(
        driver: Arc<dyn SwitchDriver>,
        store: Arc<dyn NodeStore>,
        gate: Arc<dyn LeaderGate>,
        config: BootstrapConfig,
    ) -> Self {
        Self {
            driver,
            store,
            gate,
            config,
        }
    }

    /// Run `node` one step toward `Complete`.
    ///
    /// Driver failures inside entry actions are logged and absorbed; the
    /// returned error covers only a failed state persist (the node was
    /// deregistered mid-flight).
    pub async fn bootstrap(&self, node: &NodeRecord) -> Result<(), CoreError> {
        if self.state_complete(node).await {
            return self.set_state(node, node.state.next()).await;
        }

        trace!(hostname = %node.hostname, state = %node.state, "processing state");
        match node.state {
            NodeState::Init => self.process_init(node).await,
            NodeState::DeviceCreated => self.process_device_created(node).await,
            // Resting states have no entry action; an explicit state
            // write is the only way out of them.
            NodeState::Complete | NodeState::Incomplete => {}
        }
        Ok(())
    }

    /// Whether `node.state`'s completion criteria hold against the live
    /// switch.
    pub async fn state_complete(&self, node: &NodeRecord) -> bool {
        match node.state {
            NodeState::Init => {
                self.driver.is_connected(&node.switch_device).await
                    && self
                        .driver
                        .is_bridge_available(&node.integration_bridge)
                        .await
            }
            NodeState::DeviceCreated => {
                for kind in required_tunnels(node) {
                    if !self
                        .driver
                        .is_tunnel_enabled(&node.integration_bridge, kind.interface_name())
                        .await
                    {
                        return false;
                    }
                }
                true
            }
            NodeState::Complete | NodeState::Incomplete => false,
        }
    }

    /// Persist a state change for `node`, republishing through the
    /// store. A same-state write is a no-op.
    pub async fn set_state(&self, node: &NodeRecord, state: NodeState) -> Result<(), CoreError> {
        if node.state == state {
            return Ok(());
        }
        self.store.update_node(node.with_state(state)).await?;
        info!(hostname = %node.hostname, from = %node.state, to = %state, "node state changed");
        Ok(())
    }

    /// Best-effort switch cleanup when a node leaves the cluster.
    ///
    /// Without a live management channel there is nothing to clean up
    /// against, so the attempt is logged and skipped.
    pub async fn teardown(&self, node: &NodeRecord) {
        if !self.driver.is_connected(&node.switch_device).await {
            info!(hostname = %node.hostname, "no live management channel, skipping switch cleanup");
            return;
        }

        if let Err(error) = self
            .driver
            .drop_bridge(&node.switch_device, INTEGRATION_BRIDGE)
            .await
        {
            warn!(hostname = %node.hostname, %error, "failed to drop integration bridge");
        }
        if let Err(error) = self.driver.disconnect(&node.switch_device).await {
            warn!(hostname = %node.hostname, %error, "failed to close management channel");
        }
    }

    // ── Entry actions ────────────────────────────────────────────────

    /// `Init`: dial the management channel, then create the integration
    /// bridge once the channel is up.
    async fn process_init(&self, node: &NodeRecord) {
        if !self.driver.is_connected(&node.switch_device).await {
            if let Err(error) = self
                .driver
                .connect(node.management_address, self.config.ovsdb_port)
                .await
            {
                warn!(hostname = %node.hostname, %error, "management channel dial failed");
            }
            // Bridge creation resumes on the channel-up event.
            return;
        }

        if !self
            .driver
            .is_bridge_available(&node.integration_bridge)
            .await
        {
            let desc = self.integration_bridge_desc(node);
            if let Err(error) = self.driver.create_bridge(&node.switch_device, &desc).await {
                warn!(hostname = %node.hostname, bridge = INTEGRATION_BRIDGE, %error, "bridge creation failed");
            }
        }
    }

    /// `DeviceCreated`: attach the missing tunnel interfaces.
    async fn process_device_created(&self, node: &NodeRecord) {
        if !self.driver.is_connected(&node.switch_device).await {
            if let Err(error) = self
                .driver
                .connect(node.management_address, self.config.ovsdb_port)
                .await
            {
                warn!(hostname = %node.hostname, %error, "management channel dial failed");
            }
            return;
        }

        for kind in required_tunnels(node) {
            if self
                .driver
                .is_tunnel_enabled(&node.integration_bridge, kind.interface_name())
                .await
            {
                continue;
            }

            let desc = TunnelDescription::flow_based(INTEGRATION_BRIDGE, *kind);
            if let Err(err) = self.driver.add_tunnel(&node.switch_device, &desc).await {
                if err.is_transient() {
                    warn!(hostname = %node.hostname, interface = kind.interface_name(),
                        error = %err, "tunnel attach failed, retrying on the next event");
                } else {
                    error!(hostname = %node.hostname, interface = kind.interface_name(),
                        error = %err, "failed to create tunnel interface");
                }
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Bridge description for `node`: fail-secure, in-band control off,
    /// datapath id pinned to the record's bridge identity, every cluster
    /// member registered as an OpenFlow controller.
    fn integration_bridge_desc(&self, node: &NodeRecord) -> BridgeDescription {
        let controllers = self
            .gate
            .members()
            .into_iter()
            .map(|address| ControllerEndpoint {
                address,
                port: self.config.openflow_port,
                protocol: ControlProtocol::Tcp,
            })
            .collect();

        BridgeDescription {
            name: INTEGRATION_BRIDGE.to_owned(),
            datapath_id: node.integration_bridge.datapath_id().map(str::to_owned),
            fail_mode: FailMode::Secure,
            disable_in_band: true,
            controllers,
        }
    }
}

/// Tunnel kinds `node` must carry; empty without a data address.
fn required_tunnels(node: &NodeRecord) -> &'static [TunnelKind] {
    if node.requires_tunnels() {
        &TunnelKind::ALL
    } else {
        &[]
    }
}
