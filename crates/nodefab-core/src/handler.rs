// ── Event-driven provisioner ──
//
// Wires the three event sources to the reconciler: a topology forwarder
// splits watcher events by device kind, a node forwarder consumes the
// store subscription, and one worker drains the shared queue so all
// switch programming stays serialized. Leadership is checked when an
// item executes, not when it was queued, so a replica that loses the
// election mid-stream stops acting on stale items.

use std::sync::Arc;

use nodefab_driver::{DeviceId, SwitchDriver, TunnelKind};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::BootstrapConfig;
use crate::error::CoreError;
use crate::leadership::LeaderGate;
use crate::model::{
    DeviceKind, NodeEvent, NodeRecord, NodeState, PortInfo, TopologyEvent, TopologyEventType,
};
use crate::reconciler::Reconciler;
use crate::store::NodeStore;

/// One unit of serialized provisioning work.
enum WorkItem {
    /// Management-channel topology change. The record is re-fetched at
    /// execution time.
    Channel { device: DeviceId },
    /// Bridge topology change. The record is re-fetched at execution
    /// time.
    Bridge {
        device: DeviceId,
        event: TopologyEventType,
        port: Option<PortInfo>,
    },
    /// Node lifecycle change, carrying the record the store published.
    Node(NodeEvent),
}

// ── Provisioner ──────────────────────────────────────────────────────

/// The provisioning engine's public face.
///
/// Cheaply cloneable via `Arc`. [`start`](Self::start) wires the event
/// inputs and spawns the background tasks; [`shutdown`](Self::shutdown)
/// cancels and joins them.
#[derive(Clone)]
pub struct Provisioner {
    inner: Arc<ProvisionerInner>,
}

struct ProvisionerInner {
    reconciler: Reconciler,
    driver: Arc<dyn SwitchDriver>,
    store: Arc<dyn NodeStore>,
    gate: Arc<dyn LeaderGate>,
    config: BootstrapConfig,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Provisioner {
    pub fn new(
        driver: Arc<dyn SwitchDriver>,
        store: Arc<dyn NodeStore>,
        gate: Arc<dyn LeaderGate>,
        config: BootstrapConfig,
    ) -> Self {
        let reconciler = Reconciler::new(
            Arc::clone(&driver),
            Arc::clone(&store),
            Arc::clone(&gate),
            config.clone(),
        );

        Self {
            inner: Arc::new(ProvisionerInner {
                reconciler,
                driver,
                store,
                gate,
                config,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.inner.config
    }

    /// The reconciler driving this provisioner, for direct invocation
    /// (operator-triggered re-init of a wedged node).
    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }

    /// Wire the event inputs and spawn the background tasks.
    ///
    /// `topology` is the externally produced device/port event feed. The
    /// node feed is subscribed from the store inside this call, so no
    /// lifecycle event published afterwards is missed.
    pub async fn start(
        &self,
        topology: broadcast::Receiver<TopologyEvent>,
    ) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return Err(CoreError::AlreadyStarted);
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let node_events = self.inner.store.subscribe();

        handles.push(tokio::spawn(topology_forwarder(
            topology,
            queue_tx.clone(),
            self.inner.cancel.clone(),
        )));
        handles.push(tokio::spawn(node_forwarder(
            node_events,
            queue_tx,
            self.inner.cancel.clone(),
        )));
        handles.push(tokio::spawn(worker(
            Arc::clone(&self.inner),
            queue_rx,
            self.inner.cancel.clone(),
        )));

        info!("provisioner started");
        Ok(())
    }

    /// Stop the background tasks and join them.
    ///
    /// Queued but unexecuted work is discarded; after a leader change
    /// the next topology or lifecycle event re-converges each node. A
    /// shut-down provisioner stays stopped.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!("provisioner stopped");
    }
}

// ── Work-item execution ──────────────────────────────────────────────

impl ProvisionerInner {
    async fn dispatch(&self, item: WorkItem) {
        match item {
            WorkItem::Channel { device } => self.on_channel_event(&device).await,
            WorkItem::Bridge { device, event, port } => {
                self.on_bridge_event(&device, event, port).await;
            }
            WorkItem::Node(event) => self.on_node_event(event).await,
        }
    }

    /// Management-channel adapter: a channel that reports up resumes the
    /// node's bootstrap.
    async fn on_channel_event(&self, device: &DeviceId) {
        let Some(node) = self.store.node(device).await else {
            return;
        };

        if self.driver.is_connected(&node.switch_device).await {
            debug!(device = %device, hostname = %node.hostname, "management channel detected");
            self.run_bootstrap(&node).await;
        }
    }

    async fn on_bridge_event(
        &self,
        device: &DeviceId,
        event: TopologyEventType,
        port: Option<PortInfo>,
    ) {
        match event {
            TopologyEventType::Added | TopologyEventType::AvailabilityChanged => {
                self.on_bridge_presence(device).await;
            }
            TopologyEventType::PortAdded | TopologyEventType::PortUpdated => {
                self.on_port_added(device, port).await;
            }
            TopologyEventType::PortRemoved => self.on_port_removed(device, port).await,
            TopologyEventType::Removed => {}
        }
    }

    /// Bridge adapter, presence half: an available bridge advances the
    /// node, a vanished one degrades it.
    async fn on_bridge_presence(&self, device: &DeviceId) {
        let Some(node) = self.store.node(device).await else {
            return;
        };

        if self
            .driver
            .is_bridge_available(&node.integration_bridge)
            .await
        {
            debug!(hostname = %node.hostname, "integration bridge detected");
            self.run_bootstrap(&node).await;
        } else if node.state == NodeState::Complete {
            info!(device = %device, "integration bridge lost");
            self.run_set_state(&node, NodeState::Incomplete).await;
        }

        // Reconnect re-arm. Reads the state fetched at event time: a
        // node degraded by the branch above is re-armed by the next
        // availability event, not this one.
        if self.config.auto_recovery
            && matches!(node.state, NodeState::Incomplete | NodeState::DeviceCreated)
        {
            info!(device = %device, hostname = %node.hostname, "switch reconnected, restarting bootstrap");
            self.run_set_state(&node, NodeState::Init).await;
        }
    }

    /// Bridge adapter, port half: a required tunnel interface appearing
    /// on a `DeviceCreated` node resumes its bootstrap.
    async fn on_port_added(&self, device: &DeviceId, port: Option<PortInfo>) {
        let Some(port) = port else { return };
        if !is_tunnel_interface(&port.name) {
            return;
        }
        let Some(node) = self.store.node(device).await else {
            return;
        };

        if node.state == NodeState::DeviceCreated {
            info!(hostname = %node.hostname, interface = %port.name, "tunnel interface added or updated");
            self.run_bootstrap(&node).await;
        }
    }

    /// Bridge adapter, port half: losing a required tunnel interface
    /// degrades a `Complete` node.
    async fn on_port_removed(&self, device: &DeviceId, port: Option<PortInfo>) {
        let Some(port) = port else { return };
        if !is_tunnel_interface(&port.name) {
            return;
        }
        let Some(node) = self.store.node(device).await else {
            return;
        };

        if node.state == NodeState::Complete {
            warn!(hostname = %node.hostname, interface = %port.name, "tunnel interface removed");
            self.run_set_state(&node, NodeState::Incomplete).await;
        }
    }

    /// Node lifecycle adapter.
    async fn on_node_event(&self, event: NodeEvent) {
        match event {
            NodeEvent::Created(node) | NodeEvent::Updated(node) => {
                self.run_bootstrap(&node).await;
            }
            NodeEvent::Removed(node) => self.reconciler.teardown(&node).await,
            // Degradation is an observability signal, not a work order.
            NodeEvent::Incomplete(_) => {}
        }
    }

    async fn run_bootstrap(&self, node: &NodeRecord) {
        if let Err(error) = self.reconciler.bootstrap(node).await {
            warn!(hostname = %node.hostname, %error, "bootstrap step failed");
        }
    }

    async fn run_set_state(&self, node: &NodeRecord, state: NodeState) {
        if let Err(error) = self.reconciler.set_state(node, state).await {
            warn!(hostname = %node.hostname, %error, "state update failed");
        }
    }
}

/// Whether `name` is one of the bridge's tunnel interfaces.
fn is_tunnel_interface(name: &str) -> bool {
    name.parse::<TunnelKind>().is_ok()
}

// ── Background tasks ─────────────────────────────────────────────────

/// Forward relevant topology events onto the work queue.
///
/// Filtering only; every decision that needs current state runs in the
/// worker. The watcher's broadcast is never blocked: the queue send is
/// unbounded, and a lagged receiver logs and keeps going.
async fn topology_forwarder(
    mut events: broadcast::Receiver<TopologyEvent>,
    queue: mpsc::UnboundedSender<WorkItem>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(item) = classify(event) {
                        if queue.send(item).is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "topology event stream lagged, events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Relevance filter: keep only the event types an adapter acts on.
fn classify(event: TopologyEvent) -> Option<WorkItem> {
    match event.kind {
        DeviceKind::ManagementChannel => match event.event {
            TopologyEventType::Added | TopologyEventType::AvailabilityChanged => {
                Some(WorkItem::Channel {
                    device: event.device,
                })
            }
            _ => None,
        },
        DeviceKind::Switch => match event.event {
            TopologyEventType::Removed => None,
            _ => Some(WorkItem::Bridge {
                device: event.device,
                event: event.event,
                port: event.port,
            }),
        },
    }
}

/// Forward store lifecycle events onto the work queue.
async fn node_forwarder(
    mut events: broadcast::Receiver<NodeEvent>,
    queue: mpsc::UnboundedSender<WorkItem>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if queue.send(WorkItem::Node(event)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "node event stream lagged, events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Drain the work queue, one item at a time.
///
/// All switch programming and state writes happen here, giving a total
/// order across every node. Items arriving while this instance is not
/// the leader are dropped.
async fn worker(
    inner: Arc<ProvisionerInner>,
    mut queue: mpsc::UnboundedReceiver<WorkItem>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = queue.recv() => {
                let Some(item) = item else { break };
                if inner.gate.is_leader() {
                    inner.dispatch(item).await;
                } else {
                    trace!("not the provisioning leader, dropping work item");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn evt(kind: DeviceKind, event: TopologyEventType) -> TopologyEvent {
        TopologyEvent::new(kind, event, DeviceId::from("of:00000000000000a1"))
    }

    #[test]
    fn tunnel_interface_names() {
        assert!(is_tunnel_interface("vxlan"));
        assert!(is_tunnel_interface("gre"));
        assert!(is_tunnel_interface("geneve"));
        assert!(!is_tunnel_interface("eth0"));
        assert!(!is_tunnel_interface("vxlan0"));
    }

    #[test]
    fn channel_events_keep_only_presence_types() {
        let kept = classify(evt(
            DeviceKind::ManagementChannel,
            TopologyEventType::AvailabilityChanged,
        ));
        assert!(matches!(kept, Some(WorkItem::Channel { .. })));

        for event in [
            TopologyEventType::Removed,
            TopologyEventType::PortAdded,
            TopologyEventType::PortUpdated,
            TopologyEventType::PortRemoved,
        ] {
            assert!(classify(evt(DeviceKind::ManagementChannel, event)).is_none());
        }
    }

    #[test]
    fn switch_events_drop_only_removal() {
        assert!(classify(evt(DeviceKind::Switch, TopologyEventType::Removed)).is_none());

        for event in [
            TopologyEventType::Added,
            TopologyEventType::AvailabilityChanged,
            TopologyEventType::PortAdded,
            TopologyEventType::PortUpdated,
            TopologyEventType::PortRemoved,
        ] {
            let kept = classify(evt(DeviceKind::Switch, event));
            assert!(matches!(kept, Some(WorkItem::Bridge { .. })));
        }
    }

    #[test]
    fn classified_bridge_item_keeps_the_port() {
        let event = evt(DeviceKind::Switch, TopologyEventType::PortAdded)
            .with_port(PortInfo::new("vxlan", true));

        let Some(WorkItem::Bridge { port, .. }) = classify(event) else {
            panic!("port event should classify as bridge work");
        };
        assert_eq!(port.unwrap().name, "vxlan");
    }
}
