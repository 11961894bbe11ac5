// ── In-memory node store ──
//
// DashMap keyed by hostname with a device-id index covering both id
// families; every mutation rebuilds the watch snapshot and publishes a
// broadcast event.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use nodefab_driver::DeviceId;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{NodeEvent, NodeRecord, NodeState};
use crate::store::NodeStore;
use crate::stream::NodeStream;

const EVENT_CHANNEL_SIZE: usize = 256;

/// In-memory [`NodeStore`].
pub struct MemoryNodeStore {
    by_hostname: DashMap<String, Arc<NodeRecord>>,
    /// Both of a node's device ids point at its hostname.
    device_index: DashMap<DeviceId, String>,
    events: broadcast::Sender<NodeEvent>,
    snapshot: watch::Sender<Arc<Vec<Arc<NodeRecord>>>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_hostname: DashMap::new(),
            device_index: DashMap::new(),
            events,
            snapshot,
        }
    }

    /// Reactive subscription to the node set.
    pub fn stream(&self) -> NodeStream {
        NodeStream::new(self.snapshot.subscribe())
    }

    pub fn len(&self) -> usize {
        self.by_hostname.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hostname.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all records into a snapshot vec and push to subscribers.
    fn rebuild_snapshot(&self) {
        let records: Vec<Arc<NodeRecord>> = self
            .by_hostname
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(records));
    }

    fn publish(&self, event: NodeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn node(&self, device: &DeviceId) -> Option<NodeRecord> {
        let hostname = self.device_index.get(device)?;
        self.by_hostname
            .get(hostname.value().as_str())
            .map(|entry| (**entry.value()).clone())
    }

    async fn node_by_hostname(&self, hostname: &str) -> Option<NodeRecord> {
        self.by_hostname
            .get(hostname)
            .map(|entry| (**entry.value()).clone())
    }

    async fn nodes(&self) -> Vec<NodeRecord> {
        self.by_hostname
            .iter()
            .map(|entry| (**entry.value()).clone())
            .collect()
    }

    async fn create_node(&self, node: NodeRecord) -> Result<(), CoreError> {
        if self.by_hostname.contains_key(&node.hostname) {
            return Err(CoreError::NodeExists {
                hostname: node.hostname.clone(),
            });
        }

        self.device_index
            .insert(node.switch_device.clone(), node.hostname.clone());
        self.device_index
            .insert(node.integration_bridge.clone(), node.hostname.clone());
        self.by_hostname
            .insert(node.hostname.clone(), Arc::new(node.clone()));
        self.rebuild_snapshot();

        debug!(hostname = %node.hostname, state = %node.state, "node registered");
        self.publish(NodeEvent::Created(node));
        Ok(())
    }

    async fn update_node(&self, node: NodeRecord) -> Result<(), CoreError> {
        if !self.by_hostname.contains_key(&node.hostname) {
            return Err(CoreError::NodeNotFound {
                identifier: node.hostname.clone(),
            });
        }

        self.by_hostname
            .insert(node.hostname.clone(), Arc::new(node.clone()));
        self.rebuild_snapshot();

        debug!(hostname = %node.hostname, state = %node.state, "node updated");
        let event = if node.state == NodeState::Incomplete {
            NodeEvent::Incomplete(node)
        } else {
            NodeEvent::Updated(node)
        };
        self.publish(event);
        Ok(())
    }

    async fn remove_node(&self, hostname: &str) -> Result<NodeRecord, CoreError> {
        let Some((_, record)) = self.by_hostname.remove(hostname) else {
            return Err(CoreError::NodeNotFound {
                identifier: hostname.to_owned(),
            });
        };

        self.device_index.remove(&record.switch_device);
        self.device_index.remove(&record.integration_bridge);
        self.rebuild_snapshot();

        let node = (*record).clone();
        debug!(hostname, "node removed");
        self.publish(NodeEvent::Removed(node.clone()));
        Ok(node)
    }

    fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }
}
