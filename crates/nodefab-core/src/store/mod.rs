// ── Node store ──
//
// Registry of node records behind a trait; durable backends live
// outside this crate. The in-memory implementation backs tests and
// single-process deployments.

mod memory;

use async_trait::async_trait;
use nodefab_driver::DeviceId;
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::model::{NodeEvent, NodeRecord};

pub use memory::MemoryNodeStore;

/// Node registry interface.
///
/// Every mutation republishes through [`subscribe`](NodeStore::subscribe).
/// An update that lands a node in [`NodeState::Incomplete`] is published
/// as [`NodeEvent::Incomplete`] instead of `Updated`.
///
/// [`NodeState::Incomplete`]: crate::model::NodeState::Incomplete
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Look up a node by either of its device ids (management channel or
    /// integration bridge).
    async fn node(&self, device: &DeviceId) -> Option<NodeRecord>;

    async fn node_by_hostname(&self, hostname: &str) -> Option<NodeRecord>;

    /// Snapshot of every registered node, unordered.
    async fn nodes(&self) -> Vec<NodeRecord>;

    /// Register a new node. Fails with [`CoreError::NodeExists`] on a
    /// duplicate hostname.
    async fn create_node(&self, node: NodeRecord) -> Result<(), CoreError>;

    /// Replace an existing node's record (same hostname). Fails with
    /// [`CoreError::NodeNotFound`] if it was never registered.
    async fn update_node(&self, node: NodeRecord) -> Result<(), CoreError>;

    /// Deregister a node, returning its final record.
    async fn remove_node(&self, hostname: &str) -> Result<NodeRecord, CoreError>;

    /// Subscribe to node lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<NodeEvent>;
}
