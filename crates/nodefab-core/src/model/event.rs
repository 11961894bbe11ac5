// ── Node lifecycle events ──

use serde::{Deserialize, Serialize};

use super::node::NodeRecord;

/// Store-published change to the node set.
///
/// An update that lands a node in [`NodeState::Incomplete`] is published
/// as `Incomplete` rather than `Updated`, so consumers can alarm on
/// degradation without diffing records.
///
/// [`NodeState::Incomplete`]: super::node::NodeState::Incomplete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeEvent {
    Created(NodeRecord),
    Updated(NodeRecord),
    Incomplete(NodeRecord),
    Removed(NodeRecord),
}

impl NodeEvent {
    /// The record the event carries.
    pub fn record(&self) -> &NodeRecord {
        match self {
            Self::Created(node)
            | Self::Updated(node)
            | Self::Incomplete(node)
            | Self::Removed(node) => node,
        }
    }
}
