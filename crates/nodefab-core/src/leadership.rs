// ── Leadership gate ──
//
// The cluster election service seen through a keyhole: whether this
// instance currently owns provisioning, and who the members are. Member
// addresses double as the integration bridge's OpenFlow controller list,
// so both reads come from the same snapshot.

use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Read-only view of the cluster election state.
///
/// Checked by the provisioner's worker immediately before each work item
/// executes; a gate that answers `false` makes this instance a warm
/// standby.
pub trait LeaderGate: Send + Sync {
    /// Whether this instance holds provisioning leadership right now.
    fn is_leader(&self) -> bool;

    /// Addresses of all current cluster members, leader included.
    fn members(&self) -> Vec<IpAddr>;
}

/// Fixed gate for single-instance deployments and tests.
#[derive(Debug, Clone)]
pub struct StaticGate {
    leader: bool,
    members: Vec<IpAddr>,
}

impl StaticGate {
    pub fn leader(members: Vec<IpAddr>) -> Self {
        Self {
            leader: true,
            members,
        }
    }

    pub fn follower(members: Vec<IpAddr>) -> Self {
        Self {
            leader: false,
            members,
        }
    }
}

impl LeaderGate for StaticGate {
    fn is_leader(&self) -> bool {
        self.leader
    }

    fn members(&self) -> Vec<IpAddr> {
        self.members.clone()
    }
}

/// Election snapshot published into a [`SharedGate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterView {
    pub leader: bool,
    pub members: Vec<IpAddr>,
}

/// Gate fed by an external election watcher.
///
/// The watcher publishes whole snapshots; readers never block and never
/// see a torn leader/members pair.
#[derive(Debug, Default)]
pub struct SharedGate {
    view: ArcSwap<ClusterView>,
}

impl SharedGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published snapshot.
    pub fn publish(&self, view: ClusterView) {
        self.view.store(Arc::new(view));
    }
}

impl LeaderGate for SharedGate {
    fn is_leader(&self) -> bool {
        self.view.load().leader
    }

    fn members(&self) -> Vec<IpAddr> {
        self.view.load().members.clone()
    }
}
