// ── Node record and provisioning states ──

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use nodefab_driver::DeviceId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Provisioning state of a node's data plane.
///
/// `Init` and `DeviceCreated` are working states the reconciler drives
/// forward; `Complete` and `Incomplete` are resting states that only
/// topology events (or auto-recovery) move the node out of.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// Nothing verified yet; the management channel may not even be up.
    Init,
    /// Integration bridge exists and is available.
    DeviceCreated,
    /// All provisioning criteria hold.
    Complete,
    /// Was complete, then lost its bridge or a required tunnel port.
    Incomplete,
}

impl NodeState {
    /// State that follows once this state's completion criteria hold.
    ///
    /// Resting states map to themselves; they are only left through an
    /// explicit state write, never by advancement.
    pub fn next(self) -> Self {
        match self {
            Self::Init => Self::DeviceCreated,
            Self::DeviceCreated => Self::Complete,
            Self::Complete => Self::Complete,
            Self::Incomplete => Self::Incomplete,
        }
    }
}

/// Description of one cluster node's network data plane.
///
/// Identity (hostname, addresses, derived device ids) is fixed at
/// construction. Only `state` changes over the record's life, and only
/// through [`with_state`](Self::with_state); changing an address means
/// registering a replacement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Cluster-wide unique node name.
    pub hostname: String,
    /// Address the switch's management channel is reached at.
    pub management_address: IpAddr,
    /// Tunnel source address. `None` means this node carries no overlay
    /// traffic and tunnel provisioning is skipped entirely.
    pub data_address: Option<IpAddr>,
    /// Management-channel device id (`ovsdb:<management-address>`).
    pub switch_device: DeviceId,
    /// Integration-bridge device id (`of:<16-hex-dpid>`).
    pub integration_bridge: DeviceId,
    /// Current provisioning state.
    pub state: NodeState,
    /// When `state` last changed.
    pub updated_at: DateTime<Utc>,
}

impl NodeRecord {
    /// Register-time constructor. Derives both device ids and starts the
    /// node in [`NodeState::Init`].
    pub fn new(
        hostname: impl Into<String>,
        management_address: IpAddr,
        data_address: Option<IpAddr>,
    ) -> Self {
        let hostname = hostname.into();
        let switch_device = DeviceId::ovsdb(management_address);
        let integration_bridge = DeviceId::openflow(datapath_id_for(&hostname));

        Self {
            hostname,
            management_address,
            data_address,
            switch_device,
            integration_bridge,
            state: NodeState::Init,
            updated_at: Utc::now(),
        }
    }

    /// Copy of this record in `state`, stamped now. Identity fields carry
    /// over unchanged.
    pub fn with_state(&self, state: NodeState) -> Self {
        Self {
            state,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Whether overlay tunnels are part of this node's completion
    /// criteria.
    pub fn requires_tunnels(&self) -> bool {
        self.data_address.is_some()
    }
}

/// Datapath id for a node's integration bridge: 64-bit FNV-1a over the
/// hostname bytes.
///
/// Hand-rolled rather than `DefaultHasher` because the value is shared
/// with the switch and recorded externally, so it must not move across
/// std releases.
fn datapath_id_for(hostname: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in hostname.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
