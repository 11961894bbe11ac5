// ── Southbound vocabulary ──
//
// Identity and description types shared by every driver backend.
// A `DeviceId` names either a management channel (`ovsdb:<ip>`) or a
// bridge datapath (`of:<16-hex dpid>`); the description structs carry
// exactly what a backend needs to realize a bridge or tunnel interface.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── DeviceId ────────────────────────────────────────────────────────

/// Canonical identifier for a southbound device.
///
/// Stringly-typed on purpose: identifiers flow between the driver, the
/// topology feed, and the node store, and their only contract is equality
/// plus the scheme prefix. Scheme-aware constructors keep the formats in
/// one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Management-channel id for a node reachable at `addr`.
    pub fn ovsdb(addr: IpAddr) -> Self {
        Self(format!("ovsdb:{addr}"))
    }

    /// Bridge datapath id in OpenFlow notation.
    pub fn openflow(dpid: u64) -> Self {
        Self(format!("of:{dpid:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare datapath id (hex digits after `of:`), if this is a
    /// bridge id. Used verbatim as the bridge's OpenFlow datapath id.
    pub fn datapath_id(&self) -> Option<&str> {
        self.0.strip_prefix("of:")
    }

    /// The management address embedded in an `ovsdb:` id, if any.
    pub fn management_address(&self) -> Option<IpAddr> {
        self.0.strip_prefix("ovsdb:")?.parse().ok()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Bridge description ──────────────────────────────────────────────

/// OpenFlow fail mode applied when the bridge loses its controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailMode {
    /// Stop forwarding; wait for a controller (the only mode nodefab uses).
    Secure,
    /// Fall back to standalone L2 switching.
    Standalone,
}

/// Transport used for the bridge-to-controller OpenFlow session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ControlProtocol {
    Tcp,
    Ssl,
}

/// One OpenFlow controller endpoint to register on a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerEndpoint {
    pub address: IpAddr,
    pub port: u16,
    pub protocol: ControlProtocol,
}

impl fmt::Display for ControllerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.protocol, self.address, self.port)
    }
}

/// Everything a backend needs to create (or converge) a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDescription {
    /// Bridge name on the switch (e.g. `br-int`).
    pub name: String,
    /// Explicit datapath id; `None` lets the switch pick one.
    pub datapath_id: Option<String>,
    pub fail_mode: FailMode,
    /// Disable in-band control so data-plane traffic cannot reach the
    /// controller session.
    pub disable_in_band: bool,
    pub controllers: Vec<ControllerEndpoint>,
}

// ── Tunnel description ──────────────────────────────────────────────

/// Overlay encapsulation supported on the integration bridge.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum TunnelKind {
    Vxlan,
    Gre,
    Geneve,
}

impl TunnelKind {
    pub const ALL: [Self; 3] = [Self::Vxlan, Self::Gre, Self::Geneve];

    /// Interface name used for this encapsulation on the bridge.
    /// One tunnel interface per kind per bridge.
    pub fn interface_name(self) -> &'static str {
        match self {
            Self::Vxlan => "vxlan",
            Self::Gre => "gre",
            Self::Geneve => "geneve",
        }
    }
}

/// Remote endpoint selection for a tunnel interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelEndpoint {
    /// Wildcarded: the datapath learns remotes from traffic (`remote_ip=flow`).
    Flow,
    /// Statically configured remote.
    Address(IpAddr),
}

/// Tunnel key (VNI / GRE key) selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelKey {
    /// Wildcarded: key taken from the flow (`key=flow`).
    Flow,
    Value(u64),
}

/// Everything a backend needs to attach a tunnel interface to a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelDescription {
    /// Name of the bridge the interface attaches to.
    pub bridge: String,
    /// Interface name, conventionally [`TunnelKind::interface_name`].
    pub interface: String,
    pub kind: TunnelKind,
    pub remote: TunnelEndpoint,
    pub key: TunnelKey,
}

impl TunnelDescription {
    /// Flow-based tunnel of the given kind on `bridge`, named after the
    /// kind. Remote endpoint and key are learned from traffic.
    pub fn flow_based(bridge: impl Into<String>, kind: TunnelKind) -> Self {
        Self {
            bridge: bridge.into(),
            interface: kind.interface_name().to_owned(),
            kind,
            remote: TunnelEndpoint::Flow,
            key: TunnelKey::Flow,
        }
    }
}
