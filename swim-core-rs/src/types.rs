//! Core types for the SWIM membership registry

use crate::error::{AddressParseError, UnknownState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Identity of a cluster node (host and port)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split on the last ':' so bracketed IPv6 hosts keep their colons
        let (host, port) = s
            .rsplit_once(':')
            .filter(|(host, _)| !host.is_empty())
            .ok_or_else(|| AddressParseError::MissingPort(s.to_string()))?;

        let port = port
            .parse::<u16>()
            .map_err(|_| AddressParseError::InvalidPort(s.to_string()))?;

        Ok(NodeAddress::new(host, port))
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        let host = match addr {
            SocketAddr::V4(v4) => v4.ip().to_string(),
            SocketAddr::V6(v6) => format!("[{}]", v6.ip()),
        };
        NodeAddress::new(host, addr.port())
    }
}

impl From<NodeAddress> for String {
    fn from(addr: NodeAddress) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lifecycle state of a tracked node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Added but not yet confirmed
    Init,
    Healthy,
    /// Missed probes, awaiting confirmation or recovery
    Suspicion,
    Dead,
    /// Left the cluster gracefully
    Left,
}

impl NodeState {
    /// Candidate for probing and gossip
    pub fn is_eligible(&self) -> bool {
        matches!(self, NodeState::Healthy | NodeState::Suspicion)
    }

    /// Node is gone from the cluster
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Dead | NodeState::Left)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Init => write!(f, "init"),
            NodeState::Healthy => write!(f, "healthy"),
            NodeState::Suspicion => write!(f, "suspicion"),
            NodeState::Dead => write!(f, "dead"),
            NodeState::Left => write!(f, "left"),
        }
    }
}

impl FromStr for NodeState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "init" => Ok(NodeState::Init),
            "healthy" => Ok(NodeState::Healthy),
            "suspicion" => Ok(NodeState::Suspicion),
            "dead" => Ok(NodeState::Dead),
            "left" => Ok(NodeState::Left),
            _ => Err(UnknownState(s.to_string())),
        }
    }
}

/// Externally meaningful membership change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "node")]
pub enum MembershipEvent {
    #[serde(rename = "JOIN")]
    Join(NodeAddress),

    #[serde(rename = "LEAVE")]
    Leave(NodeAddress),
}

impl MembershipEvent {
    /// Node the event refers to
    pub fn node(&self) -> &NodeAddress {
        match self {
            MembershipEvent::Join(node) => node,
            MembershipEvent::Leave(node) => node,
        }
    }
}

impl fmt::Display for MembershipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipEvent::Join(node) => write!(f, "join {}", node),
            MembershipEvent::Leave(node) => write!(f, "leave {}", node),
        }
    }
}

/// Raw state transition, emitted for every change that alters the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChanged {
    pub node: NodeAddress,
    pub old_state: NodeState,
    pub new_state: NodeState,
}

impl StateChanged {
    pub fn new(node: NodeAddress, old_state: NodeState, new_state: NodeState) -> Self {
        Self {
            node,
            old_state,
            new_state,
        }
    }
}

impl fmt::Display for StateChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.node, self.old_state, self.new_state)
    }
}
