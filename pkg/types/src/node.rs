use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    Ready,
    NotReady,
    Unknown,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Ready => write!(f, "Ready"),
            NodeStatus::NotReady => write!(f, "NotReady"),
            NodeStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A cluster host, written into the store by the external cluster API.
/// The control plane reads nodes to validate migration targets and to
/// find the checkpoint agent serving a pod's host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub status: NodeStatus,
    /// Address the node's checkpoint agent is reachable at.
    pub address: String,
    /// Port of the node's checkpoint agent gRPC server.
    pub agent_port: u16,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl Node {
    /// gRPC endpoint of this node's checkpoint agent.
    pub fn agent_endpoint(&self) -> String {
        format!("http://{}:{}", self.address, self.agent_port)
    }
}
