use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload-bearing twin of a ContainerCheckpoint. Cluster-scoped; created
/// exactly once after a successful agent call and immutable thereafter.
/// Status is intentionally absent: existence implies validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCheckpointContent {
    /// Equal to the owning ContainerCheckpoint's name.
    pub name: String,
    pub spec: ContainerCheckpointContentSpec,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCheckpointContentSpec {
    /// Backref to the ContainerCheckpoint that produced this archive.
    pub container_checkpoint_ref: String,
    pub pod_namespace: String,
    pub pod_name: String,
    pub container_name: String,
    /// Scheme-prefixed archive location (`shared://…` or `file://…`).
    pub artifact_uri: String,
}

/// Aggregate Content for a whole pod: the list of container-level Content
/// names the restore path resolves archives through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodCheckpointContent {
    /// Equal to the owning PodCheckpoint's name.
    pub name: String,
    pub spec: PodCheckpointContentSpec,
    #[serde(default)]
    pub status: PodCheckpointContentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodCheckpointContentSpec {
    pub pod_checkpoint_ref: String,
    pub pod_namespace: String,
    pub pod_name: String,
    /// Names of the aggregated ContainerCheckpointContents, sorted by name.
    pub container_contents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodCheckpointContentStatus {
    pub ready: bool,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}
