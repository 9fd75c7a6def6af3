use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MigrationPhase {
    #[default]
    Pending,
    Checkpointing,
    CheckpointComplete,
    Restoring,
    Succeeded,
    Failed,
}

impl MigrationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationPhase::Succeeded | MigrationPhase::Failed)
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationPhase::Pending => write!(f, "Pending"),
            MigrationPhase::Checkpointing => write!(f, "Checkpointing"),
            MigrationPhase::CheckpointComplete => write!(f, "CheckpointComplete"),
            MigrationPhase::Restoring => write!(f, "Restoring"),
            MigrationPhase::Succeeded => write!(f, "Succeeded"),
            MigrationPhase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSpec {
    /// Pod to move, in the Migration's namespace.
    pub pod_name: String,
    /// Destination node. Empty string delegates placement to the external
    /// scheduler.
    #[serde(default)]
    pub target_node: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationStatus {
    #[serde(default)]
    pub phase: MigrationPhase,
    #[serde(default)]
    pub message: String,
    /// Name of the PodCheckpoint this Migration created.
    #[serde(default)]
    pub pod_checkpoint_ref: Option<String>,
    /// Name of the pod materialized on the target node.
    #[serde(default)]
    pub restored_pod_name: Option<String>,
}

/// Top-level declarative intent: move a pod to another node preserving
/// in-process state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub owner_ref: Option<String>,
    pub spec: MigrationSpec,
    #[serde(default)]
    pub status: MigrationStatus,
    pub created_at: DateTime<Utc>,
}

/// Name of the pod a Migration materializes on the target node. The
/// restored pod must not collide with the still-running source.
pub fn restored_pod_name(source_pod: &str) -> String {
    format!("{}-restored", source_pod)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restored_name_differs_from_source() {
        let restored = restored_pod_name("p1");
        assert_eq!(restored, "p1-restored");
        assert_ne!(restored, "p1");
    }

    #[test]
    fn phase_display_matches_wire_form() {
        assert_eq!(MigrationPhase::CheckpointComplete.to_string(), "CheckpointComplete");
        assert_eq!(
            serde_json::to_string(&MigrationPhase::Checkpointing).unwrap(),
            "\"Checkpointing\""
        );
    }
}
