use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle phase shared by PodCheckpoint and ContainerCheckpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CheckpointPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl CheckpointPhase {
    /// Terminal phases are sticky: reconciling a terminal object is a no-op.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckpointPhase::Succeeded | CheckpointPhase::Failed)
    }
}

impl std::fmt::Display for CheckpointPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointPhase::Pending => write!(f, "Pending"),
            CheckpointPhase::Running => write!(f, "Running"),
            CheckpointPhase::Succeeded => write!(f, "Succeeded"),
            CheckpointPhase::Failed => write!(f, "Failed"),
        }
    }
}

// --- ContainerCheckpoint ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCheckpointSpec {
    pub pod_name: String,
    pub container_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContainerCheckpointStatus {
    #[serde(default)]
    pub phase: CheckpointPhase,
    #[serde(default)]
    pub message: String,
    /// True iff phase is Succeeded and a Content object is bound.
    #[serde(default)]
    pub ready: bool,
    /// Name of the bound ContainerCheckpointContent. Non-empty means the
    /// agent has already succeeded for this object; the agent is never
    /// called again once this is set.
    #[serde(default)]
    pub bound_content_name: Option<String>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
}

/// Checkpoint of a single container in a pod. Usually created by a
/// PodCheckpoint reconciler, but valid standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCheckpoint {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub owner_ref: Option<String>,
    pub spec: ContainerCheckpointSpec,
    #[serde(default)]
    pub status: ContainerCheckpointStatus,
    pub created_at: DateTime<Utc>,
}

// --- PodCheckpoint ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodCheckpointSpec {
    pub pod_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodCheckpointStatus {
    #[serde(default)]
    pub phase: CheckpointPhase,
    #[serde(default)]
    pub message: String,
    /// True iff phase is Succeeded.
    #[serde(default)]
    pub ready: bool,
    /// Name of the bound PodCheckpointContent.
    #[serde(default)]
    pub bound_content_name: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
}

/// Checkpoint of every container in a pod, fanned out into one
/// ContainerCheckpoint per container and fanned back in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodCheckpoint {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub owner_ref: Option<String>,
    pub spec: PodCheckpointSpec,
    #[serde(default)]
    pub status: PodCheckpointStatus,
    pub created_at: DateTime<Utc>,
}

/// Deterministic name of the ContainerCheckpoint a PodCheckpoint creates
/// for one of its containers. Pure function of the two names, so that
/// concurrent reconciles collide at the store's uniqueness check instead
/// of creating duplicates.
pub fn container_checkpoint_name(pod_checkpoint: &str, container: &str) -> String {
    format!("{}-{}", pod_checkpoint, container)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_names_are_deterministic() {
        assert_eq!(container_checkpoint_name("m1", "c"), "m1-c");
        assert_eq!(
            container_checkpoint_name("migration-a", "side-car"),
            "migration-a-side-car"
        );
        // Creation idempotency hangs on same inputs giving the same name.
        assert_eq!(
            container_checkpoint_name("m1", "c"),
            container_checkpoint_name("m1", "c")
        );
    }

    #[test]
    fn terminal_phases() {
        assert!(CheckpointPhase::Succeeded.is_terminal());
        assert!(CheckpointPhase::Failed.is_terminal());
        assert!(!CheckpointPhase::Pending.is_terminal());
        assert!(!CheckpointPhase::Running.is_terminal());
    }
}
