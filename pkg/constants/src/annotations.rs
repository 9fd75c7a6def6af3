//! Label and annotation keys forming contracts between components.

/// Label on a ContainerCheckpoint naming the PodCheckpoint that created it.
pub const PARENT_LABEL: &str = "parent";

/// Annotation on a restored pod naming the pod it was checkpointed from.
pub const SOURCE_POD_ANNOTATION: &str = "podmig.io/source-pod";

/// Annotation on a restored pod naming the node it was targeted at.
pub const TARGET_NODE_ANNOTATION: &str = "podmig.io/target-node";

/// Annotation on a restored pod naming the PodCheckpointContent it restores from.
pub const CHECKPOINT_SOURCE_ANNOTATION: &str = "podmig.io/checkpoint-source";

/// Image annotation the host runtime inspects to take the restore path.
/// The key is an external contract with the runtime; do not rename.
pub const CHECKPOINT_IMAGE_ANNOTATION: &str = "checkpoint.name";
