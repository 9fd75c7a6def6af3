//! State store registry key prefixes.
//!
//! Namespaced kinds are keyed `/registry/<kind>/<namespace>/<name>`;
//! cluster-scoped kinds (the Content objects) drop the namespace segment.

/// Pods, written by the external cluster API and read here.
pub const PODS_PREFIX: &str = "/registry/pods/";

/// Nodes, written by the external cluster API and read here.
pub const NODES_PREFIX: &str = "/registry/nodes/";

/// Migration objects.
pub const MIGRATIONS_PREFIX: &str = "/registry/migrations/";

/// PodCheckpoint objects.
pub const POD_CHECKPOINTS_PREFIX: &str = "/registry/podcheckpoints/";

/// ContainerCheckpoint objects.
pub const CONTAINER_CHECKPOINTS_PREFIX: &str = "/registry/containercheckpoints/";

/// PodCheckpointContent objects (cluster-scoped).
pub const POD_CHECKPOINT_CONTENTS_PREFIX: &str = "/registry/podcheckpointcontents/";

/// ContainerCheckpointContent objects (cluster-scoped).
pub const CONTAINER_CHECKPOINT_CONTENTS_PREFIX: &str = "/registry/containercheckpointcontents/";
