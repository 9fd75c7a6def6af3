use serde::{Deserialize, Serialize};

/// Volume mount in a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Name of the volume (must match a Volume in the pod spec)
    pub name: String,
    /// Path inside the container to mount the volume
    pub mount_path: String,
    /// Whether to mount read-only
    #[serde(default)]
    pub read_only: bool,
}

/// Where a volume's storage comes from. Restored pods carry their
/// source pod's volumes verbatim; the control plane never interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VolumeSource {
    /// A path on the host node's filesystem
    HostPath { path: String },
    /// An empty directory created when the pod starts, deleted when it stops
    EmptyDir {},
    /// A persistent volume claim reference
    PersistentVolumeClaim { claim_name: String },
    /// A configmap projected as files
    ConfigMap { name: String },
    /// A secret projected as files
    Secret { secret_name: String },
}

/// Named volume in a pod spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
}
