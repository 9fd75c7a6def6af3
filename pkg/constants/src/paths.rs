//! Filesystem path constants.

// ─── Controller ────────────────────────────────────────────────────────────

/// Default config file path for the controller manager.
pub const DEFAULT_CONTROLLER_CONFIG: &str = "/etc/podmig/config.yaml";

/// Default data directory for the controller state store.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/podmig/data";

// ─── Agent ────────────────────────────────────────────────────────────────

/// Default config file path for the agent.
pub const DEFAULT_AGENT_CONFIG: &str = "/etc/podmig/agent-config.yaml";

/// Root directory for images committed by PackageAsImage.
pub const DEFAULT_IMAGE_STORAGE_ROOT: &str = "/var/lib/podmig/images";

// ─── Shared artifact store ────────────────────────────────────────────────

/// Mount point of the shared artifact store, identical on every node.
pub const DEFAULT_SHARED_MOUNT: &str = "/mnt/checkpoints";

// ─── Host checkpoint endpoint credentials ─────────────────────────────────

/// Candidate (client cert, client key, CA) triples for authenticating to the
/// host's checkpoint endpoint, tried in order until one loads completely.
pub const CLIENT_CERT_CANDIDATES: [(&str, &str, &str); 3] = [
    (
        "/var/lib/kubelet/pki/kubelet-client-current.pem",
        "/var/lib/kubelet/pki/kubelet-client-current.pem",
        "/etc/kubernetes/pki/ca.crt",
    ),
    (
        "/etc/kubernetes/pki/apiserver-kubelet-client.crt",
        "/etc/kubernetes/pki/apiserver-kubelet-client.key",
        "/etc/kubernetes/pki/ca.crt",
    ),
    (
        "/etc/kubernetes/pki/apiserver-kubelet-client.crt",
        "/etc/kubernetes/pki/apiserver-kubelet-client.key",
        "/var/lib/kubelet/pki/kubelet.crt",
    ),
];
