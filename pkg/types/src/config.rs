use serde::{Deserialize, Serialize};

/// Controller manager configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// data-dir: /var/lib/podmig/data
/// shared-mount: /mnt/checkpoints
/// resync-secs: 30
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default, alias = "shared-mount")]
    pub shared_mount: Option<String>,
    #[serde(default, alias = "resync-secs")]
    pub resync_secs: Option<u64>,
}

/// Agent configuration file (YAML).
///
/// Example `agent-config.yaml`:
/// ```yaml
/// node-name: worker-1
/// grpc-port: 50051
/// shared-mount: /mnt/checkpoints
/// checkpoint-port: 10250
/// image-storage-root: /var/lib/podmig/images
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfigFile {
    #[serde(default, alias = "node-name")]
    pub node_name: Option<String>,
    #[serde(default, alias = "grpc-port")]
    pub grpc_port: Option<u16>,
    #[serde(default, alias = "shared-mount")]
    pub shared_mount: Option<String>,
    #[serde(default, alias = "checkpoint-port")]
    pub checkpoint_port: Option<u16>,
    #[serde(default, alias = "image-storage-root")]
    pub image_storage_root: Option<String>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
