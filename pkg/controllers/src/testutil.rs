//! Shared fixtures for reconciler tests.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::agent::{CheckpointAgent, CheckpointCall};
use pkg_state::client::StateStore;
use pkg_types::checkpoint::{ContainerCheckpoint, ContainerCheckpointSpec, ContainerCheckpointStatus};
use pkg_types::node::{Node, NodeStatus};
use pkg_types::pod::{
    ContainerSpec, Pod, PodSpec, PodStatus, PullPolicy, ResourceRequirements, RestartPolicy,
};

/// In-memory agent double recording every call.
pub struct FakeAgent {
    pub calls: Mutex<Vec<CheckpointCall>>,
    pub result: Mutex<Result<String, String>>,
}

impl FakeAgent {
    pub fn succeeding(uri: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            result: Mutex::new(Ok(uri.to_string())),
        })
    }

    pub fn failing(error: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            result: Mutex::new(Err(error.to_string())),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CheckpointAgent for FakeAgent {
    async fn checkpoint(&self, _endpoint: &str, call: &CheckpointCall) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(call.clone());
        match &*self.result.lock().unwrap() {
            Ok(uri) => Ok(uri.clone()),
            Err(e) => Err(anyhow!("{}", e)),
        }
    }

    async fn package_as_image(
        &self,
        _endpoint: &str,
        _checkpoint_uri: &str,
        _container_name: &str,
        _image_name: &str,
    ) -> anyhow::Result<String> {
        unimplemented!("not exercised by reconcilers")
    }

    async fn health(&self, _endpoint: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

pub async fn open_store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().to_str().unwrap()).await.unwrap();
    (dir, store)
}

pub fn make_pod(name: &str, containers: &[&str], status: PodStatus) -> Pod {
    Pod {
        uid: format!("{}-uid", name),
        name: name.to_string(),
        namespace: "default".to_string(),
        spec: PodSpec {
            containers: containers
                .iter()
                .map(|c| ContainerSpec {
                    name: c.to_string(),
                    image: "registry.local/app:v1".to_string(),
                    command: vec![],
                    args: vec![],
                    env: HashMap::new(),
                    ports: vec![],
                    resources: ResourceRequirements::default(),
                    volume_mounts: vec![],
                    image_pull_policy: PullPolicy::IfNotPresent,
                })
                .collect(),
            service_account: None,
            security_context: None,
            restart_policy: RestartPolicy::Always,
            volumes: vec![],
        },
        status,
        status_message: None,
        node_name: Some("n1".to_string()),
        labels: HashMap::new(),
        annotations: HashMap::new(),
        owner_ref: None,
        created_at: Utc::now(),
    }
}

pub fn make_node(name: &str) -> Node {
    Node {
        name: name.to_string(),
        status: NodeStatus::Ready,
        address: "127.0.0.1".to_string(),
        agent_port: 50051,
        labels: HashMap::new(),
        registered_at: Utc::now(),
        last_heartbeat: None,
    }
}

pub fn make_container_checkpoint(name: &str, pod: &str, container: &str) -> ContainerCheckpoint {
    ContainerCheckpoint {
        name: name.to_string(),
        namespace: "default".to_string(),
        labels: HashMap::new(),
        owner_ref: None,
        spec: ContainerCheckpointSpec {
            pod_name: pod.to_string(),
            container_name: container.to_string(),
        },
        status: ContainerCheckpointStatus::default(),
        created_at: Utc::now(),
    }
}
