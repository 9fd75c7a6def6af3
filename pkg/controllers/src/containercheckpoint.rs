use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::{CheckpointAgent, CheckpointCall};
use crate::error::{Outcome, ReconcileError};
use crate::queue::Reconciler;
use pkg_constants::state::CONTAINER_CHECKPOINTS_PREFIX;
use pkg_state::client::StateStore;
use pkg_state::keys;
use pkg_types::checkpoint::{CheckpointPhase, ContainerCheckpoint};
use pkg_types::content::{ContainerCheckpointContent, ContainerCheckpointContentSpec};
use pkg_types::node::Node;
use pkg_types::pod::{Pod, PodStatus};

/// Drives a single container's checkpoint: validates the pod, calls the
/// agent on the pod's node exactly once, and binds the resulting Content.
pub struct ContainerCheckpointReconciler {
    store: StateStore,
    agent: Arc<dyn CheckpointAgent>,
}

impl ContainerCheckpointReconciler {
    pub fn new(store: StateStore, agent: Arc<dyn CheckpointAgent>) -> Self {
        Self { store, agent }
    }

    /// Terminal failure: persist Failed plus the classified reason. Not
    /// retried; the user or the parent PodCheckpoint must recreate the
    /// object.
    async fn fail(
        &self,
        key: &str,
        mut checkpoint: ContainerCheckpoint,
        error: ReconcileError,
    ) -> Result<Outcome, ReconcileError> {
        warn!(
            "container checkpoint {} failed ({}): {}",
            checkpoint.name,
            error.kind(),
            error
        );
        checkpoint.status.phase = CheckpointPhase::Failed;
        checkpoint.status.message = error.to_string();
        checkpoint.status.ready = false;
        self.store
            .put_json(key, &checkpoint)
            .await
            .map_err(ReconcileError::transient)?;
        Ok(Outcome::Done)
    }

    /// Record the bound Content and the Succeeded phase in one status write.
    async fn bind(
        &self,
        key: &str,
        mut checkpoint: ContainerCheckpoint,
    ) -> Result<Outcome, ReconcileError> {
        let name = checkpoint.name.clone();
        checkpoint.status.bound_content_name = Some(name.clone());
        checkpoint.status.phase = CheckpointPhase::Succeeded;
        checkpoint.status.ready = true;
        checkpoint.status.message = format!("checkpoint content {} bound", name);
        checkpoint.status.completion_time = Some(Utc::now());
        self.store
            .put_json(key, &checkpoint)
            .await
            .map_err(ReconcileError::transient)?;
        info!("container checkpoint {} succeeded", name);
        Ok(Outcome::Done)
    }

    async fn pending(
        &self,
        key: &str,
        mut checkpoint: ContainerCheckpoint,
    ) -> Result<Outcome, ReconcileError> {
        let pod_key = keys::pod_key(&checkpoint.namespace, &checkpoint.spec.pod_name);
        let pod: Option<Pod> = self
            .store
            .get_json(&pod_key)
            .await
            .map_err(ReconcileError::transient)?;
        let Some(pod) = pod else {
            let error = ReconcileError::Validation(format!(
                "source pod not found: {}",
                checkpoint.spec.pod_name
            ));
            return self.fail(key, checkpoint, error).await;
        };
        if pod.container(&checkpoint.spec.container_name).is_none() {
            let error = ReconcileError::Validation(format!(
                "container {} not found in pod {}",
                checkpoint.spec.container_name, pod.name
            ));
            return self.fail(key, checkpoint, error).await;
        }
        if pod.status != PodStatus::Running {
            let error = ReconcileError::Validation(format!(
                "source pod not running: {} is {}",
                pod.name, pod.status
            ));
            return self.fail(key, checkpoint, error).await;
        }

        checkpoint.status.phase = CheckpointPhase::Running;
        checkpoint.status.message = format!(
            "checkpointing container {} of pod {}",
            checkpoint.spec.container_name, pod.name
        );
        self.store
            .put_json(key, &checkpoint)
            .await
            .map_err(ReconcileError::transient)?;
        Ok(Outcome::Requeue)
    }

    async fn running(
        &self,
        key: &str,
        checkpoint: ContainerCheckpoint,
    ) -> Result<Outcome, ReconcileError> {
        // bound_content_name is the at-most-once latch: non-empty means the
        // agent already succeeded and only the status write was lost.
        if checkpoint.status.bound_content_name.is_some() {
            return self.bind(key, checkpoint).await;
        }

        // Crash between Content create and status update: the Content
        // exists under our deterministic name. Treat as success and bind.
        let content_key = keys::container_content_key(&checkpoint.name);
        let existing: Option<ContainerCheckpointContent> = self
            .store
            .get_json(&content_key)
            .await
            .map_err(ReconcileError::transient)?;
        if existing.is_some() {
            info!(
                "container checkpoint {} rebinding to existing content",
                checkpoint.name
            );
            return self.bind(key, checkpoint).await;
        }

        let pod_key = keys::pod_key(&checkpoint.namespace, &checkpoint.spec.pod_name);
        let pod: Option<Pod> = self
            .store
            .get_json(&pod_key)
            .await
            .map_err(ReconcileError::transient)?;
        let Some(pod) = pod else {
            let error = ReconcileError::Validation(format!(
                "source pod disappeared: {}",
                checkpoint.spec.pod_name
            ));
            return self.fail(key, checkpoint, error).await;
        };
        let Some(node_name) = pod.node_name.clone() else {
            let error =
                ReconcileError::Validation(format!("pod {} has no node assigned", pod.name));
            return self.fail(key, checkpoint, error).await;
        };
        let node: Option<Node> = self
            .store
            .get_json(&keys::node_key(&node_name))
            .await
            .map_err(ReconcileError::transient)?;
        let Some(node) = node else {
            let error = ReconcileError::Validation(format!("node not found: {}", node_name));
            return self.fail(key, checkpoint, error).await;
        };

        let call = CheckpointCall {
            pod_namespace: checkpoint.namespace.clone(),
            pod_name: pod.name.clone(),
            container_name: checkpoint.spec.container_name.clone(),
            pod_uid: pod.uid.clone(),
        };
        // The one non-idempotent edge: dying between a successful agent
        // call and the Content create reruns the agent and publishes a
        // second archive; the second Content wins.
        match self.agent.checkpoint(&node.agent_endpoint(), &call).await {
            Ok(artifact_uri) => {
                let content = ContainerCheckpointContent {
                    name: checkpoint.name.clone(),
                    spec: ContainerCheckpointContentSpec {
                        container_checkpoint_ref: checkpoint.name.clone(),
                        pod_namespace: checkpoint.namespace.clone(),
                        pod_name: pod.name.clone(),
                        container_name: checkpoint.spec.container_name.clone(),
                        artifact_uri,
                    },
                    created_at: Utc::now(),
                };
                // A concurrent reconcile may have won the create; binding to
                // the winner is equivalent.
                self.store
                    .create_json(&content_key, &content)
                    .await
                    .map_err(ReconcileError::transient)?;
                self.bind(key, checkpoint).await
            }
            Err(e) => {
                let error =
                    ReconcileError::AgentFailure(format!("checkpoint agent call failed: {}", e));
                self.fail(key, checkpoint, error).await
            }
        }
    }
}

#[async_trait]
impl Reconciler for ContainerCheckpointReconciler {
    fn kind(&self) -> &'static str {
        "ContainerCheckpoint"
    }

    fn prefix(&self) -> &'static str {
        CONTAINER_CHECKPOINTS_PREFIX
    }

    async fn reconcile(&self, key: &str) -> Result<Outcome, ReconcileError> {
        if keys::split_namespaced(key, CONTAINER_CHECKPOINTS_PREFIX).is_none() {
            return Ok(Outcome::Done);
        }
        let checkpoint: Option<ContainerCheckpoint> = self
            .store
            .get_json(key)
            .await
            .map_err(ReconcileError::transient)?;
        let Some(checkpoint) = checkpoint else {
            // Deleted; owners clean up their own children.
            return Ok(Outcome::Done);
        };
        match checkpoint.status.phase {
            CheckpointPhase::Pending => self.pending(key, checkpoint).await,
            CheckpointPhase::Running => self.running(key, checkpoint).await,
            // Terminal phases are sticky.
            CheckpointPhase::Succeeded | CheckpointPhase::Failed => Ok(Outcome::Done),
        }
    }
}
