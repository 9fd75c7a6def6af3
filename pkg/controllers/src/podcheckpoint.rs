use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{Outcome, ReconcileError};
use crate::queue::Reconciler;
use pkg_constants::annotations::PARENT_LABEL;
use pkg_constants::state::POD_CHECKPOINTS_PREFIX;
use pkg_constants::timing::REQUEUE_SHORT_SECS;
use pkg_state::client::StateStore;
use pkg_state::keys;
use pkg_types::checkpoint::{
    CheckpointPhase, ContainerCheckpoint, ContainerCheckpointSpec, ContainerCheckpointStatus,
    PodCheckpoint, container_checkpoint_name,
};
use pkg_types::content::{PodCheckpointContent, PodCheckpointContentSpec, PodCheckpointContentStatus};
use pkg_types::pod::{Pod, PodStatus};
use pkg_types::validate::validate_child_name;

/// Fans a pod checkpoint out into one ContainerCheckpoint per container
/// and fans the results back into a PodCheckpointContent.
pub struct PodCheckpointReconciler {
    store: StateStore,
}

impl PodCheckpointReconciler {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    async fn fail(
        &self,
        key: &str,
        mut checkpoint: PodCheckpoint,
        error: ReconcileError,
    ) -> Result<Outcome, ReconcileError> {
        warn!(
            "pod checkpoint {} failed ({}): {}",
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

    /// Ensure one deterministically-named child per container. Creation is
    /// name-based and idempotent: re-entry after a partial fan-out only
    /// fills in the missing children.
    async fn ensure_children(
        &self,
        checkpoint: &PodCheckpoint,
        pod: &Pod,
    ) -> Result<(), ReconcileError> {
        for container in &pod.spec.containers {
            let child_name = container_checkpoint_name(&checkpoint.name, &container.name);
            let child_key = keys::container_checkpoint_key(&checkpoint.namespace, &child_name);
            let child = ContainerCheckpoint {
                name: child_name.clone(),
                namespace: checkpoint.namespace.clone(),
                labels: HashMap::from([(PARENT_LABEL.to_string(), checkpoint.name.clone())]),
                owner_ref: Some(keys::pod_checkpoint_key(
                    &checkpoint.namespace,
                    &checkpoint.name,
                )),
                spec: ContainerCheckpointSpec {
                    pod_name: pod.name.clone(),
                    container_name: container.name.clone(),
                },
                status: ContainerCheckpointStatus::default(),
                created_at: Utc::now(),
            };
            if self
                .store
                .create_json(&child_key, &child)
                .await
                .map_err(ReconcileError::transient)?
            {
                info!(
                    "pod checkpoint {} created container checkpoint {}",
                    checkpoint.name, child_name
                );
            }
        }
        Ok(())
    }

    async fn pending(
        &self,
        key: &str,
        mut checkpoint: PodCheckpoint,
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
        if pod.status != PodStatus::Running {
            let error = ReconcileError::Validation(format!(
                "source pod not running: {} is {}",
                pod.name, pod.status
            ));
            return self.fail(key, checkpoint, error).await;
        }
        for container in &pod.spec.containers {
            if let Err(e) = validate_child_name(&checkpoint.name, &container.name) {
                return self
                    .fail(key, checkpoint, ReconcileError::Validation(e.to_string()))
                    .await;
            }
        }

        self.ensure_children(&checkpoint, &pod).await?;

        checkpoint.status.phase = CheckpointPhase::Running;
        checkpoint.status.creation_time = Some(Utc::now());
        checkpoint.status.message = format!(
            "checkpointing {} container(s) of pod {}",
            pod.spec.containers.len(),
            pod.name
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
        mut checkpoint: PodCheckpoint,
    ) -> Result<Outcome, ReconcileError> {
        let children: Vec<ContainerCheckpoint> = self
            .store
            .list_json::<ContainerCheckpoint>(&keys::container_checkpoints_prefix(
                &checkpoint.namespace,
            ))
            .await
            .map_err(ReconcileError::transient)?
            .into_iter()
            .map(|(_, c)| c)
            .filter(|c| c.labels.get(PARENT_LABEL) == Some(&checkpoint.name))
            .collect();

        // A raced reconcile can observe Running before any child landed;
        // fall back to the Pending step, which re-creates what is missing.
        if children.is_empty() {
            return self.pending(key, checkpoint).await;
        }

        let mut container_contents = Vec::with_capacity(children.len());
        for child in &children {
            match child.status.phase {
                CheckpointPhase::Failed => {
                    let error = ReconcileError::AgentFailure(format!(
                        "container checkpoint {} failed: {}",
                        child.name, child.status.message
                    ));
                    return self.fail(key, checkpoint, error).await;
                }
                CheckpointPhase::Succeeded => match &child.status.bound_content_name {
                    Some(content_name) => container_contents.push(content_name.clone()),
                    // Succeeded without bound content is a torn status
                    // write; treat as still in progress.
                    None => {
                        return Ok(Outcome::RequeueAfter(std::time::Duration::from_secs(
                            REQUEUE_SHORT_SECS,
                        )));
                    }
                },
                CheckpointPhase::Pending | CheckpointPhase::Running => {
                    return Ok(Outcome::RequeueAfter(std::time::Duration::from_secs(
                        REQUEUE_SHORT_SECS,
                    )));
                }
            }
        }

        // Every child is terminal-Succeeded with bound content: aggregate.
        let content_key = keys::pod_content_key(&checkpoint.name);
        let existing: Option<PodCheckpointContent> = self
            .store
            .get_json(&content_key)
            .await
            .map_err(ReconcileError::transient)?;
        match existing {
            None => {
                let content = PodCheckpointContent {
                    name: checkpoint.name.clone(),
                    spec: PodCheckpointContentSpec {
                        pod_checkpoint_ref: checkpoint.name.clone(),
                        pod_namespace: checkpoint.namespace.clone(),
                        pod_name: checkpoint.spec.pod_name.clone(),
                        container_contents,
                    },
                    status: PodCheckpointContentStatus {
                        ready: true,
                        creation_time: Some(Utc::now()),
                    },
                    created_at: Utc::now(),
                };
                self.store
                    .create_json(&content_key, &content)
                    .await
                    .map_err(ReconcileError::transient)?;
                info!("pod checkpoint {} aggregated content created", checkpoint.name);
                // Verify readiness on the next pass before going Succeeded.
                Ok(Outcome::Requeue)
            }
            Some(content) if content.status.ready => {
                checkpoint.status.bound_content_name = Some(content.name.clone());
                checkpoint.status.phase = CheckpointPhase::Succeeded;
                checkpoint.status.ready = true;
                checkpoint.status.message =
                    format!("all {} container checkpoint(s) bound", children.len());
                checkpoint.status.completion_time = Some(Utc::now());
                self.store
                    .put_json(key, &checkpoint)
                    .await
                    .map_err(ReconcileError::transient)?;
                info!("pod checkpoint {} succeeded", checkpoint.name);
                Ok(Outcome::Done)
            }
            Some(_) => Ok(Outcome::RequeueAfter(std::time::Duration::from_secs(
                REQUEUE_SHORT_SECS,
            ))),
        }
    }
}

#[async_trait]
impl Reconciler for PodCheckpointReconciler {
    fn kind(&self) -> &'static str {
        "PodCheckpoint"
    }

    fn prefix(&self) -> &'static str {
        POD_CHECKPOINTS_PREFIX
    }

    async fn reconcile(&self, key: &str) -> Result<Outcome, ReconcileError> {
        if keys::split_namespaced(key, POD_CHECKPOINTS_PREFIX).is_none() {
            return Ok(Outcome::Done);
        }
        let checkpoint: Option<PodCheckpoint> = self
            .store
            .get_json(key)
            .await
            .map_err(ReconcileError::transient)?;
        let Some(checkpoint) = checkpoint else {
            return Ok(Outcome::Done);
        };
        match checkpoint.status.phase {
            CheckpointPhase::Pending => self.pending(key, checkpoint).await,
            CheckpointPhase::Running => self.running(key, checkpoint).await,
            CheckpointPhase::Succeeded | CheckpointPhase::Failed => Ok(Outcome::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{make_pod, open_store};
    use pkg_types::checkpoint::PodCheckpointSpec;

    fn make_pod_checkpoint(name: &str, pod: &str) -> PodCheckpoint {
        PodCheckpoint {
            name: name.to_string(),
            namespace: "default".to_string(),
            labels: HashMap::new(),
            owner_ref: None,
            spec: PodCheckpointSpec {
                pod_name: pod.to_string(),
            },
            status: Default::default(),
            created_at: Utc::now(),
        }
    }

    async fn seed(store: &StateStore, pod: &Pod, pc: &PodCheckpoint) -> String {
        store
            .put_json(&keys::pod_key(&pod.namespace, &pod.name), pod)
            .await
            .unwrap();
        let key = keys::pod_checkpoint_key(&pc.namespace, &pc.name);
        store.put_json(&key, pc).await.unwrap();
        key
    }

    async fn load(store: &StateStore, key: &str) -> PodCheckpoint {
        store.get_json(key).await.unwrap().unwrap()
    }

    async fn set_child_phase(
        store: &StateStore,
        name: &str,
        phase: CheckpointPhase,
        bound: bool,
        message: &str,
    ) {
        let key = keys::container_checkpoint_key("default", name);
        let mut child: ContainerCheckpoint = store.get_json(&key).await.unwrap().unwrap();
        child.status.phase = phase;
        child.status.message = message.to_string();
        child.status.ready = bound;
        child.status.bound_content_name = bound.then(|| name.to_string());
        store.put_json(&key, &child).await.unwrap();
    }

    #[tokio::test]
    async fn pending_creates_children_idempotently() {
        let (_dir, store) = open_store().await;
        let r = PodCheckpointReconciler::new(store.clone());
        let pod = make_pod("p1", &["a", "b"], PodStatus::Running);
        let key = seed(&store, &pod, &make_pod_checkpoint("m", "p1")).await;

        assert_eq!(r.reconcile(&key).await.unwrap(), Outcome::Requeue);
        let pc = load(&store, &key).await;
        assert_eq!(pc.status.phase, CheckpointPhase::Running);
        assert!(pc.status.creation_time.is_some());

        let children: Vec<(String, ContainerCheckpoint)> = store
            .list_json(&keys::container_checkpoints_prefix("default"))
            .await
            .unwrap();
        assert_eq!(children.len(), 2);
        let names: Vec<_> = children.iter().map(|(_, c)| c.name.as_str()).collect();
        assert_eq!(names, vec!["m-a", "m-b"]);
        for (_, child) in &children {
            assert_eq!(child.labels.get(PARENT_LABEL).map(String::as_str), Some("m"));
            assert_eq!(
                child.owner_ref.as_deref(),
                Some("/registry/podcheckpoints/default/m")
            );
        }

        // Re-entering Pending must not create duplicates or reset children.
        let mut pc = load(&store, &key).await;
        pc.status.phase = CheckpointPhase::Pending;
        store.put_json(&key, &pc).await.unwrap();
        set_child_phase(&store, "m-a", CheckpointPhase::Running, false, "").await;
        r.reconcile(&key).await.unwrap();
        let children: Vec<(String, ContainerCheckpoint)> = store
            .list_json(&keys::container_checkpoints_prefix("default"))
            .await
            .unwrap();
        assert_eq!(children.len(), 2);
        let m_a: ContainerCheckpoint = store
            .get_json(&keys::container_checkpoint_key("default", "m-a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m_a.status.phase, CheckpointPhase::Running);
    }

    #[tokio::test]
    async fn fan_in_waits_for_every_child() {
        let (_dir, store) = open_store().await;
        let r = PodCheckpointReconciler::new(store.clone());
        let pod = make_pod("p1", &["a", "b"], PodStatus::Running);
        let key = seed(&store, &pod, &make_pod_checkpoint("m", "p1")).await;
        r.reconcile(&key).await.unwrap();

        // First child done, second still running: parent stays Running.
        set_child_phase(&store, "m-a", CheckpointPhase::Succeeded, true, "").await;
        set_child_phase(&store, "m-b", CheckpointPhase::Running, false, "").await;
        assert!(matches!(
            r.reconcile(&key).await.unwrap(),
            Outcome::RequeueAfter(_)
        ));
        assert_eq!(load(&store, &key).await.status.phase, CheckpointPhase::Running);
        let content: Option<PodCheckpointContent> =
            store.get_json(&keys::pod_content_key("m")).await.unwrap();
        assert!(content.is_none());

        // Both children done: aggregate content appears, then the parent
        // verifies readiness and succeeds.
        set_child_phase(&store, "m-b", CheckpointPhase::Succeeded, true, "").await;
        assert_eq!(r.reconcile(&key).await.unwrap(), Outcome::Requeue);
        let content: PodCheckpointContent = store
            .get_json(&keys::pod_content_key("m"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content.spec.container_contents, vec!["m-a", "m-b"]);
        assert!(content.status.ready);

        assert_eq!(r.reconcile(&key).await.unwrap(), Outcome::Done);
        let pc = load(&store, &key).await;
        assert_eq!(pc.status.phase, CheckpointPhase::Succeeded);
        assert!(pc.status.ready);
        assert_eq!(pc.status.bound_content_name.as_deref(), Some("m"));
        assert!(pc.status.completion_time.is_some());
    }

    #[tokio::test]
    async fn child_failure_propagates_and_blocks_content() {
        let (_dir, store) = open_store().await;
        let r = PodCheckpointReconciler::new(store.clone());
        let pod = make_pod("p1", &["a", "b"], PodStatus::Running);
        let key = seed(&store, &pod, &make_pod_checkpoint("m", "p1")).await;
        r.reconcile(&key).await.unwrap();

        set_child_phase(&store, "m-a", CheckpointPhase::Succeeded, true, "").await;
        set_child_phase(
            &store,
            "m-b",
            CheckpointPhase::Failed,
            false,
            "checkpoint agent call failed: endpoint refused",
        )
        .await;

        assert_eq!(r.reconcile(&key).await.unwrap(), Outcome::Done);
        let pc = load(&store, &key).await;
        assert_eq!(pc.status.phase, CheckpointPhase::Failed);
        assert!(pc.status.message.contains("m-b"));
        assert!(pc.status.message.contains("endpoint refused"));
        let content: Option<PodCheckpointContent> =
            store.get_json(&keys::pod_content_key("m")).await.unwrap();
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn missing_pod_fails_terminally() {
        let (_dir, store) = open_store().await;
        let r = PodCheckpointReconciler::new(store.clone());
        let pc = make_pod_checkpoint("m", "ghost");
        let key = keys::pod_checkpoint_key("default", "m");
        store.put_json(&key, &pc).await.unwrap();

        assert_eq!(r.reconcile(&key).await.unwrap(), Outcome::Done);
        let pc = load(&store, &key).await;
        assert_eq!(pc.status.phase, CheckpointPhase::Failed);
        assert!(pc.status.message.contains("source pod not found"));
    }

    #[tokio::test]
    async fn running_with_no_children_reinvokes_pending() {
        let (_dir, store) = open_store().await;
        let r = PodCheckpointReconciler::new(store.clone());
        let pod = make_pod("p1", &["a"], PodStatus::Running);
        let mut pc = make_pod_checkpoint("m", "p1");
        pc.status.phase = CheckpointPhase::Running;
        let key = seed(&store, &pod, &pc).await;

        assert_eq!(r.reconcile(&key).await.unwrap(), Outcome::Requeue);
        let child: Option<ContainerCheckpoint> = store
            .get_json(&keys::container_checkpoint_key("default", "m-a"))
            .await
            .unwrap();
        assert!(child.is_some());
    }
}
