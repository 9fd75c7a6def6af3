use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Outcome, ReconcileError};
use crate::queue::Reconciler;
use pkg_artifacts::ArtifactUri;
use pkg_constants::annotations::{
    CHECKPOINT_SOURCE_ANNOTATION, SOURCE_POD_ANNOTATION, TARGET_NODE_ANNOTATION,
};
use pkg_constants::state::MIGRATIONS_PREFIX;
use pkg_constants::timing::{REQUEUE_SHORT_SECS, RESTORE_POLL_SECS};
use pkg_state::client::StateStore;
use pkg_state::keys;
use pkg_types::checkpoint::{CheckpointPhase, PodCheckpoint, PodCheckpointSpec};
use pkg_types::content::{ContainerCheckpointContent, PodCheckpointContent};
use pkg_types::migration::{Migration, MigrationPhase, restored_pod_name};
use pkg_types::node::Node;
use pkg_types::pod::{Pod, PodStatus, PullPolicy, RestartPolicy};
use pkg_types::validate::validate_child_name;

/// End-to-end orchestrator: validates the source, owns a PodCheckpoint,
/// materializes the restored pod from the bound Content, and retires the
/// source pod.
pub struct MigrationReconciler {
    store: StateStore,
    shared_mount: PathBuf,
}

impl MigrationReconciler {
    pub fn new(store: StateStore, shared_mount: impl Into<PathBuf>) -> Self {
        Self {
            store,
            shared_mount: shared_mount.into(),
        }
    }

    async fn fail(
        &self,
        key: &str,
        mut migration: Migration,
        error: ReconcileError,
    ) -> Result<Outcome, ReconcileError> {
        warn!(
            "migration {} failed ({}): {}",
            migration.name,
            error.kind(),
            error
        );
        migration.status.phase = MigrationPhase::Failed;
        migration.status.message = error.to_string();
        self.store
            .put_json(key, &migration)
            .await
            .map_err(ReconcileError::transient)?;
        Ok(Outcome::Done)
    }

    async fn advance(
        &self,
        key: &str,
        mut migration: Migration,
        phase: MigrationPhase,
        message: String,
    ) -> Result<Outcome, ReconcileError> {
        info!("migration {}: {} ({})", migration.name, phase, message);
        migration.status.phase = phase;
        migration.status.message = message;
        self.store
            .put_json(key, &migration)
            .await
            .map_err(ReconcileError::transient)?;
        Ok(Outcome::Requeue)
    }

    async fn pending(&self, key: &str, mut migration: Migration) -> Result<Outcome, ReconcileError> {
        let pod_key = keys::pod_key(&migration.namespace, &migration.spec.pod_name);
        let pod: Option<Pod> = self
            .store
            .get_json(&pod_key)
            .await
            .map_err(ReconcileError::transient)?;
        let Some(pod) = pod else {
            let error = ReconcileError::Validation(format!(
                "source pod not found: {}",
                migration.spec.pod_name
            ));
            return self.fail(key, migration, error).await;
        };
        if pod.status != PodStatus::Running {
            let error = ReconcileError::Validation(format!(
                "source pod not running: {} is {}",
                pod.name, pod.status
            ));
            return self.fail(key, migration, error).await;
        }
        // The restored pod's name is derived from the source's; reject it
        // here rather than at pod-creation time, three phases later.
        if let Err(e) = validate_child_name(&pod.name, "restored") {
            return self
                .fail(key, migration, ReconcileError::Validation(e.to_string()))
                .await;
        }
        if !migration.spec.target_node.is_empty() {
            let node: Option<Node> = self
                .store
                .get_json(&keys::node_key(&migration.spec.target_node))
                .await
                .map_err(ReconcileError::transient)?;
            if node.is_none() {
                let error = ReconcileError::Validation(format!(
                    "target node not found: {}",
                    migration.spec.target_node
                ));
                return self.fail(key, migration, error).await;
            }
        }

        // One PodCheckpoint per Migration, named after it; re-entry binds
        // to the existing object instead of creating a second.
        let checkpoint = PodCheckpoint {
            name: migration.name.clone(),
            namespace: migration.namespace.clone(),
            labels: HashMap::new(),
            owner_ref: Some(keys::migration_key(&migration.namespace, &migration.name)),
            spec: PodCheckpointSpec {
                pod_name: migration.spec.pod_name.clone(),
            },
            status: Default::default(),
            created_at: Utc::now(),
        };
        let checkpoint_key = keys::pod_checkpoint_key(&migration.namespace, &migration.name);
        if self
            .store
            .create_json(&checkpoint_key, &checkpoint)
            .await
            .map_err(ReconcileError::transient)?
        {
            info!(
                "migration {} created pod checkpoint {}",
                migration.name, checkpoint.name
            );
        }

        migration.status.pod_checkpoint_ref = Some(migration.name.clone());
        let message = format!("checkpointing pod {}", migration.spec.pod_name);
        self.advance(key, migration, MigrationPhase::Checkpointing, message)
            .await
    }

    async fn checkpointing(
        &self,
        key: &str,
        migration: Migration,
    ) -> Result<Outcome, ReconcileError> {
        let ref_name = migration
            .status
            .pod_checkpoint_ref
            .clone()
            .unwrap_or_else(|| migration.name.clone());
        let checkpoint: Option<PodCheckpoint> = self
            .store
            .get_json(&keys::pod_checkpoint_key(&migration.namespace, &ref_name))
            .await
            .map_err(ReconcileError::transient)?;
        let Some(checkpoint) = checkpoint else {
            let error = ReconcileError::Internal(format!("pod checkpoint missing: {}", ref_name));
            return self.fail(key, migration, error).await;
        };
        match checkpoint.status.phase {
            CheckpointPhase::Succeeded if checkpoint.status.ready => {
                let message = format!("pod checkpoint {} complete", ref_name);
                self.advance(key, migration, MigrationPhase::CheckpointComplete, message)
                    .await
            }
            CheckpointPhase::Failed => {
                let error = ReconcileError::AgentFailure(format!(
                    "pod checkpoint {} failed: {}",
                    ref_name, checkpoint.status.message
                ));
                self.fail(key, migration, error).await
            }
            _ => Ok(Outcome::RequeueAfter(Duration::from_secs(REQUEUE_SHORT_SECS))),
        }
    }

    /// Resolve each container's archive through the Content indirection:
    /// PodCheckpointContent → ContainerCheckpointContent → artifact URI.
    async fn resolve_artifacts(
        &self,
        content: &PodCheckpointContent,
    ) -> Result<Result<HashMap<String, String>, String>, ReconcileError> {
        let mut by_container = HashMap::new();
        for content_name in &content.spec.container_contents {
            let item: Option<ContainerCheckpointContent> = self
                .store
                .get_json(&keys::container_content_key(content_name))
                .await
                .map_err(ReconcileError::transient)?;
            let Some(item) = item else {
                return Ok(Err(format!(
                    "container checkpoint content missing: {}",
                    content_name
                )));
            };
            by_container.insert(item.spec.container_name.clone(), item.spec.artifact_uri.clone());
        }
        Ok(Ok(by_container))
    }

    /// Clone the source pod into the restored pod manifest. Returns a
    /// user-facing failure message when an artifact URI cannot be resolved.
    fn build_restored_pod(
        &self,
        migration: &Migration,
        source: &Pod,
        content_name: &str,
        artifacts: &HashMap<String, String>,
    ) -> Result<Pod, String> {
        let mut spec = source.spec.clone();
        spec.restart_policy = RestartPolicy::Never;
        for container in &mut spec.containers {
            let Some(raw_uri) = artifacts.get(&container.name) else {
                return Err(format!(
                    "no checkpoint content for container {}",
                    container.name
                ));
            };
            let uri = ArtifactUri::parse(raw_uri)
                .map_err(|e| format!("container {}: {}", container.name, e))?;
            // The host runtime detects a checkpoint path in the image field
            // and takes the restore path instead of a registry pull.
            container.image = uri.resolve(&self.shared_mount).display().to_string();
            container.image_pull_policy = PullPolicy::Never;
        }

        let mut annotations = source.annotations.clone();
        annotations.insert(SOURCE_POD_ANNOTATION.to_string(), source.name.clone());
        annotations.insert(
            TARGET_NODE_ANNOTATION.to_string(),
            migration.spec.target_node.clone(),
        );
        annotations.insert(
            CHECKPOINT_SOURCE_ANNOTATION.to_string(),
            content_name.to_string(),
        );

        Ok(Pod {
            // Fresh identity: the restored pod is a new object, not an
            // update of the source.
            uid: Uuid::new_v4().to_string(),
            name: restored_pod_name(&source.name),
            namespace: source.namespace.clone(),
            spec,
            status: PodStatus::Pending,
            status_message: None,
            node_name: if migration.spec.target_node.is_empty() {
                None
            } else {
                Some(migration.spec.target_node.clone())
            },
            labels: source.labels.clone(),
            annotations,
            owner_ref: Some(keys::migration_key(&migration.namespace, &migration.name)),
            created_at: Utc::now(),
        })
    }

    async fn checkpoint_complete(
        &self,
        key: &str,
        mut migration: Migration,
    ) -> Result<Outcome, ReconcileError> {
        let pod_key = keys::pod_key(&migration.namespace, &migration.spec.pod_name);
        let source: Option<Pod> = self
            .store
            .get_json(&pod_key)
            .await
            .map_err(ReconcileError::transient)?;
        let Some(source) = source else {
            let error = ReconcileError::Validation(format!(
                "source pod not found: {}",
                migration.spec.pod_name
            ));
            return self.fail(key, migration, error).await;
        };

        let content_name = migration
            .status
            .pod_checkpoint_ref
            .clone()
            .unwrap_or_else(|| migration.name.clone());
        let content: Option<PodCheckpointContent> = self
            .store
            .get_json(&keys::pod_content_key(&content_name))
            .await
            .map_err(ReconcileError::transient)?;
        let Some(content) = content else {
            let error =
                ReconcileError::Internal(format!("pod checkpoint content missing: {}", content_name));
            return self.fail(key, migration, error).await;
        };

        let artifacts = match self.resolve_artifacts(&content).await? {
            Ok(map) => map,
            Err(message) => {
                return self
                    .fail(key, migration, ReconcileError::Internal(message))
                    .await;
            }
        };
        let restored = match self.build_restored_pod(&migration, &source, &content.name, &artifacts)
        {
            Ok(pod) => pod,
            Err(message) => {
                return self
                    .fail(key, migration, ReconcileError::RestoreFailure(message))
                    .await;
            }
        };

        // AlreadyExists is an idempotent retry, not a conflict.
        let restored_key = keys::pod_key(&restored.namespace, &restored.name);
        if self
            .store
            .create_json(&restored_key, &restored)
            .await
            .map_err(ReconcileError::transient)?
        {
            info!(
                "migration {} created restored pod {} on {}",
                migration.name,
                restored.name,
                restored.node_name.as_deref().unwrap_or("<scheduler>")
            );
        }

        migration.status.restored_pod_name = Some(restored.name.clone());
        let message = format!("restoring pod as {}", restored.name);
        self.advance(key, migration, MigrationPhase::Restoring, message)
            .await
    }

    async fn restoring(&self, key: &str, mut migration: Migration) -> Result<Outcome, ReconcileError> {
        let restored_name = migration
            .status
            .restored_pod_name
            .clone()
            .unwrap_or_else(|| restored_pod_name(&migration.spec.pod_name));
        let restored: Option<Pod> = self
            .store
            .get_json(&keys::pod_key(&migration.namespace, &restored_name))
            .await
            .map_err(ReconcileError::transient)?;
        let Some(restored) = restored else {
            // Created in the previous phase; give the store a beat.
            return Ok(Outcome::RequeueAfter(Duration::from_secs(RESTORE_POLL_SECS)));
        };

        match restored.status {
            PodStatus::Running => {
                // Best-effort retirement of the source pod; the migration
                // still succeeds if the source is already gone.
                let source_key = keys::pod_key(&migration.namespace, &migration.spec.pod_name);
                if let Err(e) = self.store.delete(&source_key).await {
                    warn!(
                        "migration {}: failed to delete source pod {}: {}",
                        migration.name, migration.spec.pod_name, e
                    );
                }
                migration.status.phase = MigrationPhase::Succeeded;
                migration.status.message =
                    format!("pod {} migrated as {}", migration.spec.pod_name, restored_name);
                self.store
                    .put_json(key, &migration)
                    .await
                    .map_err(ReconcileError::transient)?;
                info!("migration {} succeeded", migration.name);
                Ok(Outcome::Done)
            }
            PodStatus::Failed => {
                let error = ReconcileError::RestoreFailure(format!(
                    "restored pod {} failed: {}",
                    restored_name,
                    restored.status_message.as_deref().unwrap_or("no details")
                ));
                self.fail(key, migration, error).await
            }
            _ => Ok(Outcome::RequeueAfter(Duration::from_secs(RESTORE_POLL_SECS))),
        }
    }
}

#[async_trait]
impl Reconciler for MigrationReconciler {
    fn kind(&self) -> &'static str {
        "Migration"
    }

    fn prefix(&self) -> &'static str {
        MIGRATIONS_PREFIX
    }

    async fn reconcile(&self, key: &str) -> Result<Outcome, ReconcileError> {
        if keys::split_namespaced(key, MIGRATIONS_PREFIX).is_none() {
            return Ok(Outcome::Done);
        }
        let migration: Option<Migration> = self
            .store
            .get_json(key)
            .await
            .map_err(ReconcileError::transient)?;
        let Some(migration) = migration else {
            return Ok(Outcome::Done);
        };
        match migration.status.phase {
            MigrationPhase::Pending => self.pending(key, migration).await,
            MigrationPhase::Checkpointing => self.checkpointing(key, migration).await,
            MigrationPhase::CheckpointComplete => self.checkpoint_complete(key, migration).await,
            MigrationPhase::Restoring => self.restoring(key, migration).await,
            MigrationPhase::Succeeded | MigrationPhase::Failed => Ok(Outcome::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containercheckpoint::ContainerCheckpointReconciler;
    use crate::podcheckpoint::PodCheckpointReconciler;
    use crate::testutil::{FakeAgent, make_node, make_pod, open_store};
    use pkg_types::migration::MigrationSpec;
    use std::sync::Arc;

    fn make_migration(name: &str, pod: &str, target: &str) -> Migration {
        Migration {
            name: name.to_string(),
            namespace: "default".to_string(),
            labels: HashMap::new(),
            owner_ref: None,
            spec: MigrationSpec {
                pod_name: pod.to_string(),
                target_node: target.to_string(),
            },
            status: Default::default(),
            created_at: Utc::now(),
        }
    }

    async fn seed_migration(store: &StateStore, migration: &Migration) -> String {
        let key = keys::migration_key(&migration.namespace, &migration.name);
        store.put_json(&key, migration).await.unwrap();
        key
    }

    async fn load(store: &StateStore, key: &str) -> Migration {
        store.get_json(key).await.unwrap().unwrap()
    }

    async fn set_pod_status(store: &StateStore, name: &str, status: PodStatus, message: &str) {
        let key = keys::pod_key("default", name);
        let mut pod: Pod = store.get_json(&key).await.unwrap().unwrap();
        pod.status = status;
        pod.status_message = (!message.is_empty()).then(|| message.to_string());
        store.put_json(&key, &pod).await.unwrap();
    }

    fn reconcilers(
        store: &StateStore,
        agent: Arc<FakeAgent>,
    ) -> (
        MigrationReconciler,
        PodCheckpointReconciler,
        ContainerCheckpointReconciler,
    ) {
        (
            MigrationReconciler::new(store.clone(), "/mnt/checkpoints"),
            PodCheckpointReconciler::new(store.clone()),
            ContainerCheckpointReconciler::new(store.clone(), agent),
        )
    }

    /// Run every reconciler over every object of its kind until nothing
    /// changes any more, a miniature control loop for tests.
    async fn settle(
        store: &StateStore,
        m: &MigrationReconciler,
        pc: &PodCheckpointReconciler,
        cc: &ContainerCheckpointReconciler,
    ) {
        for _ in 0..16 {
            for prefix in [
                pkg_constants::state::MIGRATIONS_PREFIX,
                pkg_constants::state::POD_CHECKPOINTS_PREFIX,
                pkg_constants::state::CONTAINER_CHECKPOINTS_PREFIX,
            ] {
                for (key, _) in store.list_prefix(prefix).await.unwrap() {
                    if prefix == pkg_constants::state::MIGRATIONS_PREFIX {
                        let _ = m.reconcile(&key).await;
                    } else if prefix == pkg_constants::state::POD_CHECKPOINTS_PREFIX {
                        let _ = pc.reconcile(&key).await;
                    } else {
                        let _ = cc.reconcile(&key).await;
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn pod_not_running_fails_immediately() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://x.tar");
        let (m, _, _) = reconcilers(&store, agent);
        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["web"], PodStatus::Pending),
            )
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "n2")).await;

        assert_eq!(m.reconcile(&key).await.unwrap(), Outcome::Done);
        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Failed);
        assert!(migration.status.message.contains("source pod not running"));
    }

    #[tokio::test]
    async fn missing_source_pod_fails() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://x.tar");
        let (m, _, _) = reconcilers(&store, agent);
        let key = seed_migration(&store, &make_migration("m1", "ghost", "")).await;

        m.reconcile(&key).await.unwrap();
        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Failed);
        assert!(migration.status.message.contains("source pod not found"));
    }

    #[tokio::test]
    async fn missing_target_node_fails() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://x.tar");
        let (m, _, _) = reconcilers(&store, agent);
        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["web"], PodStatus::Running),
            )
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "ghost")).await;

        m.reconcile(&key).await.unwrap();
        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Failed);
        assert!(migration.status.message.contains("target node not found"));
    }

    #[tokio::test]
    async fn pending_creates_owned_pod_checkpoint_idempotently() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://x.tar");
        let (m, _, _) = reconcilers(&store, agent);
        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["web"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n2"), &make_node("n2"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "n2")).await;

        assert_eq!(m.reconcile(&key).await.unwrap(), Outcome::Requeue);
        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Checkpointing);
        assert_eq!(migration.status.pod_checkpoint_ref.as_deref(), Some("m1"));

        let checkpoint: PodCheckpoint = store
            .get_json(&keys::pod_checkpoint_key("default", "m1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.spec.pod_name, "p1");
        assert_eq!(
            checkpoint.owner_ref.as_deref(),
            Some("/registry/migrations/default/m1")
        );

        // Applying the same spec again converges on the same object graph.
        let mut migration = load(&store, &key).await;
        migration.status = Default::default();
        store.put_json(&key, &migration).await.unwrap();
        m.reconcile(&key).await.unwrap();
        let checkpoints = store
            .list_prefix(pkg_constants::state::POD_CHECKPOINTS_PREFIX)
            .await
            .unwrap();
        assert_eq!(checkpoints.len(), 1);
    }

    #[tokio::test]
    async fn happy_path_single_container() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://p1-uid-c-20260801-120000.tar");
        let (m, pc, cc) = reconcilers(&store, agent.clone());

        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n1"), &make_node("n1"))
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n2"), &make_node("n2"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "n2")).await;

        settle(&store, &m, &pc, &cc).await;

        // Checkpoint side of the graph.
        let pod_ckpt: PodCheckpoint = store
            .get_json(&keys::pod_checkpoint_key("default", "m1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pod_ckpt.status.phase, CheckpointPhase::Succeeded);
        let container_ckpt: pkg_types::checkpoint::ContainerCheckpoint = store
            .get_json(&keys::container_checkpoint_key("default", "m1-c"))
            .await
            .unwrap()
            .unwrap();
        assert!(container_ckpt.status.ready);
        let content: ContainerCheckpointContent = store
            .get_json(&keys::container_content_key("m1-c"))
            .await
            .unwrap()
            .unwrap();
        assert!(content.spec.artifact_uri.starts_with("shared://"));
        assert!(content.spec.artifact_uri.ends_with("-c-20260801-120000.tar"));

        // Restored pod exists, targeted and rewritten.
        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Restoring);
        let restored: Pod = store
            .get_json(&keys::pod_key("default", "p1-restored"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.node_name.as_deref(), Some("n2"));
        assert_eq!(
            restored.spec.containers[0].image,
            "/mnt/checkpoints/p1-uid-c-20260801-120000.tar"
        );
        assert_eq!(restored.spec.containers[0].image_pull_policy, PullPolicy::Never);
        assert_eq!(restored.spec.restart_policy, RestartPolicy::Never);
        assert_eq!(
            restored.annotations.get(SOURCE_POD_ANNOTATION).map(String::as_str),
            Some("p1")
        );
        assert_eq!(
            restored.annotations.get(TARGET_NODE_ANNOTATION).map(String::as_str),
            Some("n2")
        );
        assert_eq!(agent.call_count(), 1);

        // The host runtime restores the pod; the migration then retires the
        // source and succeeds.
        set_pod_status(&store, "p1-restored", PodStatus::Running, "").await;
        settle(&store, &m, &pc, &cc).await;
        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Succeeded);
        let source: Option<Pod> = store.get_json(&keys::pod_key("default", "p1")).await.unwrap();
        assert!(source.is_none());
        assert_eq!(agent.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_target_node_delegates_to_scheduler() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://p1-uid-c-20260801-120000.tar");
        let (m, pc, cc) = reconcilers(&store, agent);

        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n1"), &make_node("n1"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "")).await;

        settle(&store, &m, &pc, &cc).await;

        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Restoring);
        let restored: Pod = store
            .get_json(&keys::pod_key("default", "p1-restored"))
            .await
            .unwrap()
            .unwrap();
        assert!(restored.node_name.is_none());
    }

    #[tokio::test]
    async fn agent_failure_propagates_to_the_migration() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::failing("checkpoint endpoint returned 404 Not Found");
        let (m, pc, cc) = reconcilers(&store, agent);

        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n1"), &make_node("n1"))
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n2"), &make_node("n2"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "n2")).await;

        settle(&store, &m, &pc, &cc).await;

        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Failed);
        assert!(migration.status.message.contains("404 Not Found"));
        let pod_content: Option<PodCheckpointContent> =
            store.get_json(&keys::pod_content_key("m1")).await.unwrap();
        assert!(pod_content.is_none());
        let container_content: Option<ContainerCheckpointContent> = store
            .get_json(&keys::container_content_key("m1-c"))
            .await
            .unwrap();
        assert!(container_content.is_none());
    }

    #[tokio::test]
    async fn restore_failure_keeps_the_source_pod() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://p1-uid-c-20260801-120000.tar");
        let (m, pc, cc) = reconcilers(&store, agent);

        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n1"), &make_node("n1"))
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n2"), &make_node("n2"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "n2")).await;

        settle(&store, &m, &pc, &cc).await;
        set_pod_status(
            &store,
            "p1-restored",
            PodStatus::Failed,
            "restore engine rejected the archive",
        )
        .await;
        settle(&store, &m, &pc, &cc).await;

        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Failed);
        assert!(migration.status.message.contains("restore engine rejected"));
        let source: Option<Pod> = store.get_json(&keys::pod_key("default", "p1")).await.unwrap();
        assert!(source.is_some(), "source pod must survive a failed restore");
    }

    #[tokio::test]
    async fn source_pod_vanishing_mid_restore_still_succeeds() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("shared://p1-uid-c-20260801-120000.tar");
        let (m, pc, cc) = reconcilers(&store, agent);

        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n1"), &make_node("n1"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "")).await;

        settle(&store, &m, &pc, &cc).await;
        store.delete(&keys::pod_key("default", "p1")).await.unwrap();
        set_pod_status(&store, "p1-restored", PodStatus::Running, "").await;
        settle(&store, &m, &pc, &cc).await;

        assert_eq!(load(&store, &key).await.status.phase, MigrationPhase::Succeeded);
    }

    #[tokio::test]
    async fn unsupported_artifact_scheme_fails_the_restore() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("oci://registry/image:tag");
        let (m, pc, cc) = reconcilers(&store, agent);

        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n1"), &make_node("n1"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "")).await;

        settle(&store, &m, &pc, &cc).await;

        let migration = load(&store, &key).await;
        assert_eq!(migration.status.phase, MigrationPhase::Failed);
        assert!(migration.status.message.contains("unsupported artifact URI"));
    }

    #[tokio::test]
    async fn file_uri_passes_through_unchanged() {
        let (_dir, store) = open_store().await;
        let agent = FakeAgent::succeeding("file:///var/lib/host/ckpt.tar");
        let (m, pc, cc) = reconcilers(&store, agent);

        store
            .put_json(
                &keys::pod_key("default", "p1"),
                &make_pod("p1", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        store
            .put_json(&keys::node_key("n1"), &make_node("n1"))
            .await
            .unwrap();
        let key = seed_migration(&store, &make_migration("m1", "p1", "")).await;

        settle(&store, &m, &pc, &cc).await;

        let restored: Pod = store
            .get_json(&keys::pod_key("default", "p1-restored"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.spec.containers[0].image, "/var/lib/host/ckpt.tar");
    }
}
