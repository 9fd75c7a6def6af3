use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pkg_constants::state::{
    CONTAINER_CHECKPOINTS_PREFIX, CONTAINER_CHECKPOINT_CONTENTS_PREFIX, MIGRATIONS_PREFIX,
    PODS_PREFIX, POD_CHECKPOINTS_PREFIX, POD_CHECKPOINT_CONTENTS_PREFIX,
};
use pkg_state::client::StateStore;
use pkg_state::keys;
use pkg_types::checkpoint::{ContainerCheckpoint, PodCheckpoint};
use pkg_types::content::{ContainerCheckpointContent, PodCheckpointContent};
use pkg_types::pod::Pod;

/// Cascade-on-delete: owners are recorded on every derived object, and
/// deleting an owner makes its whole subtree collectable. Deleting a
/// Migration therefore cleans up its PodCheckpoint, the per-container
/// checkpoints, both Content objects, and the restored pod.
///
/// The sweep is conservative about pods: only pods owned by a Migration
/// are ever touched, so workloads managed by anything else are invisible
/// to it. Archives in the shared store are never removed.
pub struct OwnerSweeper {
    store: StateStore,
    interval: Duration,
}

impl OwnerSweeper {
    pub fn new(store: StateStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run the sweep loop as a background task until `shutdown` fires.
    pub fn start(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "owner sweeper started (interval={}s)",
                self.interval.as_secs()
            );
            let mut tick = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("owner sweeper stopping");
                        break;
                    }
                    _ = tick.tick() => {
                        match self.sweep().await {
                            Ok(0) => {}
                            Ok(removed) => info!("owner sweep removed {} orphaned object(s)", removed),
                            Err(e) => warn!("owner sweep failed: {}", e),
                        }
                    }
                }
            }
        })
    }

    /// One converging sweep: passes repeat until nothing is collectable,
    /// so a deleted Migration's whole subtree goes in a single call even
    /// though each pass only unlinks one generation.
    pub async fn sweep(&self) -> anyhow::Result<usize> {
        let mut total = 0;
        loop {
            let removed = self.sweep_once().await?;
            total += removed;
            if removed == 0 {
                return Ok(total);
            }
        }
    }

    async fn owner_gone(&self, owner_key: &str) -> anyhow::Result<bool> {
        Ok(self.store.get(owner_key).await?.is_none())
    }

    async fn sweep_once(&self) -> anyhow::Result<usize> {
        let mut removed = 0;

        // PodCheckpoints owned by a deleted Migration.
        for (key, checkpoint) in self
            .store
            .list_json::<PodCheckpoint>(POD_CHECKPOINTS_PREFIX)
            .await?
        {
            if let Some(owner) = &checkpoint.owner_ref
                && self.owner_gone(owner).await?
            {
                info!("owner sweep: removing pod checkpoint {}", checkpoint.name);
                self.store.delete(&key).await?;
                removed += 1;
            }
        }

        // ContainerCheckpoints owned by a deleted PodCheckpoint.
        for (key, checkpoint) in self
            .store
            .list_json::<ContainerCheckpoint>(CONTAINER_CHECKPOINTS_PREFIX)
            .await?
        {
            if let Some(owner) = &checkpoint.owner_ref
                && self.owner_gone(owner).await?
            {
                info!(
                    "owner sweep: removing container checkpoint {}",
                    checkpoint.name
                );
                self.store.delete(&key).await?;
                removed += 1;
            }
        }

        // Content objects are owned by the same-named Checkpoint.
        for (key, content) in self
            .store
            .list_json::<ContainerCheckpointContent>(CONTAINER_CHECKPOINT_CONTENTS_PREFIX)
            .await?
        {
            let owner_key = keys::container_checkpoint_key(
                &content.spec.pod_namespace,
                &content.spec.container_checkpoint_ref,
            );
            if self.owner_gone(&owner_key).await? {
                info!("owner sweep: removing container content {}", content.name);
                self.store.delete(&key).await?;
                removed += 1;
            }
        }
        for (key, content) in self
            .store
            .list_json::<PodCheckpointContent>(POD_CHECKPOINT_CONTENTS_PREFIX)
            .await?
        {
            let owner_key = keys::pod_checkpoint_key(
                &content.spec.pod_namespace,
                &content.spec.pod_checkpoint_ref,
            );
            if self.owner_gone(&owner_key).await? {
                info!("owner sweep: removing pod content {}", content.name);
                self.store.delete(&key).await?;
                removed += 1;
            }
        }

        // Restored pods owned by a deleted Migration. Pods with any other
        // owner (or none) belong to someone else and are left alone.
        for (key, pod) in self.store.list_json::<Pod>(PODS_PREFIX).await? {
            if let Some(owner) = &pod.owner_ref
                && owner.starts_with(MIGRATIONS_PREFIX)
                && self.owner_gone(owner).await?
            {
                info!("owner sweep: removing restored pod {}", pod.name);
                self.store.delete(&key).await?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containercheckpoint::ContainerCheckpointReconciler;
    use crate::migration::MigrationReconciler;
    use crate::podcheckpoint::PodCheckpointReconciler;
    use crate::queue::Reconciler;
    use crate::testutil::{FakeAgent, make_node, make_pod, open_store};
    use chrono::Utc;
    use pkg_types::migration::{Migration, MigrationSpec};
    use pkg_types::pod::PodStatus;
    use std::collections::HashMap;

    async fn seed_full_graph(store: &StateStore) -> String {
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
        let migration = Migration {
            name: "m1".to_string(),
            namespace: "default".to_string(),
            labels: HashMap::new(),
            owner_ref: None,
            spec: MigrationSpec {
                pod_name: "p1".to_string(),
                target_node: String::new(),
            },
            status: Default::default(),
            created_at: Utc::now(),
        };
        let key = keys::migration_key("default", "m1");
        store.put_json(&key, &migration).await.unwrap();

        // Drive the whole graph into existence.
        let m = MigrationReconciler::new(store.clone(), "/mnt/checkpoints");
        let pc = PodCheckpointReconciler::new(store.clone());
        let cc = ContainerCheckpointReconciler::new(
            store.clone(),
            FakeAgent::succeeding("shared://p1-uid-c-20260801-120000.tar"),
        );
        for _ in 0..8 {
            let _ = m.reconcile(&key).await;
            let _ = pc
                .reconcile(&keys::pod_checkpoint_key("default", "m1"))
                .await;
            let _ = cc
                .reconcile(&keys::container_checkpoint_key("default", "m1-c"))
                .await;
        }
        key
    }

    #[tokio::test]
    async fn deleting_a_migration_collects_the_whole_subtree() {
        let (_dir, store) = open_store().await;
        let migration_key = seed_full_graph(&store).await;
        // Restored pod exists and is owned by the migration.
        assert!(
            store
                .get(&keys::pod_key("default", "p1-restored"))
                .await
                .unwrap()
                .is_some()
        );

        let sweeper = OwnerSweeper::new(store.clone(), Duration::from_secs(30));
        // Nothing is orphaned while the migration lives.
        assert_eq!(sweeper.sweep().await.unwrap(), 0);

        store.delete(&migration_key).await.unwrap();
        let removed = sweeper.sweep().await.unwrap();
        assert!(removed >= 4, "expected the subtree collected, got {}", removed);

        for key in [
            keys::pod_checkpoint_key("default", "m1"),
            keys::container_checkpoint_key("default", "m1-c"),
            keys::container_content_key("m1-c"),
            keys::pod_content_key("m1"),
            keys::pod_key("default", "p1-restored"),
        ] {
            assert!(store.get(&key).await.unwrap().is_none(), "{} survived", key);
        }
        // The source pod has no owner and is untouched.
        assert!(
            store
                .get(&keys::pod_key("default", "p1"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn unowned_objects_are_never_collected() {
        let (_dir, store) = open_store().await;
        store
            .put_json(
                &keys::pod_key("default", "standalone"),
                &make_pod("standalone", &["c"], PodStatus::Running),
            )
            .await
            .unwrap();
        // A pod owned by something that is not a Migration.
        let mut owned = make_pod("replica-1", &["c"], PodStatus::Running);
        owned.owner_ref = Some("/registry/replicasets/default/rs1".to_string());
        store
            .put_json(&keys::pod_key("default", "replica-1"), &owned)
            .await
            .unwrap();

        let sweeper = OwnerSweeper::new(store.clone(), Duration::from_secs(30));
        assert_eq!(sweeper.sweep().await.unwrap(), 0);
        assert!(
            store
                .get(&keys::pod_key("default", "replica-1"))
                .await
                .unwrap()
                .is_some()
        );
    }
}
