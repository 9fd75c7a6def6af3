use anyhow::{Result, bail};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use pkg_agentapi::AgentClient;
use pkg_constants::timing::CHECKPOINT_RPC_TIMEOUT_SECS;

/// One checkpoint request as the reconciler sees it.
#[derive(Debug, Clone)]
pub struct CheckpointCall {
    pub pod_namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub pod_uid: String,
}

/// Narrow capability surface of the per-node agent. The reconciler is
/// handed this at construction, so tests substitute a fake instead of a
/// gRPC server.
#[async_trait]
pub trait CheckpointAgent: Send + Sync {
    /// Checkpoint one container on the node whose agent listens at
    /// `endpoint`. Returns the artifact URI of the published archive.
    async fn checkpoint(&self, endpoint: &str, call: &CheckpointCall) -> Result<String>;

    /// Repackage a published archive as an auto-restoring image.
    async fn package_as_image(
        &self,
        endpoint: &str,
        checkpoint_uri: &str,
        container_name: &str,
        image_name: &str,
    ) -> Result<String>;

    /// Whether the node's agent is healthy.
    async fn health(&self, endpoint: &str) -> Result<bool>;
}

/// Production dialer: connects to the node's agent over gRPC per call.
/// The whole call (dial included) runs under the RPC deadline that wraps
/// the agent's internal retry loop.
pub struct GrpcAgentDialer {
    call_timeout: Duration,
}

impl GrpcAgentDialer {
    pub fn new() -> Self {
        Self {
            call_timeout: Duration::from_secs(CHECKPOINT_RPC_TIMEOUT_SECS),
        }
    }
}

impl Default for GrpcAgentDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointAgent for GrpcAgentDialer {
    async fn checkpoint(&self, endpoint: &str, call: &CheckpointCall) -> Result<String> {
        let fut = async {
            let mut client = AgentClient::connect(endpoint).await?;
            let resp = client
                .checkpoint(
                    &call.pod_namespace,
                    &call.pod_name,
                    &call.container_name,
                    &call.pod_uid,
                )
                .await?;
            if !resp.success {
                bail!("{}", resp.message);
            }
            info!(
                endpoint,
                container = %call.container_name,
                uri = %resp.artifact_uri,
                "agent checkpoint complete"
            );
            Ok(resp.artifact_uri)
        };
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => bail!(
                "checkpoint RPC to {} timed out after {}s",
                endpoint,
                self.call_timeout.as_secs()
            ),
        }
    }

    async fn package_as_image(
        &self,
        endpoint: &str,
        checkpoint_uri: &str,
        container_name: &str,
        image_name: &str,
    ) -> Result<String> {
        let mut client = AgentClient::connect(endpoint).await?;
        let resp = client
            .package_as_image(checkpoint_uri, container_name, image_name)
            .await?;
        if !resp.success {
            bail!("{}", resp.message);
        }
        Ok(resp.image_reference)
    }

    async fn health(&self, endpoint: &str) -> Result<bool> {
        let mut client = AgentClient::connect(endpoint).await?;
        Ok(client.health().await?.healthy)
    }
}
