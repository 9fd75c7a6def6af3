use anyhow::Result;
use tonic::transport::Channel;

use crate::proto::agent::{
    CheckpointRequest, CheckpointResponse, HealthRequest, HealthResponse, PackageAsImageRequest,
    PackageAsImageResponse, checkpoint_agent_client::CheckpointAgentClient,
};
use pkg_constants::network::MAX_GRPC_MESSAGE_BYTES;

/// Connected client to one node's checkpoint agent.
#[derive(Clone)]
pub struct AgentClient {
    client: CheckpointAgentClient<Channel>,
}

impl AgentClient {
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let client = CheckpointAgentClient::connect(addr.into())
            .await?
            .max_decoding_message_size(MAX_GRPC_MESSAGE_BYTES)
            .max_encoding_message_size(MAX_GRPC_MESSAGE_BYTES);
        Ok(Self { client })
    }

    pub async fn checkpoint(
        &mut self,
        pod_namespace: &str,
        pod_name: &str,
        container_name: &str,
        pod_uid: &str,
    ) -> Result<CheckpointResponse> {
        let request = CheckpointRequest {
            pod_namespace: pod_namespace.to_string(),
            pod_name: pod_name.to_string(),
            container_name: container_name.to_string(),
            pod_uid: pod_uid.to_string(),
        };
        Ok(self.client.checkpoint(request).await?.into_inner())
    }

    pub async fn package_as_image(
        &mut self,
        checkpoint_uri: &str,
        container_name: &str,
        image_name: &str,
    ) -> Result<PackageAsImageResponse> {
        let request = PackageAsImageRequest {
            checkpoint_uri: checkpoint_uri.to_string(),
            container_name: container_name.to_string(),
            image_name: image_name.to_string(),
        };
        Ok(self.client.package_as_image(request).await?.into_inner())
    }

    pub async fn health(&mut self) -> Result<HealthResponse> {
        Ok(self.client.health(HealthRequest {}).await?.into_inner())
    }
}
