use std::path::{Path, PathBuf};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::endpoint::CheckpointEndpointClient;
use crate::oci::ImagePackager;
use pkg_agentapi::proto::agent::{
    CheckpointRequest, CheckpointResponse, HealthRequest, HealthResponse, PackageAsImageRequest,
    PackageAsImageResponse, checkpoint_agent_server::CheckpointAgent,
};
use pkg_artifacts::{ArtifactUri, Publisher};

/// gRPC surface of the node agent. Every failure is reported in-band
/// (`success=false` plus a message), never as a transport error, so the
/// caller's retry policy stays decoupled from the host endpoint's.
pub struct AgentService {
    node_name: String,
    endpoint: Option<CheckpointEndpointClient>,
    publisher: Publisher,
    packager: ImagePackager,
    shared_mount: PathBuf,
}

impl AgentService {
    pub fn new(
        node_name: String,
        endpoint: Option<CheckpointEndpointClient>,
        shared_mount: &str,
        image_storage_root: &str,
    ) -> Self {
        Self {
            node_name,
            endpoint,
            publisher: Publisher::new(shared_mount),
            packager: ImagePackager::new(image_storage_root),
            shared_mount: PathBuf::from(shared_mount),
        }
    }

    /// Probe that the shared store is mounted and writable from this node.
    fn shared_mount_writable(&self) -> Result<(), String> {
        let probe = self
            .shared_mount
            .join(format!(".healthz-{}", std::process::id()));
        std::fs::write(&probe, b"ok").map_err(|e| {
            format!("shared mount {} not writable: {}", self.shared_mount.display(), e)
        })?;
        let _ = std::fs::remove_file(&probe);
        Ok(())
    }
}

#[tonic::async_trait]
impl CheckpointAgent for AgentService {
    async fn checkpoint(
        &self,
        request: Request<CheckpointRequest>,
    ) -> Result<Response<CheckpointResponse>, Status> {
        let req = request.into_inner();
        info!(
            pod = %req.pod_name,
            container = %req.container_name,
            namespace = %req.pod_namespace,
            "checkpoint request"
        );

        let Some(endpoint) = &self.endpoint else {
            return Ok(Response::new(CheckpointResponse {
                success: false,
                artifact_uri: String::new(),
                message: "no client credential for the host checkpoint endpoint".to_string(),
            }));
        };

        match endpoint
            .checkpoint(&req.pod_namespace, &req.pod_name, &req.container_name)
            .await
        {
            Ok(archive_path) => {
                let uri = self.publisher.publish_or_fallback(
                    Path::new(&archive_path),
                    &req.pod_uid,
                    &req.container_name,
                );
                Ok(Response::new(CheckpointResponse {
                    success: true,
                    artifact_uri: uri.to_string(),
                    message: format!(
                        "checkpointed {}/{} container {} on {}",
                        req.pod_namespace, req.pod_name, req.container_name, self.node_name
                    ),
                }))
            }
            Err(e) => {
                warn!(
                    pod = %req.pod_name,
                    container = %req.container_name,
                    error = %e,
                    "checkpoint failed"
                );
                Ok(Response::new(CheckpointResponse {
                    success: false,
                    artifact_uri: String::new(),
                    message: e.to_string(),
                }))
            }
        }
    }

    async fn package_as_image(
        &self,
        request: Request<PackageAsImageRequest>,
    ) -> Result<Response<PackageAsImageResponse>, Status> {
        let req = request.into_inner();
        info!(
            uri = %req.checkpoint_uri,
            image = %req.image_name,
            "package-as-image request"
        );

        let fail = |message: String| {
            Ok(Response::new(PackageAsImageResponse {
                success: false,
                image_reference: String::new(),
                message,
            }))
        };

        let archive = match ArtifactUri::parse(&req.checkpoint_uri) {
            Ok(uri) => uri.resolve(&self.shared_mount),
            Err(e) => return fail(e.to_string()),
        };
        // Packaging is filesystem-bound; keep the runtime's worker threads
        // free while the tar is written.
        let packager_result = {
            let archive = archive.clone();
            let container_name = req.container_name.clone();
            let image_name = req.image_name.clone();
            let packager = self.packager.clone();
            tokio::task::spawn_blocking(move || {
                packager.package(&archive, &container_name, &image_name)
            })
            .await
        };
        match packager_result {
            Ok(Ok(image_reference)) => Ok(Response::new(PackageAsImageResponse {
                success: true,
                image_reference,
                message: format!("packaged {} as {}", archive.display(), req.image_name),
            })),
            Ok(Err(e)) => fail(e.to_string()),
            Err(e) => fail(format!("packaging task panicked: {}", e)),
        }
    }

    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        match self.shared_mount_writable() {
            Ok(()) => Ok(Response::new(HealthResponse {
                healthy: true,
                message: format!("agent on {} healthy", self.node_name),
            })),
            Err(message) => Ok(Response::new(HealthResponse {
                healthy: false,
                message,
            })),
        }
    }
}
