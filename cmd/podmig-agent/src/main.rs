mod endpoint;
mod oci;
mod service;
mod tls;

use clap::Parser;
use pkg_agentapi::proto::agent::checkpoint_agent_server::CheckpointAgentServer;
use pkg_constants::network::MAX_GRPC_MESSAGE_BYTES;
use pkg_types::config::{AgentConfigFile, load_config_file};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "podmig-agent", about = "podmig per-node checkpoint agent")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = pkg_constants::paths::DEFAULT_AGENT_CONFIG)]
    config: String,

    /// Node name this agent serves
    #[arg(long)]
    node_name: Option<String>,

    /// gRPC listen port
    #[arg(long)]
    grpc_port: Option<u16>,

    /// Mount point of the shared checkpoint store
    #[arg(long)]
    shared_mount: Option<String>,

    /// Port of the host runtime's HTTPS checkpoint endpoint
    #[arg(long)]
    checkpoint_port: Option<u16>,

    /// Root directory for images committed by PackageAsImage
    #[arg(long)]
    image_storage_root: Option<String>,

    /// Log format: 'text' or 'json'
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    // Load config file (returns defaults if file not found)
    let file_cfg: AgentConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let node_name = cli
        .node_name
        .or(file_cfg.node_name)
        .unwrap_or_else(|| hostname());
    let grpc_port = cli
        .grpc_port
        .or(file_cfg.grpc_port)
        .unwrap_or(pkg_constants::network::DEFAULT_AGENT_GRPC_PORT);
    let shared_mount = cli
        .shared_mount
        .or(file_cfg.shared_mount)
        .unwrap_or_else(|| pkg_constants::paths::DEFAULT_SHARED_MOUNT.to_string());
    let checkpoint_port = cli
        .checkpoint_port
        .or(file_cfg.checkpoint_port)
        .unwrap_or(pkg_constants::network::DEFAULT_CHECKPOINT_ENDPOINT_PORT);
    let image_storage_root = cli
        .image_storage_root
        .or(file_cfg.image_storage_root)
        .unwrap_or_else(|| pkg_constants::paths::DEFAULT_IMAGE_STORAGE_ROOT.to_string());

    info!("Starting podmig-agent for node: {}", node_name);
    info!("  gRPC port:       {}", grpc_port);
    info!("  Shared mount:    {}", shared_mount);
    info!("  Checkpoint port: {}", checkpoint_port);
    info!("  Image storage:   {}", image_storage_root);

    // The host endpoint client needs a client credential from one of the
    // canonical paths. Keep serving without one: Health still answers, and
    // Checkpoint reports the problem in-band.
    let endpoint_client = match endpoint::CheckpointEndpointClient::new("localhost", checkpoint_port)
    {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("checkpoint endpoint client unavailable: {}", e);
            None
        }
    };

    let service = service::AgentService::new(
        node_name.clone(),
        endpoint_client,
        &shared_mount,
        &image_storage_root,
    );

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<CheckpointAgentServer<service::AgentService>>()
        .await;
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(pkg_agentapi::FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let addr: SocketAddr = format!("0.0.0.0:{}", grpc_port).parse()?;
    info!("Agent gRPC listening on {}", addr);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_cancel.cancel();
    });

    Server::builder()
        .add_service(
            CheckpointAgentServer::new(service)
                .max_decoding_message_size(MAX_GRPC_MESSAGE_BYTES)
                .max_encoding_message_size(MAX_GRPC_MESSAGE_BYTES),
        )
        .add_service(health_service)
        .add_service(reflection_service)
        .serve_with_shutdown(addr, async move {
            cancel.cancelled().await;
        })
        .await?;

    info!("podmig-agent stopped");
    Ok(())
}

/// Standard tracing initialization (text or json).
fn init_tracing(log_format: &str) {
    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::level_filters::LevelFilter::INFO.into()),
                )
                .init();
        }
        _ => {
            tracing_subscriber::fmt::init();
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Get the system hostname, fallback to "node".
fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "node".to_string())
}
