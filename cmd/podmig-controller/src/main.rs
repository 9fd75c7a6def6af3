use clap::Parser;
use pkg_controllers::agent::GrpcAgentDialer;
use pkg_controllers::cascade::OwnerSweeper;
use pkg_controllers::containercheckpoint::ContainerCheckpointReconciler;
use pkg_controllers::migration::MigrationReconciler;
use pkg_controllers::podcheckpoint::PodCheckpointReconciler;
use pkg_controllers::queue::Manager;
use pkg_state::client::StateStore;
use pkg_types::config::{ControllerConfigFile, load_config_file};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "podmig-controller", about = "podmig migration control plane")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = pkg_constants::paths::DEFAULT_CONTROLLER_CONFIG)]
    config: String,

    /// Directory for state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Mount point of the shared checkpoint store
    #[arg(long)]
    shared_mount: Option<String>,

    /// Seconds between full resyncs of every kind
    #[arg(long)]
    resync_secs: Option<u64>,

    /// Log format: 'text' or 'json'
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    // Load config file (returns defaults if file not found)
    let file_cfg: ControllerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| pkg_constants::paths::DEFAULT_DATA_DIR.to_string());
    let shared_mount = cli
        .shared_mount
        .or(file_cfg.shared_mount)
        .unwrap_or_else(|| pkg_constants::paths::DEFAULT_SHARED_MOUNT.to_string());
    let resync_secs = cli
        .resync_secs
        .or(file_cfg.resync_secs)
        .unwrap_or(pkg_constants::timing::RESYNC_INTERVAL_SECS);

    info!("Starting podmig-controller");
    info!("  Data dir:     {}", data_dir);
    info!("  Shared mount: {}", shared_mount);
    info!("  Resync:       {}s", resync_secs);

    let store = StateStore::new(&data_dir).await?;

    let mut manager = Manager::new(store.clone(), Duration::from_secs(resync_secs));
    manager.register(Arc::new(MigrationReconciler::new(
        store.clone(),
        shared_mount.clone(),
    )));
    manager.register(Arc::new(PodCheckpointReconciler::new(store.clone())));
    manager.register(Arc::new(ContainerCheckpointReconciler::new(
        store.clone(),
        Arc::new(GrpcAgentDialer::new()),
    )));

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        signal_shutdown.cancel();
    });

    let sweeper = OwnerSweeper::new(store.clone(), Duration::from_secs(resync_secs));
    let sweeper_task = sweeper.start(shutdown.clone());

    manager.run(shutdown).await;
    sweeper_task.await.ok();

    store.close().await?;
    info!("podmig-controller stopped");
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
