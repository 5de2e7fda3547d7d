//! Camera pipeline binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vigil_media::{check_ffmpeg, FfmpegClipEncoder, FfmpegConnector};
use vigil_ml_client::MlClient;
use vigil_store::{AlertStore, MemoryAlertStore, RedisAlertStore, RedisStoreConfig};
use vigil_worker::{load_cameras, Collaborators, PipelineConfig, PipelineExecutor};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vigil-worker");

    if let Err(e) = run().await {
        error!("Pipeline error: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vigil=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    // reqwest and redis share the ring provider for TLS.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let config = PipelineConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    info!("Pipeline config: {:?}", config);

    let cameras = load_cameras(&config.cameras_path)
        .with_context(|| format!("loading cameras from {}", config.cameras_path.display()))?;
    info!(cameras = cameras.len(), "Cameras loaded");

    check_ffmpeg().context("ffmpeg is required")?;

    if let Some(addr) = config.metrics_addr {
        vigil_worker::metrics::install_prometheus(addr)?;
        info!(%addr, "Prometheus exporter listening");
    }

    let store: Arc<dyn AlertStore> = if std::env::var("REDIS_URL").is_ok() {
        let store_config = RedisStoreConfig::from_env().with_index_retention(config.dedupe_window);
        let store = RedisAlertStore::new(store_config).context("connecting alert store")?;
        store.ping().await.context("alert store unreachable")?;
        Arc::new(store)
    } else {
        warn!("REDIS_URL not set, alerts are kept in memory only");
        Arc::new(MemoryAlertStore::new())
    };

    let ml = Arc::new(MlClient::from_env().context("creating ML client")?);
    match ml.health_check().await {
        Ok(true) => info!(url = %ml.config().base_url, "ML service healthy"),
        _ => warn!(url = %ml.config().base_url, "ML service not healthy yet, continuing"),
    }

    let collaborators = Collaborators {
        connector: Arc::new(FfmpegConnector::new(config.session_config())),
        store,
        tracker: ml.clone(),
        scorer: ml,
        encoder: Arc::new(FfmpegClipEncoder::default()),
    };

    PipelineExecutor::new(config, cameras, collaborators)
        .run()
        .await?;
    Ok(())
}
