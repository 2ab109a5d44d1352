//! Platewatch - license plate recognition service for Frigate NVR events
//!
//! Main entry point.

use platewatch::{
    config::{load_app_config, AppConfig},
    event_tracker::EventTracker,
    frigate::FrigateClient,
    messaging::{create_mqtt_client, MqttPublisher, MqttSubscriber},
    metrics::PipelineStats,
    pipeline::EventPipeline,
    recognition::{
        CodeProjectBackend, PlateRecognizerBackend, RecognitionBackend, RecognitionClient,
    },
    snapshots::{SnapshotSaver, SnapshotSaverConfig},
    state::AppState,
    storage::PlateStore,
    web_api,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Load configuration before tracing so logger_level can seed the filter
    let config = load_app_config(None)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("platewatch={}", config.logger_level.to_lowercase()).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Platewatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        frigate_url = %config.frigate.frigate_url,
        mqtt_server = %config.frigate.mqtt_server,
        max_workers = config.max_workers,
        "Configuration loaded"
    );

    prepare_directories(&config).await?;

    let store = PlateStore::open(&config.paths.db_path).await?;
    let stats = Arc::new(PipelineStats::new());
    let tracker = Arc::new(EventTracker::new());
    let frigate = Arc::new(FrigateClient::new(config.frigate.frigate_url.clone()));

    let backend: Arc<dyn RecognitionBackend> = if let Some(ref pr) = config.plate_recognizer {
        tracing::info!("Using Plate Recognizer API");
        Arc::new(PlateRecognizerBackend::new(pr, stats.clone()))
    } else if let Some(ref cp) = config.code_project {
        tracing::info!("Using CodeProject.AI API");
        Arc::new(CodeProjectBackend::new(cp, stats.clone()))
    } else {
        // load_app_config validated backend selection already
        anyhow::bail!("No recognition backend configured");
    };

    let recognizer = RecognitionClient::new(
        backend,
        config.frigate.watched_plates.clone(),
        config.frigate.fuzzy_match,
        config.frigate.min_score,
    );

    let (mqtt_client, event_loop) = create_mqtt_client(&config.frigate);
    let publisher = Arc::new(MqttPublisher::new(
        mqtt_client.clone(),
        &config.frigate,
        stats.clone(),
    ));

    let snapshots = Arc::new(SnapshotSaver::new(
        frigate.clone(),
        SnapshotSaverConfig {
            snapshot_dir: config.paths.snapshot_dir.clone(),
            save_snapshots: config.frigate.save_snapshots,
            frigate_plus: config.frigate.frigate_plus,
            draw_box: config.frigate.draw_box,
        },
        stats.clone(),
    ));

    let pipeline = Arc::new(EventPipeline::new(
        config.frigate.clone(),
        tracker.clone(),
        store.clone(),
        recognizer,
        frigate,
        publisher,
        snapshots,
        stats.clone(),
    ));

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    // Health/stats endpoint
    let state = AppState {
        store,
        stats: stats.clone(),
        tracker: tracker.clone(),
    };
    let router = web_api::create_router(state);
    let addr = format!("0.0.0.0:{}", config.metrics_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Health endpoint listening");

    let web_shutdown = shutdown.clone();
    let web_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { web_shutdown.cancelled().await })
            .await
        {
            tracing::error!(error = %e, "Web server error");
        }
    });

    tracing::info!(server = %config.frigate.mqtt_server, "Starting MQTT client");
    let subscriber = MqttSubscriber::new(
        mqtt_client,
        &config.frigate,
        pipeline,
        stats,
        config.max_workers,
    );
    subscriber.run(event_loop, shutdown.clone()).await;

    shutdown.cancel();
    let _ = web_server.await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Create the snapshot directory and the database parent directory.
async fn prepare_directories(config: &AppConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.paths.snapshot_dir).await?;
    if let Some(parent) = config.paths.db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Cancel the token on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => tracing::info!("Received SIGINT, initiating graceful shutdown"),
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            tracing::info!("Received Ctrl-C, initiating graceful shutdown");
        }

        shutdown.cancel();
    });
}
