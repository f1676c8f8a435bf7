//! NexusTalk streamer
//!
//! Connects to one camera's streaming host and writes the H.264 Annex-B and
//! AAC elementary streams to the configured outputs (files or FIFOs read by
//! a transcoder) until Ctrl+C or SIGTERM.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize logging
//! 3. Install the Prometheus exporter (when configured)
//! 4. Open the outputs and the talkback input
//! 5. Spawn the session actor and request playback
//! 6. Wait for shutdown signal, then stop playback

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::token::TokenReceiver;
use nexus_streamer::config::Config;
use nexus_streamer::observability::metrics::init_metrics_exporter;
use nexus_streamer::sink::{MediaSink, MediaSinks, SinkKind, DEFAULT_SINK_CAPACITY};
use nexus_streamer::{StreamSession, TlsConnector};
use tokio::fs::{File, OpenOptions};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Time allowed for sink writers to drain after the session stops.
const SINK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.observability.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(nexus_streamer::config::DEFAULT_LOG_FILTER));
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting NexusTalk streamer");
    info!(
        host = %config.host,
        camera_uuid = %config.camera_uuid,
        token_kind = ?config.token_kind,
        environment = ?config.environment,
        stream_quality = %config.stream_quality,
        audio_enabled = config.audio_enabled,
        "Configuration loaded successfully"
    );

    // Install Prometheus exporter
    if let Some(bind_address) = &config.metrics_bind_address {
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            error!(error = %e, addr = %bind_address, "Invalid metrics bind address");
            format!("Invalid metrics bind address: {e}")
        })?;
        init_metrics_exporter(addr).map_err(|e| {
            error!(error = %e, "Failed to install Prometheus exporter");
            e
        })?;
        info!(addr = %addr, "Prometheus exporter listening");
    }

    // Open outputs
    let video_path = config.video_output.clone().ok_or_else(|| {
        error!("NEXUS_VIDEO_OUTPUT is required");
        "Missing required environment variable: NEXUS_VIDEO_OUTPUT"
    })?;

    let video_file = open_output(&video_path).await?;
    let (video_sink, video_task) =
        MediaSink::spawn(SinkKind::Video, video_file, DEFAULT_SINK_CAPACITY);
    let mut sinks = MediaSinks::new(video_sink);
    let mut writer_tasks = vec![video_task];

    if let Some(audio_path) = &config.audio_output {
        let audio_file = open_output(audio_path).await?;
        let (audio_sink, audio_task) =
            MediaSink::spawn(SinkKind::Audio, audio_file, DEFAULT_SINK_CAPACITY);
        sinks = sinks.with_audio(audio_sink);
        writer_tasks.push(audio_task);
    }

    if let Some(talkback_path) = &config.talkback_input {
        let talkback = File::open(talkback_path).await.map_err(|e| {
            error!(error = %e, path = %talkback_path.display(), "Failed to open talkback input");
            e
        })?;
        sinks = sinks.with_talkback(talkback);
    }

    // Spawn session
    let connector = TlsConnector::new()?;
    let token = TokenReceiver::fixed(config.access_token.clone());
    let shutdown_token = CancellationToken::new();

    let (session, session_task) = StreamSession::spawn(
        config.session_config(),
        Arc::new(connector),
        token,
        sinks,
        shutdown_token.child_token(),
    );
    info!(session_id = session.session_id(), "Session started");

    session.start_playback().await?;

    // Wait for shutdown signal
    info!("Streaming - press Ctrl+C to shutdown");
    shutdown_signal().await;
    info!("Shutdown signal received, stopping playback...");

    if let Err(e) = session.stop_playback().await {
        warn!(error = %e, "Session already stopped");
    }
    shutdown_token.cancel();
    if let Err(e) = session_task.await {
        warn!(error = %e, "Session task failed");
    }

    // Let sink writers flush what is queued
    for task in writer_tasks {
        if tokio::time::timeout(SINK_DRAIN_TIMEOUT, task).await.is_err() {
            warn!("Sink writer did not finish in time");
        }
    }

    info!("NexusTalk streamer shutdown complete");
    Ok(())
}

async fn open_output(path: &Path) -> Result<File, std::io::Error> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| {
            error!(error = %e, path = %path.display(), "Failed to open output");
            e
        })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
