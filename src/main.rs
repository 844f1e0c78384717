//! Glucorisk: diabetes risk scoring service.
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glucorisk::adapters::sanitize::SanitizingMakeWriter;
use glucorisk::adapters::ArtifactBundle;
use glucorisk::application::ScoringService;
use glucorisk::config::{LogTarget, ServiceConfig};
use glucorisk::http::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    let (writer, _guard) = match &config.log_target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                // Best-effort: a missing directory surfaces as the open error below.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {path:?}"))?;
            tracing_appender::non_blocking(file)
        }
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Glucorisk...");

    let bundle = match ArtifactBundle::load(&config.model_dir, &config.trust) {
        Ok(bundle) => bundle,
        Err(e) => {
            tracing::error!("Failed to load artifacts from {:?}: {e}", config.model_dir);
            return Err(e.into());
        }
    };
    let signed = bundle.is_signed();
    let scoring = ScoringService::new(Arc::new(bundle.scaler), Arc::new(bundle.ensemble))?;

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    http::serve(listener, http::router(AppState::new(scoring, signed))).await?;

    tracing::info!("Glucorisk shutdown complete.");
    Ok(())
}
