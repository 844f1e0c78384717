//! HTTP surface.
//!
//! ```text
//! GET  /         assessment form
//! POST /predict  JSON body -> RiskAssessment, or 400 {"error": ...}
//! GET  /health   liveness and artifact provenance
//! ```

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;

use crate::application::ScoringService;
use crate::ports::{FeatureScaler, RiskClassifier};

/// Shared state handed to every handler.
pub struct AppState<S, C>
where
    S: FeatureScaler,
    C: RiskClassifier,
{
    pub scoring: Arc<ScoringService<S, C>>,
    pub artifacts_signed: bool,
    pub started_at: DateTime<Utc>,
}

impl<S, C> AppState<S, C>
where
    S: FeatureScaler,
    C: RiskClassifier,
{
    #[must_use]
    pub fn new(scoring: ScoringService<S, C>, artifacts_signed: bool) -> Self {
        Self {
            scoring: Arc::new(scoring),
            artifacts_signed,
            started_at: Utc::now(),
        }
    }
}

impl<S, C> Clone for AppState<S, C>
where
    S: FeatureScaler,
    C: RiskClassifier,
{
    fn clone(&self) -> Self {
        Self {
            scoring: Arc::clone(&self.scoring),
            artifacts_signed: self.artifacts_signed,
            started_at: self.started_at,
        }
    }
}

/// Build the application router.
pub fn router<S, C>(state: AppState<S, C>) -> Router
where
    S: FeatureScaler + 'static,
    C: RiskClassifier + 'static,
{
    Router::new()
        .route("/", get(handlers::index))
        .route("/predict", post(handlers::predict::<S, C>))
        .route("/health", get(handlers::health::<S, C>))
        .with_state(state)
}

/// Serve `app` until Ctrl-C or SIGTERM, letting in-flight requests finish.
///
/// # Errors
/// Returns error if the server loop fails.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
