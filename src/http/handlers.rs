//! Route handlers.
//!
//! Handlers stay thin: parse, delegate to `ScoringService`, serialize.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::AppState;
use crate::domain::{RiskAssessment, FEATURE_COUNT};
use crate::ports::{FeatureScaler, RiskClassifier};
use crate::GlucoriskError;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Body of every failed `/predict` call.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Any pipeline failure, reported as a client error.
#[derive(Debug)]
pub struct ApiError(pub GlucoriskError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub feature_count: usize,
    pub artifacts_signed: bool,
    pub started_at: DateTime<Utc>,
}

/// GET /: the static assessment form.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// POST /predict: score one assessment.
///
/// The body is parsed here rather than through the `Json` extractor so that
/// malformed JSON gets the same `{"error": ...}` shape as every other failure.
pub async fn predict<S, C>(
    State(state): State<AppState<S, C>>,
    body: Bytes,
) -> Result<Json<RiskAssessment>, ApiError>
where
    S: FeatureScaler + 'static,
    C: RiskClassifier + 'static,
{
    let result = serde_json::from_slice::<Value>(&body)
        .map_err(GlucoriskError::from)
        .and_then(|value| state.scoring.assess_json(&value));

    match result {
        Ok(assessment) => Ok(Json(assessment)),
        Err(e) => {
            tracing::warn!("Prediction rejected: {e}");
            Err(ApiError(e))
        }
    }
}

/// GET /health: liveness plus artifact provenance.
pub async fn health<S, C>(State(state): State<AppState<S, C>>) -> Json<HealthResponse>
where
    S: FeatureScaler + 'static,
    C: RiskClassifier + 'static,
{
    Json(HealthResponse {
        status: "ok".to_string(),
        feature_count: FEATURE_COUNT,
        artifacts_signed: state.artifacts_signed,
        started_at: state.started_at,
    })
}
