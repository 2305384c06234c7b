//! Analysis endpoints.

use std::collections::BTreeMap;

use analysis_core::{AnalysisError, OverridableField, DEFAULT_TERMINAL_GROWTH, DEFAULT_WACC};
use analysis_orchestrator::AnalysisRequest;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    #[serde(default)]
    pub ticker: String,
    pub wacc: Option<f64>,
    pub terminal_growth: Option<f64>,
    pub sector: Option<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

impl AnalyzeBody {
    /// Check the body and turn it into an engine request. Nothing runs on failure.
    pub fn into_request(self) -> Result<AnalysisRequest, AnalysisError> {
        let mut request = AnalysisRequest::new(&self.ticker);
        if request.ticker.is_empty() {
            return Err(AnalysisError::Validation("ticker is required".to_string()));
        }

        let wacc = self.wacc.unwrap_or(DEFAULT_WACC);
        if !(wacc > 0.0 && wacc < 1.0) {
            return Err(AnalysisError::Validation(format!(
                "wacc must be between 0 and 1 (exclusive), got {}",
                wacc
            )));
        }
        let terminal_growth = self.terminal_growth.unwrap_or(DEFAULT_TERMINAL_GROWTH);
        if !(terminal_growth > -1.0 && terminal_growth < 1.0) {
            return Err(AnalysisError::Validation(format!(
                "terminalGrowth must be between -1 and 1 (exclusive), got {}",
                terminal_growth
            )));
        }

        for (key, value) in self.overrides {
            let field = OverridableField::from_key(&key).ok_or_else(|| {
                AnalysisError::Validation(format!(
                    "Override '{}' is not allowed (allowed: {})",
                    key,
                    OverridableField::ALL.map(OverridableField::key).join(", ")
                ))
            })?;
            request.overrides.insert(field, value);
        }

        request.wacc = wacc;
        request.terminal_growth = terminal_growth;
        request.sector = self.sector.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(request)
    }
}

/// A failed analysis: the requested ticker plus a message.
#[derive(Debug)]
pub struct ApiError {
    pub ticker: String,
    pub error: AnalysisError,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    ticker: &'a str,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error {
            AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
            AnalysisError::InsufficientData(_) | AnalysisError::SymbolNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Analysis of {} failed: {}", self.ticker, self.error);
        }
        let body = ErrorBody {
            ticker: &self.ticker,
            error: self.error.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError {
        ticker: String::new(),
        error: AnalysisError::Validation(rejection.body_text()),
    })?;

    let ticker = body.ticker.trim().to_uppercase();
    let request = body.into_request().map_err(|error| ApiError {
        ticker: ticker.clone(),
        error,
    })?;

    let report = state
        .orchestrator
        .analyze(&request)
        .await
        .map_err(|error| ApiError { ticker, error })?;

    Ok(Json(report.as_ref()).into_response())
}
