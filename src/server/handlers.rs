//! HTTP request handlers.

use crate::agent::AgentKind;
use crate::config::Config;
use crate::models::{Language, Metadata, Report};
use crate::orchestrator::{ChannelNotifier, Scheduler};
use crate::validation::{validate_request, ValidationError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared state of the API server.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub config: Arc<Config>,
}

/// Body of an analysis request.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub context: Metadata,
}

fn default_language() -> String {
    Language::Python.as_str().to_string()
}

/// Rejected request, rendered as `400 {status: "error", message}`.
///
/// An unsupported language also lists `supported_languages`.
#[derive(Debug)]
pub struct ApiError(ValidationError);

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!("Rejected request: {}", self.0);
        let mut body = json!({ "status": "error", "message": self.0.to_string() });
        if let ValidationError::UnsupportedLanguage { supported, .. } = &self.0 {
            body["supported_languages"] = json!(supported);
        }
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Service banner.
pub async fn index() -> Json<Value> {
    Json(json!({
        "service": "CodeSwarm Multi-Agent Analysis API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "GET /health",
            "analyze": "POST /api/analyze",
            "analyze_stream": "POST /api/analyze/stream",
            "languages": "GET /api/languages",
            "agents": "GET /api/agents",
        }
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "codeswarm",
        "timestamp": Utc::now(),
    }))
}

/// Run a full analysis and return the report.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Report>, ApiError> {
    let language = validate_request(&request.code, &request.language, &state.config.limits)?;
    info!(
        "Analysis request: {} bytes of {}",
        request.code.len(),
        language
    );

    let report = state
        .scheduler
        .analyze(&request.code, language, request.context)
        .await;
    Ok(Json(report))
}

/// Run an analysis, streaming progress as server-sent events.
///
/// Emits one `status_update` per progress event, then `analysis_complete`
/// with the report, or `analysis_error` if the run itself died. A client
/// that disconnects early does not stop the run.
pub async fn analyze_stream(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let language = validate_request(&request.code, &request.language, &state.config.limits)?;
    info!("Streaming analysis request for {}", language);

    let (notifier, rx) = ChannelNotifier::channel();
    let scheduler = Arc::clone(&state.scheduler);
    let run = tokio::spawn(async move {
        scheduler
            .analyze_with_progress(&request.code, language, request.context, Some(&notifier))
            .await
    });

    // The channel closes once the run drops its notifier
    let updates = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((
            Event::default().event("status_update").json_data(&event),
            rx,
        ))
    });

    let outcome = stream::once(async move {
        match run.await {
            Ok(report) => Event::default().event("analysis_complete").json_data(&report),
            Err(e) => {
                error!("Streaming analysis failed: {}", e);
                Event::default()
                    .event("analysis_error")
                    .json_data(json!({ "status": "error", "message": e.to_string() }))
            }
        }
    });

    Ok(Sse::new(updates.chain(outcome)))
}

pub async fn list_languages(State(state): State<AppState>) -> Json<Value> {
    let languages: Vec<&str> = state
        .config
        .limits
        .supported_languages
        .iter()
        .map(Language::as_str)
        .collect();
    Json(json!({ "languages": languages }))
}

/// Built-in agents and whether each is scheduled.
pub async fn list_agents(State(state): State<AppState>) -> Json<Value> {
    let agents: Vec<Value> = AgentKind::ALL
        .iter()
        .map(|kind| {
            json!({
                "name": kind.display_name(),
                "id": kind.id(),
                "description": kind.description(),
                "enabled": state.config.orchestrator.is_enabled(kind.id()),
            })
        })
        .collect();

    Json(json!({
        "total": agents.len(),
        "enabled": state.scheduler.agent_count(),
        "agents": agents,
    }))
}
