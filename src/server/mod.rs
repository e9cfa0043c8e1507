//! HTTP API server.
//!
//! Exposes the scheduler over JSON endpoints and a server-sent events
//! stream for live progress.

pub mod handlers;

use crate::config::Config;
use crate::orchestrator::Scheduler;
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use handlers::AppState;
use std::sync::Arc;
use tracing::info;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/analyze/stream", post(handlers::analyze_stream))
        .route("/api/languages", get(handlers::list_languages))
        .route("/api/agents", get(handlers::list_agents))
        .with_state(state)
}

/// Start the API server and serve until the process exits.
pub async fn serve(config: Config, scheduler: Scheduler) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        scheduler: Arc::new(scheduler),
        config: Arc::new(config),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("CodeSwarm API listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("API server stopped unexpectedly")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use crate::models::Language;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(config: Config) -> Router {
        let scheduler = Scheduler::from_config(&config).unwrap();
        router(AppState {
            scheduler: Arc::new(scheduler),
            config: Arc::new(config),
        })
    }

    fn app() -> Router {
        app_with(Config::default())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], json!("healthy"));
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let (status, body) = send(app(), get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/api/analyze/stream"));
    }

    #[tokio::test]
    async fn test_languages() {
        let (_, body) = send(app(), get_request("/api/languages")).await;
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["languages"].as_array().unwrap().len(), 10);
        assert_eq!(value["languages"][0], json!("python"));
    }

    #[tokio::test]
    async fn test_agents_reflect_configuration() {
        let mut config = Config::default();
        config
            .orchestrator
            .enabled_agents
            .retain(|id| id != "memory_profiler");

        let (_, body) = send(app_with(config), get_request("/api/agents")).await;
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["total"], json!(7));
        assert_eq!(value["enabled"], json!(6));
        let memory = value["agents"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["id"] == json!("memory_profiler"))
            .unwrap();
        assert_eq!(memory["enabled"], json!(false));
    }

    #[tokio::test]
    async fn test_analyze_division_by_zero() {
        let request = post_json("/api/analyze", json!({"code": "print(1/0)", "language": "python"}));
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);

        let report: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(report["status"], json!("success"));
        assert!(report["summary"]["critical_issues"].as_u64().unwrap() >= 1);
        assert_eq!(report["agent_results"].as_object().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_analyze_defaults_to_python() {
        let request = post_json("/api/analyze", json!({"code": "x = 1\n"}));
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        let report: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            report["agent_results"]["algorithm_visualizer"]["status"],
            json!("success")
        );
    }

    #[tokio::test]
    async fn test_analyze_rejects_invalid_requests() {
        let (status, body) = send(app(), post_json("/api/analyze", json!({"code": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], json!("error"));
        assert_eq!(value["message"], json!("No code provided"));
        assert!(value.get("supported_languages").is_none());

        let request = post_json("/api/analyze", json!({"code": "x", "language": "cobol"}));
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["status"], json!("error"));
        assert!(value["message"]
            .as_str()
            .unwrap()
            .starts_with("Unsupported language: cobol"));
        let supported = value["supported_languages"].as_array().unwrap();
        assert_eq!(supported.len(), 10);
        assert_eq!(supported[0], json!("python"));
    }

    #[tokio::test]
    async fn test_unsupported_language_lists_configured_languages() {
        let mut config = Config::default();
        config.limits.supported_languages = vec![Language::Python, Language::Rust];
        let request = post_json("/api/analyze", json!({"code": "x", "language": "go"}));
        let (status, body) = send(app_with(config), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["supported_languages"], json!(["python", "rust"]));
    }

    #[tokio::test]
    async fn test_analyze_accepts_whitespace_only_code() {
        let request = post_json("/api/analyze", json!({"code": "   \n", "language": "python"}));
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        let report: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(report["agent_results"].as_object().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_stream_emits_updates_then_report() {
        let request = post_json(
            "/api/analyze/stream",
            json!({"code": "def f(x):\n    return x\n", "language": "python"}),
        );
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);

        // started + 7 running + 7 progress + completed
        assert_eq!(body.matches("status_update").count(), 16);
        let complete = body.find("analysis_complete").unwrap();
        assert!(body.rfind("status_update").unwrap() < complete);
        assert!(!body.contains("analysis_error"));
    }

    #[tokio::test]
    async fn test_stream_validates_before_streaming() {
        let request = post_json("/api/analyze/stream", json!({"code": ""}));
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
