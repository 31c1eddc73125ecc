//! HTTP scoring endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use riskgate_core::Verdict;
use riskgate_runtime::RiskOrchestrator;

use crate::error::AppError;

/// Model name reported when a request does not name one.
pub const DEFAULT_MODEL: &str = "Phi-3-mini-4k-instruct";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RiskOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    data: Option<Value>,
    model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/score", post(score))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn score(
    State(state): State<AppState>,
    body: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Json<Verdict>, AppError> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let data = request
        .data
        .ok_or_else(|| AppError::BadRequest("Missing 'data' field".to_string()))?;

    // The model field is informational; the oracle endpoint is fixed at startup.
    let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);
    tracing::debug!(model, "Scoring request received");

    let assessment = state.orchestrator.score(data).await?;
    Ok(Json(assessment.verdict))
}

/// 200 when the oracle answers its health check, 503 otherwise.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let oracle_ok = state.orchestrator.oracle().health_check().await;

    let (http_status, status) = if oracle_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use riskgate_core::{RecordSchema, RuleSet};
    use riskgate_runtime::{
        CompletionProvider, CompletionRequest, CompletionResponse, Oracle, OracleConfig,
        ProviderError,
    };
    use serde_json::json;
    use tower::ServiceExt;

    struct FixedProvider {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl CompletionProvider for FixedProvider {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            match self.reply {
                Some(reply) => Ok(CompletionResponse {
                    content: reply.to_string(),
                }),
                None => Err(ProviderError::HttpError("connection refused".into())),
            }
        }

        async fn health_check(&self) -> bool {
            self.reply.is_some()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn app(reply: Option<&'static str>) -> Router {
        let rules = RuleSet::from_yaml(
            r#"
rules:
  - condition: "transaction['amount'] > 1000"
    message: large amount
  - condition: merchant category sounds like gambling
    message: gambling merchant
"#,
        )
        .unwrap();
        let schema = RecordSchema::from_value(&json!({
            "type": "object",
            "required": ["amount"],
            "properties": {"amount": {"type": "number"}}
        }))
        .unwrap();
        let oracle = Oracle::new(Arc::new(FixedProvider { reply }), &OracleConfig::default());

        let orchestrator = RiskOrchestrator::builder()
            .rules(Arc::new(rules))
            .schema(Arc::new(schema))
            .oracle(Arc::new(oracle))
            .build()
            .unwrap();

        router(AppState {
            orchestrator: Arc::new(orchestrator),
        })
    }

    async fn post_score(app: Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/score")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_score_high() {
        let (status, body) = post_score(
            app(Some("no")),
            r#"{"data": {"amount": 1500}, "model": "tiny"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"score": "high", "justification": "Rules applied: large amount."})
        );
    }

    #[tokio::test]
    async fn test_score_low() {
        let (status, body) = post_score(app(Some("no")), r#"{"data": [{"amount": 5}]}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"score": "low", "justification": "No rules applied."})
        );
    }

    #[tokio::test]
    async fn test_missing_data_is_bad_request() {
        let (status, body) = post_score(app(Some("no")), r#"{"model": "tiny"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("data"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (status, body) = post_score(app(Some("no")), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("error").is_some());
    }

    #[tokio::test]
    async fn test_oracle_failure_is_server_error() {
        let (status, body) = post_score(app(None), r#"{"data": {"amount": 5}}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("gambling merchant"));
    }

    #[tokio::test]
    async fn test_health() {
        for (reply, expected, status) in [
            (Some("no"), StatusCode::OK, "ok"),
            (None, StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        ] {
            let response = app(reply)
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), expected);

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(health.status, status);
            assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        }
    }
}
