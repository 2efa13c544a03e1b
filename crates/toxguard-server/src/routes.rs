//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use toxguard_core::{ModerationRequest, ModerationResult};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::state::AppState;

/// Labels at or below this score are not worth reporting in logs
const FLAG_LOG_SCORE: f64 = 0.5;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/moderate", post(moderate).fallback(method_not_allowed))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// Classify the text and apply the toxicity threshold
async fn moderate(
    State(state): State<AppState>,
    payload: Result<Json<ModerationRequest>, JsonRejection>,
) -> Result<Json<ModerationResult>, AppError> {
    metrics::counter!("toxguard_requests_total").increment(1);
    let Json(req) = payload?;

    let request_id = Uuid::new_v4();
    debug!(%request_id, chars = req.text.chars().count(), "Moderation request");

    let (result, classification) = state.moderator.moderate(&req.text).await?;

    metrics::histogram!("toxguard_inference_latency_us")
        .record(classification.latency_us as f64);

    if result.is_approved {
        metrics::counter!("toxguard_decisions_total", "decision" => "approved").increment(1);
        debug!(
            %request_id,
            toxicity = result.toxicity_score,
            latency_us = classification.latency_us,
            "Text approved"
        );
    } else {
        metrics::counter!("toxguard_decisions_total", "decision" => "rejected").increment(1);
        let flagged = result.flagged_labels(&state.moderator.spec().safe_label, FLAG_LOG_SCORE);
        info!(
            %request_id,
            toxicity = result.toxicity_score,
            latency_us = classification.latency_us,
            flagged = ?flagged,
            "Text rejected"
        );
    }

    Ok(Json(result))
}

async fn fallback() -> AppError {
    AppError::NotFound
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Error handling
#[derive(Debug)]
enum AppError {
    InvalidRequest(JsonRejection),
    Inference(toxguard_core::Error),
    NotFound,
    MethodNotAllowed,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection)
    }
}

impl From<toxguard_core::Error> for AppError {
    fn from(err: toxguard_core::Error) -> Self {
        AppError::Inference(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match self {
            AppError::InvalidRequest(rejection) => {
                metrics::counter!("toxguard_errors_total", "kind" => "invalid_request")
                    .increment(1);
                (rejection.status(), rejection.body_text(), "invalid_request_error")
            }
            AppError::Inference(err) => {
                error!("Moderation failed: {}", err);
                metrics::counter!("toxguard_errors_total", "kind" => err.kind()).increment(1);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.to_string(),
                    "inference_error",
                )
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "Not found".to_string(),
                "not_found_error",
            ),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
                "invalid_request_error",
            ),
        };

        let body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;
    use toxguard_classifiers::{ClassificationResult, Classifier};
    use toxguard_core::{Error, Result};

    /// Scores toxic when the text mentions "idiot"
    struct KeywordClassifier;

    #[async_trait]
    impl Classifier for KeywordClassifier {
        async fn classify(&self, text: &str) -> Result<ClassificationResult> {
            let insult = if text.contains("idiot") { 0.92 } else { 0.03 };
            Ok(ClassificationResult::from_scores(vec![
                ("non-toxic".to_string(), 1.0 - insult),
                ("insult".to_string(), insult),
                ("obscenity".to_string(), 0.01),
                ("threat".to_string(), 0.01),
                ("dangerous".to_string(), 0.01),
            ]))
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    struct BrokenClassifier;

    #[async_trait]
    impl Classifier for BrokenClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassificationResult> {
            Err(Error::classifier("Model forward pass failed"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn router_with(classifier: Arc<dyn Classifier>, config: ServerConfig) -> Router {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = AppState::with_classifier(config, classifier, handle).unwrap();
        create_router(state)
    }

    fn router() -> Router {
        router_with(Arc::new(KeywordClassifier), ServerConfig::default())
    }

    fn moderate_request(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/moderate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_moderate_approves_clean_text() {
        let response = router()
            .oneshot(moderate_request(r#"{"text": "Great episode!"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["is_approved"], true);
        let score = body["toxicity_score"].as_f64().unwrap();
        assert!((score - 0.03).abs() < 1e-6);
        assert_eq!(body["details"].as_object().unwrap().len(), 5);
        assert!(body["details"]["non-toxic"].is_number());
    }

    #[tokio::test]
    async fn test_moderate_rejects_toxic_text() {
        let response = router()
            .oneshot(moderate_request(r#"{"text": "you idiot"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["is_approved"], false);
        assert!(body["toxicity_score"].as_f64().unwrap() > 0.75);
    }

    #[tokio::test]
    async fn test_threshold_from_config() {
        let mut config = ServerConfig::default();
        config.moderation.threshold = 0.01;

        let response = router_with(Arc::new(KeywordClassifier), config)
            .oneshot(moderate_request(r#"{"text": "Great episode!"}"#))
            .await
            .unwrap();

        assert_eq!(json_body(response).await["is_approved"], false);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = router()
            .oneshot(moderate_request(r#"{"text": "#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_missing_text_is_unprocessable() {
        let response = router()
            .oneshot(moderate_request(r#"{"content": "hello"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = router()
            .oneshot(moderate_request(r#"{"text": 42}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let request = Request::builder()
            .method("POST")
            .uri("/moderate")
            .body(Body::from(r#"{"text": "hi"}"#))
            .unwrap();

        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut config = ServerConfig::default();
        config.max_body_bytes = 32;

        let body = format!(r#"{{"text": "{}"}}"#, "a".repeat(64));
        let request = Request::builder()
            .method("POST")
            .uri("/moderate")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();

        let response = router_with(Arc::new(KeywordClassifier), config)
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert!(body["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_classifier_failure_is_internal_error() {
        let response = router_with(Arc::new(BrokenClassifier), ServerConfig::default())
            .oneshot(moderate_request(r#"{"text": "anything"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"]["type"], "inference_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("forward pass"));
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let response = router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router()
            .oneshot(Request::get("/moderate").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["message"], "Method not allowed");
    }

    #[test]
    fn test_malformed_requests_are_counted() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let state = AppState::with_classifier(
            ServerConfig::default(),
            Arc::new(KeywordClassifier),
            handle.clone(),
        )
        .unwrap();

        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let response = create_router(state)
                    .oneshot(moderate_request(r#"{"text": "#))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            });
        });

        let rendered = handle.render();
        assert!(rendered.contains("toxguard_requests_total 1"), "{}", rendered);
        assert!(rendered.contains("toxguard_errors_total{kind=\"invalid_request\"} 1"));
    }
}
