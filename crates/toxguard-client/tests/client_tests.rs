//! Client and comment gate against a local stub of the moderation endpoint

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use toxguard_client::{CommentGate, ModerationClient, Verdict};
use toxguard_core::Error;

/// Mimics the server: anything containing "idiot" is rejected
async fn stub_moderate(Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default();

    if text.contains("idiot") {
        Json(json!({
            "is_approved": false,
            "toxicity_score": 0.93,
            "details": {
                "non-toxic": 0.07,
                "insult": 0.91,
                "obscenity": 0.62,
                "threat": 0.5,
                "dangerous": 0.04
            }
        }))
    } else {
        Json(json!({
            "is_approved": true,
            "toxicity_score": 0.02,
            "details": {
                "non-toxic": 0.98,
                "insult": 0.01,
                "obscenity": 0.01,
                "threat": 0.0,
                "dangerous": 0.01
            }
        }))
    }
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn stub_client() -> ModerationClient {
    let addr = spawn(Router::new().route("/moderate", post(stub_moderate))).await;
    ModerationClient::new(Some(format!("http://{}/", addr))).unwrap()
}

#[tokio::test]
async fn test_client_posts_text() {
    let client = stub_client().await;

    let result = client.moderate("nice anime").await.unwrap();
    assert!(result.is_approved);
    assert_eq!(result.details.len(), 5);

    let result = client.moderate("you idiot").await.unwrap();
    assert!(!result.is_approved);
    assert_eq!(result.toxicity_score, 0.93);
}

#[tokio::test]
async fn test_gate_approves_clean_comment() {
    let gate = CommentGate::new(stub_client().await);

    match gate.review("Loved the ending").await.unwrap() {
        Verdict::Approved(result) => assert_eq!(result.toxicity_score, 0.02),
        other => panic!("Expected approval, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gate_rejects_with_flagged_labels() {
    let gate = CommentGate::new(stub_client().await);

    let rejection = match gate.review("what an idiot").await.unwrap() {
        Verdict::Rejected(rejection) => rejection,
        other => panic!("Expected rejection, got {:?}", other),
    };

    // threat sits exactly at 0.5 and is not reported
    assert_eq!(
        rejection.flagged,
        vec![("insult".to_string(), 0.91), ("obscenity".to_string(), 0.62)]
    );

    let message = rejection.to_string();
    assert!(message.contains("Overall toxicity: 93%"));
    assert!(message.contains("insult (91%), obscenity (62%)"));
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let addr = spawn(Router::new().route(
        "/moderate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;
    let gate = CommentGate::new(ModerationClient::new(Some(format!("http://{}", addr))).unwrap());

    let err = gate.review("hello").await.unwrap_err();
    assert!(matches!(err, Error::ModerationUnavailable(_)));
}

#[tokio::test]
async fn test_garbage_response_is_unavailable() {
    let addr = spawn(Router::new().route("/moderate", post(|| async { "not json" }))).await;
    let client = ModerationClient::new(Some(format!("http://{}", addr))).unwrap();

    let err = client.moderate("hello").await.unwrap_err();
    assert!(matches!(err, Error::ModerationUnavailable(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    // Grab a free port and close it again
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client =
        ModerationClient::with_timeout(Some(format!("http://{}", addr)), Duration::from_secs(1))
            .unwrap();

    let err = client.moderate("hello").await.unwrap_err();
    assert!(matches!(err, Error::ModerationUnavailable(_)));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let addr = spawn(Router::new().route(
        "/moderate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "late"
        }),
    ))
    .await;
    let client = ModerationClient::with_timeout(
        Some(format!("http://{}", addr)),
        Duration::from_millis(100),
    )
    .unwrap();

    let err = client.moderate("hello").await.unwrap_err();
    assert!(matches!(err, Error::ModerationUnavailable(_)));
}
