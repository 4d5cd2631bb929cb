// crates/server/tests/pipeline_flow.rs
//! End-to-end pipeline scenarios: the full control surface wired to mocked
//! external services (ledger, scene shaping, image synthesis, world
//! generation).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use worldsmith_core::{
    HttpImageSynthesizer, HttpLedger, HttpSceneDirector, PipelineConfig, RateLimitConfig,
    WorldGenClient,
};
use worldsmith_server::{create_app, AppState};

struct ExternalServices {
    ledger: MockServer,
    scenes: MockServer,
    images: MockServer,
    worldgen: MockServer,
}

/// Start all four mock services with the non-ledger happy paths mounted.
async fn external_services() -> ExternalServices {
    let svc = ExternalServices {
        ledger: MockServer::start().await,
        scenes: MockServer::start().await,
        images: MockServer::start().await,
        worldgen: MockServer::start().await,
    };

    Mock::given(method("POST"))
        .and(path("/v1/scenes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summary": "sunlit forum ringed by marble columns",
            "points_of_interest": ["forum", "aqueduct"]
        })))
        .mount(&svc.scenes)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://img.example/rome.png"
        })))
        .mount(&svc.images)
        .await;

    svc
}

/// Mount a world-generation flow that completes successfully.
async fn mount_completing_worldgen(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operation_id": "op-1"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "done",
            "result": { "world_id": "world-1" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/worlds/world-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "world": { "glb_url": "https://cdn.example/world-1.glb" },
                "collision": { "glb_url": "https://cdn.example/world-1-col.glb" },
                "preview": { "image_url": "https://cdn.example/world-1.png" }
            }
        })))
        .mount(server)
        .await;
}

/// Tight pipeline timing so tests finish in tens of milliseconds.
fn fast_config() -> PipelineConfig {
    PipelineConfig {
        poll_interval: Duration::from_millis(10),
        poll_max_attempts: 50,
        result_retry_interval: Duration::from_millis(10),
        result_retry_attempts: 3,
        ..PipelineConfig::default()
    }
}

fn build_app(svc: &ExternalServices, limit: RateLimitConfig) -> (Router, Arc<AppState>) {
    let state = AppState::new(
        fast_config(),
        limit,
        Arc::new(HttpLedger::new(svc.ledger.uri())),
        Arc::new(HttpSceneDirector::new(svc.scenes.uri())),
        Arc::new(HttpImageSynthesizer::new(svc.images.uri())),
        Arc::new(WorldGenClient::new(svc.worldgen.uri())),
    );
    (create_app(Arc::clone(&state)), state)
}

fn start_request(body: &str, owner: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/pipeline/start")
        .header("content-type", "application/json")
        .header("x-owner-id", owner)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Poll the status endpoint until the job reaches a terminal state.
async fn await_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/pipeline/{job_id}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job = response_json(response).await;
        if matches!(
            job["status"].as_str(),
            Some("complete") | Some("error") | Some("cancelled")
        ) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn test_standard_job_debits_completes_and_never_refunds() {
    let svc = external_services().await;
    mount_completing_worldgen(&svc.worldgen).await;

    // Owner starts with exactly 1 credit: the debit takes it to 0 and a
    // completed job must never credit it back.
    Mock::given(method("POST"))
        .and(path("/v1/accounts/rome-fan/debit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 0 })))
        .expect(1)
        .mount(&svc.ledger)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts/rome-fan/credit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 1 })))
        .expect(0)
        .mount(&svc.ledger)
        .await;

    let (app, _state) = build_app(&svc, RateLimitConfig::default());

    let response = app
        .clone()
        .oneshot(start_request(
            r#"{"concept":"ancient rome","quality":"standard"}"#,
            "rome-fan",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let started = response_json(response).await;
    assert_eq!(started["status"], "started");
    assert_eq!(started["creditsRemaining"], 0);
    let job_id = started["jobId"].as_str().unwrap().to_string();

    let job = await_terminal(&app, &job_id).await;
    assert_eq!(job["status"], "complete");
    assert_eq!(job["result"]["worldUrl"], "https://cdn.example/world-1.glb");
    assert_eq!(
        job["result"]["collisionUrl"],
        "https://cdn.example/world-1-col.glb"
    );
    assert!(job["completedAt"].is_string());
    // Ledger expectations (exactly one debit, zero credits) verify when the
    // mock server drops.
}

#[tokio::test]
async fn test_insufficient_credits_rejects_before_any_work() {
    let svc = external_services().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts/poor-user/debit"))
        .respond_with(ResponseTemplate::new(402))
        .expect(1)
        .mount(&svc.ledger)
        .await;

    let (app, state) = build_app(&svc, RateLimitConfig::default());
    let response = app
        .oneshot(start_request(r#"{"concept":"ancient rome"}"#, "poor-user"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    // The job was never created.
    assert!(state.store.is_empty());
    // No generation request was ever submitted.
    assert!(svc.worldgen.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limit_denies_third_request_in_window() {
    let svc = external_services().await;
    mount_completing_worldgen(&svc.worldgen).await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts/busy-user/debit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 10 })))
        .expect(2)
        .mount(&svc.ledger)
        .await;

    let limit = RateLimitConfig {
        window: Duration::from_secs(3600),
        max_requests: 2,
    };
    let (app, _state) = build_app(&svc, limit);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(start_request(r#"{"concept":"ancient rome"}"#, "busy-user"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(start_request(r#"{"concept":"ancient rome"}"#, "busy-user"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let body = response_json(response).await;
    assert!(body["retryAfter"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_failed_generation_refunds_the_debit() {
    let svc = external_services().await;
    Mock::given(method("POST"))
        .and(path("/v2/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operation_id": "op-1"
        })))
        .mount(&svc.worldgen)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "done",
            "error": { "message": "mesh reconstruction failed" }
        })))
        .mount(&svc.worldgen)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/accounts/rome-fan/debit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 0 })))
        .expect(1)
        .mount(&svc.ledger)
        .await;
    // Exactly one refund, equal to the debit.
    Mock::given(method("POST"))
        .and(path("/v1/accounts/rome-fan/credit"))
        .and(wiremock::matchers::body_json(json!({ "amount": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 1 })))
        .expect(1)
        .mount(&svc.ledger)
        .await;

    let (app, _state) = build_app(&svc, RateLimitConfig::default());
    let response = app
        .clone()
        .oneshot(start_request(
            r#"{"concept":"ancient rome","quality":"standard"}"#,
            "rome-fan",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = response_json(response).await["jobId"]
        .as_str()
        .unwrap()
        .to_string();

    let job = await_terminal(&app, &job_id).await;
    assert_eq!(job["status"], "error");
    assert!(job["error"]
        .as_str()
        .unwrap()
        .contains("mesh reconstruction failed"));
}

#[tokio::test]
async fn test_cancel_during_polling_lands_quickly_without_refund() {
    let svc = external_services().await;
    // The operation never finishes; only cancellation can end this job
    // before the poll budget runs out.
    Mock::given(method("POST"))
        .and(path("/v2/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operation_id": "op-1"
        })))
        .mount(&svc.worldgen)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "running"
        })))
        .mount(&svc.worldgen)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/accounts/rome-fan/debit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 0 })))
        .mount(&svc.ledger)
        .await;
    // Default policy: cancellation does not refund.
    Mock::given(method("POST"))
        .and(path("/v1/accounts/rome-fan/credit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 1 })))
        .expect(0)
        .mount(&svc.ledger)
        .await;

    let (app, _state) = build_app(&svc, RateLimitConfig::default());
    let response = app
        .clone()
        .oneshot(start_request(r#"{"concept":"ancient rome"}"#, "rome-fan"))
        .await
        .unwrap();
    let job_id = response_json(response).await["jobId"]
        .as_str()
        .unwrap()
        .to_string();

    // Let it get into the polling loop, then cancel.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/pipeline/{job_id}/cancel"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let job = await_terminal(&app, &job_id).await;
    assert_eq!(job["status"], "cancelled");
}
