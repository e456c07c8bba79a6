// Integration tests for the gateway service and its client

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

use civica::content::ContentProcessor;
use civica::error::Error;
use civica::gateway::{
    create_gateway_router, GatewayClient, GatewayState, PendingRequests,
};
use civica::provider::ProviderWorker;

// ---------------------------------------------------------------------------
// GatewayClient against a mock upstream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_client_health_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "healthy", "worker_active": true}"#)
        .create_async()
        .await;

    let client = GatewayClient::new(&server.url(), Duration::from_secs(2)).unwrap();
    let health = client.health().await.unwrap();
    assert_eq!(health["status"], "healthy");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_status_not_found_is_upstream_404() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/status/alloc_missing")
        .with_status(404)
        .with_body(r#"{"error": "Request not found"}"#)
        .create_async()
        .await;

    let client = GatewayClient::new(&server.url(), Duration::from_secs(2)).unwrap();
    match client.status("alloc_missing").await {
        Err(Error::Upstream { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected upstream 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_forward_allocation_multipart() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/allocation/request")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"request_id": "alloc_abc123def456", "status": "pending"}"#)
        .create_async()
        .await;

    let client = GatewayClient::new(&server.url(), Duration::from_secs(2)).unwrap();
    let fields = vec![
        ("region_id".to_string(), "R-1".to_string()),
        ("poverty_index".to_string(), "0.8".to_string()),
    ];
    let result = client.forward_allocation(fields, vec![]).await.unwrap();
    assert_eq!(result["request_id"], "alloc_abc123def456");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_unreachable_is_gateway_unreachable() {
    // Nothing listens here
    let client =
        GatewayClient::new("http://127.0.0.1:59998", Duration::from_millis(500)).unwrap();
    match client.health().await {
        Err(Error::GatewayUnreachable { url, .. }) => {
            assert!(url.contains("127.0.0.1:59998"));
        }
        other => panic!("expected gateway unreachable, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Gateway app end-to-end (engine-only provider)
// ---------------------------------------------------------------------------

fn gateway_app() -> axum::Router {
    let processor = ContentProcessor::new(1024 * 1024, Duration::from_secs(2)).unwrap();
    let pending = Arc::new(PendingRequests::new(Duration::from_secs(60)));

    let (jobs_tx, jobs_rx) = mpsc::channel(8);
    let (results_tx, mut results_rx) = mpsc::channel(8);

    let worker = ProviderWorker::new(None, 2, results_tx);
    let stats = worker.stats();
    tokio::spawn(worker.run(jobs_rx));

    let pump = Arc::clone(&pending);
    tokio::spawn(async move {
        while let Some(result) = results_rx.recv().await {
            let id = result.request_id.clone();
            if let Ok(value) = serde_json::to_value(&result) {
                pump.complete(&id, value);
            }
        }
    });

    let state = Arc::new(GatewayState::new(
        pending,
        jobs_tx,
        processor,
        stats,
        "engine_local".to_string(),
    ));
    create_gateway_router(state)
}

fn multipart_body(fields: &[(&str, &str)]) -> (String, String) {
    let boundary = "civica-test-boundary";
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    (
        format!("multipart/form-data; boundary={boundary}"),
        body,
    )
}

async fn json_of(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_gateway_root_banner() {
    let app = gateway_app();
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["service"], "Civica Gateway");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_gateway_allocation_flow_to_completion() {
    let app = gateway_app();

    let (content_type, body) = multipart_body(&[
        ("region_id", "R-7"),
        ("poverty_index", "0.85"),
        ("project_impact", "0.7"),
        ("environmental_score", "0.6"),
        ("corruption_risk", "0.2"),
        ("notes", "flood damage in the river basin"),
    ]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/allocation/request")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let submitted = json_of(response).await;
    assert_eq!(submitted["status"], "pending");
    let request_id = submitted["request_id"].as_str().unwrap().to_string();
    assert!(request_id.starts_with("alloc_"));
    assert!(submitted["data"]["priority_score"].as_f64().unwrap() > 0.0);

    // The engine-only worker answers quickly; poll the status endpoint
    let mut completed = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/status/{request_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let view = json_of(response).await;
        if view["status"] == "completed" {
            completed = Some(view);
            break;
        }
    }

    let view = completed.expect("request never completed");
    let recommendation = &view["data"]["data"]["recommendation"];
    assert_eq!(recommendation["engine"], "engine_local");
    assert!(recommendation["priority_score"].as_f64().unwrap() > 0.5);
}

#[tokio::test]
async fn test_gateway_allocation_validates_metrics() {
    let app = gateway_app();

    let (content_type, body) = multipart_body(&[
        ("region_id", "R-7"),
        ("poverty_index", "1.5"),
        ("project_impact", "0.7"),
        ("environmental_score", "0.6"),
        ("corruption_risk", "0.2"),
    ]);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/allocation/request")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gateway_status_unknown_is_404() {
    let app = gateway_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/status/alloc_nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gateway_health_and_metrics() {
    let app = gateway_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_of(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["worker_active"], true);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let metrics = json_of(response).await;
    assert!(metrics["uptime_secs"].as_u64().is_some());
}

// ---------------------------------------------------------------------------
// API proxy fallback (gateway down)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_proxy_allocation_falls_back_to_engine() {
    use civica::server::{create_router, AppState};

    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(
        AppState::for_tests(dir.path().to_path_buf(), "http://127.0.0.1:59997").unwrap(),
    );
    let app = create_router(Arc::clone(&state));

    let (content_type, body) = multipart_body(&[
        ("region_id", "R-3"),
        ("poverty_index", "0.9"),
        ("project_impact", "0.8"),
        ("environmental_score", "0.7"),
        ("corruption_risk", "0.1"),
    ]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/gateway/allocation")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_of(response).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["status"], "completed");
    assert_eq!(result["data"]["mode"], "local_engine");
    assert!(result["warning"].as_str().unwrap().contains("civica gateway"));

    // The stored record was analyzed by the engine fallback
    let request_id = result["request_id"].as_str().unwrap();
    let record = state.store.get_allocation_request(request_id).await.unwrap();
    assert_eq!(record.status, "analyzed");
    assert!(record.priority_score.is_some());
}

#[tokio::test]
async fn test_proxy_explanation_falls_back_locally() {
    use civica::server::{create_router, AppState};

    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(
        AppState::for_tests(dir.path().to_path_buf(), "http://127.0.0.1:59996").unwrap(),
    );
    let app = create_router(Arc::clone(&state));

    let (content_type, body) = multipart_body(&[
        ("region_id", "R-3"),
        (
            "allocation_data",
            r#"{"priority_score": 0.75, "allocation_percentage": 75.0}"#,
        ),
        ("language", "es"),
    ]);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/gateway/explanation")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_of(response).await;
    assert_eq!(result["status"], "completed");
    assert!(result["data"]["explanation"]
        .as_str()
        .unwrap()
        .contains("CRÍTICA"));

    let request_id = result["request_id"].as_str().unwrap();
    let record = state
        .store
        .get_explanation_request(request_id)
        .await
        .unwrap();
    assert_eq!(record.status, "completed");
}

#[tokio::test]
async fn test_proxy_missing_fields_rejected_before_forwarding() {
    use civica::server::{create_router, AppState};

    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(
        AppState::for_tests(dir.path().to_path_buf(), "http://127.0.0.1:59995").unwrap(),
    );
    let app = create_router(state);

    let (content_type, body) = multipart_body(&[("region_id", "R-3")]);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/gateway/allocation")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
