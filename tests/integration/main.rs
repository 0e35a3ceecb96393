//! End-to-end tests against the HTTP router with a scripted provider.
//!
//! Run with: cargo test --test integration

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

use itinerary_gateway::api::{create_router, AppState};
use itinerary_gateway::error::UpstreamError;
use itinerary_gateway::gateway::{Gateway, GatewaySettings};
use itinerary_gateway::interests::InterestCatalog;
use itinerary_gateway::provider::stub::{sample_itinerary, StubProvider, StubReply};

fn app(stub: Arc<StubProvider>) -> Router {
    app_with(stub, GatewaySettings::default())
}

fn app_with(stub: Arc<StubProvider>, settings: GatewaySettings) -> Router {
    let gateway = Gateway::new(Arc::new(InterestCatalog::builtin()), stub, settings);
    create_router(AppState::new(gateway))
}

async fn post(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap()
}

/// Parse an SSE body into (event name, data) pairs.
fn sse_events(body: &[u8]) -> Vec<(String, serde_json::Value)> {
    let text = String::from_utf8_lossy(body);
    text.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            Some((name?, data?))
        })
        .collect()
}

#[tokio::test]
async fn kyoto_three_day_itinerary() {
    let stub = Arc::new(StubProvider::with_text(sample_itinerary(3, &["culture", "food"])));
    let (status, body) = post(
        app(stub.clone()),
        "/api/generate-itinerary",
        serde_json::json!({"destination": "Kyoto", "interests": ["culture", "food"], "days": 3}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["destination"], "Kyoto");
    assert_eq!(body["interests"], serde_json::json!(["culture", "food"]));

    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 3);
    for (index, day) in days.iter().enumerate() {
        assert_eq!(day["day"], index as u64 + 1);
        let activities = day["activities"].as_array().unwrap();
        assert!(!activities.is_empty());
        for activity in activities {
            match activity.get("interest").and_then(|i| i.as_str()) {
                None | Some("culture") | Some("food") => {}
                Some(other) => panic!("unexpected interest label {other}"),
            }
        }
    }
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn missing_destination_is_rejected_without_upstream_call() {
    let stub = Arc::new(StubProvider::with_text(sample_itinerary(2, &["food"])));
    let (status, body) = post(
        app(stub.clone()),
        "/api/generate-itinerary",
        serde_json::json!({"interests": ["food"], "days": 2}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json(&body);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "destination is required");
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn unknown_interest_lists_invalid_values() {
    let stub = Arc::new(StubProvider::with_text(sample_itinerary(2, &["food"])));
    let (status, body) = post(
        app(stub.clone()),
        "/api/generate-itinerary",
        serde_json::json!({"destination": "Oslo", "interests": ["food", "skydiving"], "days": 2}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["message"]
        .as_str()
        .is_some_and(|m| m.contains("skydiving")));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn malformed_provider_output_hides_raw_text() {
    let raw = "Sure! Here's a lovely trip: day one, visit temples {{broken";
    let stub = Arc::new(StubProvider::with_text(raw));
    let (status, body) = post(
        app(stub),
        "/api/generate-itinerary",
        serde_json::json!({"destination": "Kyoto", "interests": ["culture"], "days": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let text = String::from_utf8_lossy(&body);
    assert!(!text.contains("lovely trip"));
    assert!(!text.contains("broken"));
    assert_eq!(json(&body)["error"], "upstream_error");
}

#[tokio::test]
async fn upstream_timeout_maps_to_504() {
    let stub = Arc::new(StubProvider::new(StubReply::Error(UpstreamError::Timeout)));
    let (status, _) = post(
        app(stub),
        "/api/generate-itinerary",
        serde_json::json!({"destination": "Kyoto", "interests": ["culture"], "days": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn stalled_provider_is_cut_off_with_504() {
    let stub = Arc::new(StubProvider::new(StubReply::Stall(Vec::new())));
    let settings = GatewaySettings {
        upstream_timeout: Duration::from_millis(50),
        ..GatewaySettings::default()
    };
    let (status, body) = post(
        app_with(stub, settings),
        "/api/generate-itinerary",
        serde_json::json!({"destination": "Kyoto", "interests": ["culture"], "days": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json(&body)["error"], "upstream_error");
}

#[tokio::test]
async fn stream_reaches_complete_and_stops() {
    let doc = sample_itinerary(2, &["food"]);
    let chunks = doc
        .as_bytes()
        .chunks(40)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect();
    let stub = Arc::new(StubProvider::new(StubReply::Chunks(chunks)));

    let (status, body) = post(
        app(stub),
        "/api/generate-itinerary-stream",
        serde_json::json!({"destination": "Lisbon", "interests": ["food"], "days": 2}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let events = sse_events(&body);
    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();

    assert_eq!(names.first(), Some(&"connected"));
    assert_eq!(names.last(), Some(&"complete"));
    assert_eq!(names.iter().filter(|n| **n == "complete" || **n == "error").count(), 1);

    for (name, data) in &events {
        assert_eq!(data["type"], name.as_str());
    }

    let chunked: String = events
        .iter()
        .filter(|(name, _)| name == "chunk")
        .filter_map(|(_, data)| data["text"].as_str())
        .collect();
    assert_eq!(chunked, doc);

    let (_, complete) = events.last().unwrap();
    assert_eq!(complete["data"]["days"].as_array().map(Vec::len), Some(2));
    assert_eq!(complete["data"]["days"][0]["coverage"]["count"], 2);
}

#[tokio::test]
async fn stream_upstream_failure_ends_with_error_event() {
    let stub = Arc::new(StubProvider::new(StubReply::ChunksThenError(
        vec!["{\"days\": [".to_string()],
        UpstreamError::Network("connection reset by peer".to_string()),
    )));

    let (status, body) = post(
        app(stub),
        "/api/generate-itinerary-stream",
        serde_json::json!({"destination": "Lisbon", "interests": ["food"], "days": 2}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let events = sse_events(&body);
    let (name, data) = events.last().unwrap();
    assert_eq!(name, "error");
    assert!(!data["message"]
        .as_str()
        .unwrap_or_default()
        .contains("connection reset"));
}

#[tokio::test]
async fn stream_validation_error_is_plain_json() {
    let stub = Arc::new(StubProvider::with_text(sample_itinerary(1, &["food"])));
    let (status, body) = post(
        app(stub.clone()),
        "/api/generate-itinerary-stream",
        serde_json::json!({"destination": "Lisbon", "interests": ["food"]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "validation_error");
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn edit_remove_day_two() {
    let generated = Arc::new(StubProvider::with_text(sample_itinerary(3, &["culture"])));
    let (_, itinerary) = post(
        app(generated),
        "/api/generate-itinerary",
        serde_json::json!({"destination": "Kyoto", "interests": ["culture"], "days": 3}),
    )
    .await;
    let itinerary = json(&itinerary);

    let mut days: Vec<serde_json::Value> = itinerary["days"].as_array().unwrap().clone();
    days.remove(1);
    let revised = serde_json::json!({
        "operation": "delete",
        "change_summary": "Removed day 2",
        "days": days,
    });
    let stub = Arc::new(StubProvider::with_text(revised.to_string()));

    let (status, body) = post(
        app(stub.clone()),
        "/api/edit-itinerary",
        serde_json::json!({"itinerary": itinerary, "instruction": "remove day 2"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["days"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["days"][1]["day"], 2);
    assert_eq!(body["operation"], "delete");
    assert_eq!(body["destination"], "Kyoto");
    assert!(stub
        .last_prompt()
        .is_some_and(|prompt| prompt.contains("remove day 2")));
}

#[tokio::test]
async fn edit_without_instruction_is_rejected() {
    let stub = Arc::new(StubProvider::with_text(sample_itinerary(1, &[])));
    let (status, body) = post(
        app(stub.clone()),
        "/api/edit-itinerary",
        serde_json::json!({"itinerary": {"days": [{"day": 1, "activities": []}]}}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["message"], "an edit instruction is required");
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn interests_are_idempotent() {
    let stub = Arc::new(StubProvider::with_text(""));
    let (first_status, first) = get(app(stub.clone()), "/api/interests").await;
    let (_, second) = get(app(stub.clone()), "/api/interests").await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn health_always_ok() {
    let (status, body) = get(app(Arc::new(StubProvider::with_text(""))), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_ok!(chrono::DateTime::parse_from_rfc3339(
        body["timestamp"].as_str().unwrap_or_default()
    ));
}

#[tokio::test]
async fn unconfigured_gateway_returns_500_for_valid_requests() {
    let gateway = Gateway::unconfigured(
        Arc::new(InterestCatalog::builtin()),
        GatewaySettings::default(),
    );
    let (status, body) = post(
        create_router(AppState::new(gateway)),
        "/api/generate-itinerary",
        serde_json::json!({"destination": "Kyoto", "interests": ["culture"], "days": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(&body);
    assert_eq!(body["error"], "configuration_error");
    assert_err!(serde_json::from_value::<u32>(body["message"].clone()));
}
