//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{
    edit_itinerary, generate_itinerary, generate_itinerary_stream, health, list_interests,
    metrics, openapi, AppState,
};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(health))
        // Itinerary endpoints
        .route("/api/interests", get(list_interests))
        .route("/api/generate-itinerary", post(generate_itinerary))
        .route("/api/generate-itinerary-stream", post(generate_itinerary_stream))
        .route("/api/edit-itinerary", post(edit_itinerary))
        // Observability and docs
        .route("/metrics", get(metrics))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    use crate::gateway::{Gateway, GatewaySettings};
    use crate::interests::InterestCatalog;
    use crate::provider::stub::{sample_itinerary, StubProvider};

    fn app(stub: Arc<StubProvider>) -> Router {
        let gateway =
            Gateway::new(Arc::new(InterestCatalog::builtin()), stub, GatewaySettings::default());
        create_router(AppState::new(gateway))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let response = app(Arc::new(StubProvider::with_text("")))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "stub-model");
    }

    #[tokio::test]
    async fn interests_endpoint_lists_categories() {
        let response = app(Arc::new(StubProvider::with_text("")))
            .oneshot(Request::builder().uri("/api/interests").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["categories"]
            .as_array()
            .is_some_and(|c| c.iter().any(|c| c["id"] == "food")));
        assert!(body["categories"][0].get("keywords").is_none());
        assert!(body["all_tags"].as_array().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn unparseable_body_returns_400_envelope() {
        let stub = Arc::new(StubProvider::with_text(""));
        let response = app(stub.clone())
            .oneshot(post_json("/api/generate-itinerary", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn generate_endpoint_returns_itinerary() {
        let stub = Arc::new(StubProvider::with_text(sample_itinerary(2, &["food"])));
        let response = app(stub)
            .oneshot(post_json(
                "/api/generate-itinerary",
                r#"{"destination":"Lisbon","interests":["food"],"days":2}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["days"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn stream_endpoint_sets_sse_headers() {
        let stub = Arc::new(StubProvider::with_text(sample_itinerary(1, &["food"])));
        let response = app(stub)
            .oneshot(post_json(
                "/api/generate-itinerary-stream",
                r#"{"destination":"Lisbon","interests":["food"],"days":1}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let response = app(Arc::new(StubProvider::with_text("")))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/generate-itinerary")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_404() {
        let response = app(Arc::new(StubProvider::with_text("")))
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = app(Arc::new(StubProvider::with_text("")))
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["paths"].get("/api/edit-itinerary").is_some());
    }
}
