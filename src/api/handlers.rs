//! HTTP API handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::warn;
use utoipa::OpenApi;

use super::docs::ApiDoc;
use crate::error::{ErrorResponse, GatewayError, ValidationError};
use crate::gateway::{Gateway, HealthStatus, InterestListing, StreamEvent};
use crate::itinerary::{EditRequest, ItineraryRequest, ItineraryResponse};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// The itinerary gateway.
    pub gateway: Arc<Gateway>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Unwrap a JSON body, mapping decode failures to a validation error.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ValidationError::MalformedBody(rejection.body_text()).into())
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode stream event");
            Event::default()
                .event("error")
                .data(r#"{"type":"error","message":"Failed to encode stream event"}"#)
        })
}

/// Liveness check - always returns 200.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = HealthStatus)),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.gateway.health())
}

/// Interest catalog.
#[utoipa::path(
    get,
    path = "/api/interests",
    responses((status = 200, description = "Interest categories", body = InterestListing)),
    tag = "itinerary"
)]
pub async fn list_interests(State(state): State<AppState>) -> Json<InterestListing> {
    Json(state.gateway.list_interests())
}

/// Generate an itinerary in one response.
#[utoipa::path(
    post,
    path = "/api/generate-itinerary",
    request_body = ItineraryRequest,
    responses(
        (status = 200, description = "Generated itinerary", body = ItineraryResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Service misconfigured", body = ErrorResponse),
        (status = 502, description = "Provider failure", body = ErrorResponse),
        (status = 504, description = "Provider timeout", body = ErrorResponse)
    ),
    tag = "itinerary"
)]
pub async fn generate_itinerary(
    State(state): State<AppState>,
    payload: Result<Json<ItineraryRequest>, JsonRejection>,
) -> Result<Json<ItineraryResponse>, GatewayError> {
    let request = json_body(payload)?;
    Ok(Json(state.gateway.generate_itinerary(request).await?))
}

/// Generate an itinerary as a server-sent event stream.
#[utoipa::path(
    post,
    path = "/api/generate-itinerary-stream",
    request_body = ItineraryRequest,
    responses(
        (status = 200, description = "Event stream ending in complete or error",
            content_type = "text/event-stream", body = StreamEvent),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Service misconfigured", body = ErrorResponse)
    ),
    tag = "itinerary"
)]
pub async fn generate_itinerary_stream(
    State(state): State<AppState>,
    payload: Result<Json<ItineraryRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let request = json_body(payload)?;
    let events = state.gateway.generate_itinerary_stream(request)?;

    let body = events.map(|event| Ok::<_, Infallible>(sse_event(&event)));
    let mut response = Sse::new(body)
        .keep_alive(KeepAlive::default())
        .into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));

    Ok(response)
}

/// Revise an existing itinerary.
#[utoipa::path(
    post,
    path = "/api/edit-itinerary",
    request_body = EditRequest,
    responses(
        (status = 200, description = "Revised itinerary", body = ItineraryResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Service misconfigured", body = ErrorResponse),
        (status = 502, description = "Provider failure", body = ErrorResponse),
        (status = 504, description = "Provider timeout", body = ErrorResponse)
    ),
    tag = "itinerary"
)]
pub async fn edit_itinerary(
    State(state): State<AppState>,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> Result<Json<ItineraryResponse>, GatewayError> {
    let request = json_body(payload)?;
    Ok(Json(state.gateway.edit_itinerary(request).await?))
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// OpenAPI document.
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

