//! Itinerary gateway: validates client requests, calls the provider and
//! adapts model output to the response contract.

pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use chrono::{DateTime, Days, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ConfigError, GatewayError, Result, UpstreamError, ValidationError};
use crate::interests::{InterestCatalog, InterestCategory};
use crate::itinerary::{
    edit_prompt, generation_prompt, parse_itinerary, validate_edit, validate_request, DateRange,
    DayPlan, EditPlan, EditRequest, ItineraryRequest, ItineraryResponse, TripPlan,
};
use crate::metrics;
use crate::provider::{GenerationParams, GenerativeProvider, ProviderReply, StreamChunk};

pub use stream::{StreamEvent, StreamLifecycle, StreamPhase, StreamState};

const OP_GENERATE: &str = "generate";
const OP_STREAM: &str = "generate_stream";
const OP_EDIT: &str = "edit";

/// Destination reported for edits that never named one.
pub const UNKNOWN_DESTINATION: &str = "Unknown destination";

/// Tunables taken from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// Longest accepted trip.
    pub max_trip_days: u32,
    /// Attempts for non-streamed calls.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// Bound on each upstream call, or on a whole stream.
    pub upstream_timeout: Duration,
    /// Generation temperature.
    pub temperature: f32,
    /// Edit temperature.
    pub edit_temperature: f32,
    /// Output token cap.
    pub max_output_tokens: u32,
}

impl GatewaySettings {
    /// Settings from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_trip_days: config.max_trip_days,
            max_attempts: config.upstream_max_attempts.max(1),
            retry_delay: config.retry_delay(),
            upstream_timeout: config.upstream_timeout(),
            temperature: config.generation_temperature,
            edit_temperature: 0.3,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Liveness report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthStatus {
    /// Always "ok".
    pub status: String,
    /// Service name.
    pub service: String,
    /// Crate version.
    pub version: String,
    /// Configured model, or "unconfigured".
    pub model: String,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
}

/// Interest catalog as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InterestListing {
    /// Always true.
    pub success: bool,
    /// Categories in display order.
    pub categories: Vec<InterestCategory>,
    /// Every tag, sorted and deduplicated.
    pub all_tags: Vec<String>,
}

/// The gateway. Cheap to clone; shared by all requests.
#[derive(Clone)]
pub struct Gateway {
    catalog: Arc<InterestCatalog>,
    provider: Option<Arc<dyn GenerativeProvider>>,
    settings: GatewaySettings,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("model", &self.provider.as_ref().map(|p| p.model()))
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn rejected(operation: &'static str, e: ValidationError) -> GatewayError {
    metrics::inc_validation_rejections(operation);
    e.into()
}

fn upstream_failure(operation: &'static str, e: UpstreamError) -> UpstreamError {
    metrics::inc_upstream_failures(operation, e.kind());
    e
}

fn total_activities(days: &[DayPlan]) -> usize {
    days.iter().map(|d| d.activities.len()).sum()
}

impl Gateway {
    /// Gateway backed by `provider`.
    pub fn new(
        catalog: Arc<InterestCatalog>,
        provider: Arc<dyn GenerativeProvider>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            catalog,
            provider: Some(provider),
            settings,
        }
    }

    /// Gateway with no provider. Valid requests fail with a configuration error.
    pub fn unconfigured(catalog: Arc<InterestCatalog>, settings: GatewaySettings) -> Self {
        Self {
            catalog,
            provider: None,
            settings,
        }
    }

    fn provider(&self) -> std::result::Result<Arc<dyn GenerativeProvider>, ConfigError> {
        self.provider.clone().ok_or(ConfigError::MissingApiKey)
    }

    fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: Some(self.settings.temperature),
            max_output_tokens: Some(self.settings.max_output_tokens),
            json_output: true,
        }
    }

    fn edit_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: Some(self.settings.edit_temperature),
            ..self.generation_params()
        }
    }

    /// Liveness. No side effects.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model: self
                .provider
                .as_ref()
                .map(|p| p.model().to_string())
                .unwrap_or_else(|| "unconfigured".to_string()),
            timestamp: Utc::now(),
        }
    }

    /// The interest catalog. No upstream call.
    pub fn list_interests(&self) -> InterestListing {
        InterestListing {
            success: true,
            categories: self.catalog.categories().to_vec(),
            all_tags: self.catalog.all_tags(),
        }
    }

    /// Generate a complete itinerary.
    #[instrument(skip(self, request), fields(request_id))]
    pub async fn generate_itinerary(&self, request: ItineraryRequest) -> Result<ItineraryResponse> {
        metrics::inc_requests(OP_GENERATE);

        let plan = validate_request(&request, &self.catalog, self.settings.max_trip_days)
            .map_err(|e| rejected(OP_GENERATE, e))?;
        let provider = self.provider()?;

        let request_id = new_request_id();
        tracing::Span::current().record("request_id", request_id.as_str());
        info!(
            destination = %plan.destination,
            days = plan.day_count,
            interests = ?plan.interests,
            "Generating itinerary"
        );

        let prompt = generation_prompt(&plan, &self.catalog);
        let reply = self
            .call_with_retry(provider.as_ref(), OP_GENERATE, &prompt, &self.generation_params())
            .await?;

        let response = assemble_generated(&plan, request_id, provider.model(), &reply.text)
            .map_err(|e| upstream_failure(OP_GENERATE, e))?;

        info!(
            days = response.days.len(),
            activities = response.total_activities,
            "Itinerary generated"
        );
        Ok(response)
    }

    /// Validate a request and return its event stream.
    ///
    /// Validation and configuration errors are returned before anything is
    /// streamed. Once streaming, every failure becomes a terminal `error`
    /// event.
    pub fn generate_itinerary_stream(
        &self,
        request: ItineraryRequest,
    ) -> Result<impl Stream<Item = StreamEvent> + Send + 'static> {
        metrics::inc_requests(OP_STREAM);

        let plan = validate_request(&request, &self.catalog, self.settings.max_trip_days)
            .map_err(|e| rejected(OP_STREAM, e))?;
        let provider = self.provider()?;

        let request_id = new_request_id();
        info!(
            request_id = %request_id,
            destination = %plan.destination,
            days = plan.day_count,
            "Streaming itinerary"
        );

        let events = self.stream_events(provider, plan, request_id);

        Ok(stream! {
            let mut lifecycle = StreamLifecycle::new();
            futures::pin_mut!(events);

            while let Some(event) = events.next().await {
                if let Some(event) = lifecycle.advance(event) {
                    metrics::inc_stream_events(event.name());
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        break;
                    }
                }
            }

            if !lifecycle.is_finished() {
                let unexpected = StreamEvent::Error {
                    message: "The itinerary stream ended unexpectedly".to_string(),
                };
                if let Some(event) = lifecycle.advance(unexpected) {
                    metrics::inc_stream_events(event.name());
                    yield event;
                }
            }

            let outcome = match lifecycle.state() {
                StreamState::Completed => "completed",
                _ => "failed",
            };
            metrics::inc_stream_outcomes(outcome);
            debug!(outcome, "Stream finished");
        })
    }

    fn stream_events(
        &self,
        provider: Arc<dyn GenerativeProvider>,
        plan: TripPlan,
        request_id: String,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let prompt = generation_prompt(&plan, &self.catalog);
        let params = self.generation_params();
        let deadline = Instant::now() + self.settings.upstream_timeout;

        stream! {
            yield StreamEvent::Connected {
                message: "Connected to itinerary stream".to_string(),
                request_id: request_id.clone(),
            };
            yield StreamEvent::Progress {
                phase: StreamPhase::Start,
                message: format!("Planning {} days in {}", plan.day_count, plan.destination),
            };

            metrics::inc_upstream_attempts(OP_STREAM);
            let timer = metrics::timer_upstream(OP_STREAM);

            let opened = timeout_at(deadline, provider.generate_stream(&prompt, &params))
                .await
                .unwrap_or(Err(UpstreamError::Timeout));
            let mut upstream = match opened {
                Ok(upstream) => upstream,
                Err(e) => {
                    yield stream_failure(e);
                    return;
                }
            };

            let mut text = String::new();
            loop {
                match timeout_at(deadline, upstream.next()).await {
                    Err(_) => {
                        yield stream_failure(UpstreamError::Timeout);
                        return;
                    }
                    Ok(None) => {
                        yield stream_failure(UpstreamError::Network(
                            "upstream stream ended without completion".to_string(),
                        ));
                        return;
                    }
                    Ok(Some(Err(e))) => {
                        yield stream_failure(e);
                        return;
                    }
                    Ok(Some(Ok(StreamChunk::Text(chunk)))) => {
                        text.push_str(&chunk);
                        yield StreamEvent::Chunk { text: chunk };
                    }
                    Ok(Some(Ok(StreamChunk::Complete { finish_reason }))) => {
                        debug!(
                            ?finish_reason,
                            chars = text.len(),
                            elapsed_ms = timer.elapsed_ms(),
                            "Upstream stream complete"
                        );
                        break;
                    }
                }
            }
            drop(timer);

            yield StreamEvent::Progress {
                phase: StreamPhase::Organize,
                message: "Organizing itinerary".to_string(),
            };

            match assemble_generated(&plan, request_id, provider.model(), &text) {
                Ok(response) => {
                    info!(days = response.days.len(), "Streamed itinerary complete");
                    yield StreamEvent::Complete {
                        message: "Itinerary generated".to_string(),
                        data: Box::new(response),
                    };
                }
                Err(e) => {
                    yield stream_failure(e);
                }
            }
        }
    }

    /// Revise an existing itinerary.
    #[instrument(skip(self, request), fields(request_id))]
    pub async fn edit_itinerary(&self, request: EditRequest) -> Result<ItineraryResponse> {
        metrics::inc_requests(OP_EDIT);

        let plan = validate_edit(&request, &self.catalog).map_err(|e| rejected(OP_EDIT, e))?;
        let provider = self.provider()?;

        let request_id = new_request_id();
        tracing::Span::current().record("request_id", request_id.as_str());
        info!(
            days = plan.current.len(),
            target = ?plan.target,
            "Editing itinerary"
        );

        let prompt = edit_prompt(&plan, &self.catalog);
        let reply = self
            .call_with_retry(provider.as_ref(), OP_EDIT, &prompt, &self.edit_params())
            .await?;

        let response = assemble_edited(&plan, request_id, provider.model(), &reply.text)
            .map_err(|e| upstream_failure(OP_EDIT, e))?;

        info!(
            days = response.days.len(),
            operation = ?response.operation,
            "Itinerary edited"
        );
        Ok(response)
    }

    /// One non-streamed call with the configured attempts and fixed delay.
    /// Only transient failures are retried.
    async fn call_with_retry(
        &self,
        provider: &dyn GenerativeProvider,
        operation: &'static str,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<ProviderReply, UpstreamError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            metrics::inc_upstream_attempts(operation);

            let result = {
                let _timer = metrics::timer_upstream(operation);
                timeout(self.settings.upstream_timeout, provider.generate(prompt, params))
                    .await
                    .unwrap_or(Err(UpstreamError::Timeout))
            };

            match result {
                Ok(reply) => {
                    debug!(
                        attempt,
                        finish_reason = ?reply.finish_reason,
                        input_tokens = reply.input_tokens,
                        output_tokens = reply.output_tokens,
                        "Upstream call succeeded"
                    );
                    return Ok(reply);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "Transient upstream failure, retrying");
                    tokio::time::sleep(self.settings.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(upstream_failure(operation, e)),
            }
        }
    }
}

fn stream_failure(e: UpstreamError) -> StreamEvent {
    error!(error = %e, "Streamed generation failed");
    let e = upstream_failure(OP_STREAM, e);
    StreamEvent::Error {
        message: e.client_message().to_string(),
    }
}

/// Bind parsed model output to a generation request.
fn assemble_generated(
    plan: &TripPlan,
    request_id: String,
    model: &str,
    text: &str,
) -> std::result::Result<ItineraryResponse, UpstreamError> {
    let parsed = parse_itinerary(text, &plan.interests)?;

    if parsed.days.len() != plan.day_count as usize {
        return Err(UpstreamError::Malformed(format!(
            "expected {} days, model returned {}",
            plan.day_count,
            parsed.days.len()
        )));
    }

    let days: Vec<DayPlan> = parsed
        .days
        .into_iter()
        .map(|day| DayPlan {
            date: plan.date_for_day(day.day),
            ..day
        })
        .collect();

    Ok(ItineraryResponse {
        success: true,
        request_id,
        destination: plan.destination.clone(),
        interests: plan.interests.clone(),
        date_range: plan.date_range,
        total_activities: total_activities(&days),
        days,
        model: model.to_string(),
        generated_at: Utc::now(),
        operation: None,
        change_summary: None,
    })
}

/// Bind parsed model output to an edit request.
///
/// Dated itineraries keep their start date; the range end follows the
/// revised day count.
fn assemble_edited(
    plan: &EditPlan,
    request_id: String,
    model: &str,
    text: &str,
) -> std::result::Result<ItineraryResponse, UpstreamError> {
    let parsed = parse_itinerary(text, &plan.interests)?;

    let date_range = plan.date_range.and_then(|range| {
        let extra = u64::try_from(parsed.days.len().saturating_sub(1)).ok()?;
        Some(DateRange {
            start: range.start,
            end: range.start.checked_add_days(Days::new(extra))?,
        })
    });

    let days: Vec<DayPlan> = parsed
        .days
        .into_iter()
        .map(|day| DayPlan {
            date: date_range.and_then(|range| {
                range
                    .start
                    .checked_add_days(Days::new(u64::from(day.day.saturating_sub(1))))
            }),
            ..day
        })
        .collect();

    Ok(ItineraryResponse {
        success: true,
        request_id,
        destination: plan
            .destination
            .clone()
            .unwrap_or_else(|| UNKNOWN_DESTINATION.to_string()),
        interests: plan.interests.clone(),
        date_range,
        total_activities: total_activities(&days),
        days,
        model: model.to_string(),
        generated_at: Utc::now(),
        operation: parsed.operation,
        change_summary: parsed.change_summary,
    })
}
