//! Unified error types for the itinerary gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Unified error type returned by every gateway operation.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Client input was malformed or incomplete.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The generative AI provider failed or returned unusable content.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Client input errors. Raised before any upstream call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Request body could not be decoded.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Destination is missing or blank.
    #[error("destination is required")]
    MissingDestination,

    /// No interests were supplied.
    #[error("at least one interest is required")]
    NoInterests,

    /// Some interests are not part of the catalog.
    #[error("unknown interests: {}", invalid.join(", "))]
    UnknownInterests {
        /// The rejected interest strings.
        invalid: Vec<String>,
    },

    /// Neither a date range nor a number of days was given.
    #[error("either start_date and end_date or days is required")]
    MissingTripLength,

    /// Only one end of the date range was given.
    #[error("start_date and end_date must be given together")]
    IncompleteDateRange,

    /// A date could not be parsed as YYYY-MM-DD.
    #[error("{field} is not a valid YYYY-MM-DD date: {value}")]
    InvalidDate {
        /// Name of the offending field.
        field: &'static str,
        /// The raw value.
        value: String,
    },

    /// The range ends before it starts.
    #[error("end_date must not be before start_date")]
    EndBeforeStart,

    /// Zero-day trip.
    #[error("days must be at least 1")]
    ZeroDays,

    /// Trip exceeds the configured maximum.
    #[error("trip of {days} days exceeds the maximum of {max}")]
    TripTooLong {
        /// Requested length.
        days: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Explicit day count disagrees with the date range.
    #[error("days ({days}) does not match the date range ({range_days} days)")]
    DaysMismatch {
        /// Explicit day count.
        days: u32,
        /// Length derived from the dates.
        range_days: u32,
    },

    /// Edit instruction is missing or blank.
    #[error("an edit instruction is required")]
    MissingInstruction,

    /// The itinerary to edit has no days.
    #[error("itinerary to edit must contain at least one day")]
    EmptyItinerary,

    /// Referenced day does not exist.
    #[error("day {day} is out of range (itinerary has {total} days)")]
    DayOutOfRange {
        /// Requested day (1-based).
        day: u32,
        /// Number of days in the itinerary.
        total: usize,
    },

    /// An activity index was given without a day.
    #[error("activity requires day to be set")]
    ActivityWithoutDay,

    /// Referenced activity does not exist.
    #[error("activity {activity} is out of range for day {day} ({total} activities)")]
    ActivityOutOfRange {
        /// Requested activity index (0-based).
        activity: usize,
        /// Day the index refers to.
        day: u32,
        /// Number of activities on that day.
        total: usize,
    },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The provider credential is absent.
    #[error("GOOGLE_API_KEY is required")]
    MissingApiKey,

    /// Environment could not be deserialized.
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    /// A value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures of the generative AI provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded the configured timeout.
    #[error("upstream call timed out")]
    Timeout,

    /// Provider returned 429.
    #[error("rate limited by provider")]
    RateLimited,

    /// Provider returned a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for server-side logs only.
        body: String,
    },

    /// Provider blocked the content.
    #[error("content filtered by provider")]
    ContentFiltered,

    /// Provider returned no text.
    #[error("provider returned an empty response")]
    Empty,

    /// Provider text does not match the itinerary contract.
    #[error("malformed provider output: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Whether a repeated attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Network(_) | UpstreamError::Timeout | UpstreamError::RateLimited => true,
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::ContentFiltered | UpstreamError::Empty | UpstreamError::Malformed(_) => {
                false
            }
        }
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Network(_) => "network",
            UpstreamError::Timeout => "timeout",
            UpstreamError::RateLimited => "rate_limited",
            UpstreamError::Status { .. } => "status",
            UpstreamError::ContentFiltered => "content_filtered",
            UpstreamError::Empty => "empty",
            UpstreamError::Malformed(_) => "malformed",
        }
    }

    /// Message that is safe to show to clients. Never contains provider text.
    pub fn client_message(&self) -> &'static str {
        match self {
            UpstreamError::Timeout => "The itinerary service took too long to respond",
            UpstreamError::RateLimited => "The itinerary service is busy, please try again shortly",
            UpstreamError::ContentFiltered => "The request was declined by the itinerary service",
            UpstreamError::Empty | UpstreamError::Malformed(_) => {
                "The itinerary service returned an invalid itinerary"
            }
            UpstreamError::Network(_) | UpstreamError::Status { .. } => {
                "The itinerary service is temporarily unavailable"
            }
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else {
            // Request URLs carry the API key.
            UpstreamError::Network(e.without_url().to_string())
        }
    }
}

impl GatewayError {
    /// Short machine-readable kind used in the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation_error",
            GatewayError::Config(_) => "configuration_error",
            GatewayError::Upstream(_) => "upstream_error",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(UpstreamError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to return to clients.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Validation(e) => e.to_string(),
            GatewayError::Config(_) => "The service is not configured correctly".to_string(),
            GatewayError::Upstream(e) => e.client_message().to_string(),
        }
    }

    /// Log the full detail server-side.
    pub fn log(&self) {
        match self {
            GatewayError::Validation(e) => warn!(error = %e, "Rejected request"),
            GatewayError::Config(e) => error!(error = %e, "Configuration error"),
            GatewayError::Upstream(e) => error!(error = %e, "Upstream call failed"),
        }
    }
}

/// Error envelope returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always false.
    pub success: bool,
    /// Error kind: validation_error, configuration_error or upstream_error.
    pub error: String,
    /// Client-safe description.
    pub message: String,
}

impl From<&GatewayError> for ErrorResponse {
    fn from(e: &GatewayError) -> Self {
        Self {
            success: false,
            error: e.kind().to_string(),
            message: e.client_message(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.log();
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, GatewayError>;
