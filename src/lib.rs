//! Itinerary gateway.
//!
//! A thin HTTP service that turns travel requests into day-by-day
//! itineraries by prompting Google Gemini, then validates the model output
//! against a fixed JSON contract before returning it.
//!
//! # Flow
//!
//! ```text
//! client JSON --> validate --> prompt --> Gemini --> parse + check --> ItineraryResponse
//!                    |                                   |
//!                   400                              502 / 504
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`interests`]: Interest categories and resolution
//! - [`itinerary`]: Wire types, validation, prompts and output parsing
//! - [`provider`]: Generative AI providers (Gemini, stub)
//! - [`gateway`]: Request orchestration, retries and streaming
//! - [`api`]: HTTP API
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod interests;
pub mod itinerary;
pub mod metrics;
pub mod provider;
pub mod utils;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
