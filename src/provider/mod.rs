//! Generative AI provider abstraction.
//!
//! The gateway talks to a [`GenerativeProvider`] trait object so the Gemini
//! client can be swapped for [`stub::StubProvider`] in tests.

pub mod gemini;
pub mod stub;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::UpstreamError;

pub use gemini::GeminiProvider;
pub use stub::{StubProvider, StubReply};

/// Sampling parameters for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token cap.
    pub max_output_tokens: Option<u32>,
    /// Ask the provider for a JSON response body.
    pub json_output: bool,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Normal completion.
    Stop,
    /// Output token cap reached.
    Length,
    /// Blocked by safety filters.
    ContentFilter,
    /// Anything else the provider reported.
    Other,
}

impl FinishReason {
    /// Map a Gemini finish reason string.
    pub fn from_gemini(reason: &str) -> Self {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

/// Item of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text fragment, in order.
    Text(String),
    /// End of the stream.
    Complete {
        /// Last reported finish reason.
        finish_reason: FinishReason,
    },
}

/// Complete response of a non-streamed call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// Concatenated text of the first candidate.
    pub text: String,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Prompt tokens, when reported.
    pub input_tokens: u32,
    /// Output tokens, when reported.
    pub output_tokens: u32,
}

/// Stream of chunks from a provider.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, UpstreamError>> + Send>>;

/// A text generation backend.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Model identifier reported in responses.
    fn model(&self) -> &str;

    /// Generate a complete response.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderReply, UpstreamError>;

    /// Generate a streamed response.
    ///
    /// The stream ends with [`StreamChunk::Complete`] unless an error item
    /// is yielded first.
    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderStream, UpstreamError>;
}
