//! Scripted provider for tests and local runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{future, stream, StreamExt};

use crate::error::UpstreamError;

use super::{
    FinishReason, GenerationParams, GenerativeProvider, ProviderReply, ProviderStream, StreamChunk,
};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Full text; streamed as a single chunk.
    Text(String),
    /// Text split into chunks; `generate` returns them joined.
    Chunks(Vec<String>),
    /// Chunks followed by a mid-stream failure.
    ChunksThenError(Vec<String>, UpstreamError),
    /// The call fails before any output.
    Error(UpstreamError),
    /// Chunks, then the stream never finishes. `generate` never returns.
    Stall(Vec<String>),
}

/// Provider that plays back scripted replies in order.
///
/// The last reply repeats once the script is exhausted.
#[derive(Debug)]
pub struct StubProvider {
    model: String,
    replies: Vec<StubReply>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubProvider {
    /// Provider that always gives the same reply.
    pub fn new(reply: StubReply) -> Self {
        Self::sequence(vec![reply])
    }

    /// Provider that gives `replies` in order.
    pub fn sequence(replies: Vec<StubReply>) -> Self {
        Self {
            model: "stub-model".to_string(),
            replies,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Provider that always answers with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(StubReply::Text(text.into()))
    }

    /// Number of upstream calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent prompt.
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }

    fn next_reply(&self, prompt: &str) -> StubReply {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        self.replies
            .get(index)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or(StubReply::Error(UpstreamError::Empty))
    }
}

#[async_trait]
impl GenerativeProvider for StubProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderReply, UpstreamError> {
        let text = match self.next_reply(prompt) {
            StubReply::Text(text) => text,
            StubReply::Chunks(chunks) => chunks.concat(),
            StubReply::ChunksThenError(_, e) | StubReply::Error(e) => return Err(e),
            StubReply::Stall(_) => return future::pending().await,
        };

        Ok(ProviderReply {
            text,
            finish_reason: FinishReason::Stop,
            input_tokens: 0,
            output_tokens: 0,
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderStream, UpstreamError> {
        let complete = Ok(StreamChunk::Complete {
            finish_reason: FinishReason::Stop,
        });

        let items: Vec<Result<StreamChunk, UpstreamError>> = match self.next_reply(prompt) {
            StubReply::Error(e) => return Err(e),
            StubReply::Text(text) => vec![Ok(StreamChunk::Text(text)), complete],
            StubReply::Chunks(chunks) => chunks
                .into_iter()
                .map(|c| Ok(StreamChunk::Text(c)))
                .chain(std::iter::once(complete))
                .collect(),
            StubReply::ChunksThenError(chunks, e) => chunks
                .into_iter()
                .map(|c| Ok(StreamChunk::Text(c)))
                .chain(std::iter::once(Err(e)))
                .collect(),
            StubReply::Stall(chunks) => {
                let sent = chunks.into_iter().map(|c| Ok(StreamChunk::Text(c)));
                return Ok(Box::pin(stream::iter(sent).chain(stream::pending())));
            }
        };

        Ok(Box::pin(tokio_stream::iter(items)))
    }
}

/// A well-formed itinerary document with `days` days, two activities each.
pub fn sample_itinerary(days: u32, interests: &[&str]) -> String {
    let interest = |i: usize| {
        interests
            .get(i % interests.len().max(1))
            .map(|s| serde_json::Value::String(s.to_string()))
            .unwrap_or(serde_json::Value::Null)
    };

    let days: Vec<serde_json::Value> = (1..=days)
        .map(|day| {
            serde_json::json!({
                "day": day,
                "activities": [
                    {
                        "name": format!("Morning visit {day}"),
                        "start_time": "09:00",
                        "end_time": "11:00",
                        "description": "A relaxed start",
                        "location": "City centre",
                        "interest": interest(0),
                    },
                    {
                        "name": format!("Afternoon walk {day}"),
                        "start_time": "14:00",
                        "end_time": "16:00",
                        "description": "Explore the neighborhood",
                        "location": "Old town",
                        "interest": interest(1),
                    }
                ]
            })
        })
        .collect();

    serde_json::json!({ "days": days }).to_string()
}
