//! Gemini REST client.
//!
//! Uses `generateContent` for complete replies and
//! `streamGenerateContent?alt=sse` for streamed ones.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{ConfigError, UpstreamError};

use super::{
    FinishReason, GenerationParams, GenerativeProvider, ProviderReply, ProviderStream, StreamChunk,
};

/// Provider error bodies are truncated to this many characters in logs.
const MAX_ERROR_BODY: usize = 512;

/// Gemini text provider.
pub struct GeminiProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.api_key().ok_or(ConfigError::MissingApiKey)?.to_string();

        let base_url = Url::parse(&config.gemini_base_url)
            .map_err(|e| ConfigError::Invalid(format!("GEMINI_BASE_URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(
                "GEMINI_BASE_URL must be a hierarchical URL".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.upstream_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.gemini_model.trim().to_string(),
        })
    }

    /// URL for a model method. Contains the API key; never log it.
    fn endpoint(&self, method: &str, sse: bool) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("models")
                .push(&format!("{}:{}", self.model, method));
        }
        {
            let mut query = url.query_pairs_mut();
            if sse {
                query.append_pair("alt", "sse");
            }
            query.append_pair("key", &self.api_key);
        }
        url
    }

    fn request_body(prompt: &str, params: &GenerationParams) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                    thought: None,
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
                response_mime_type: params.json_output.then(|| "application/json".to_string()),
            }),
        }
    }

    async fn send(&self, url: Url, body: &GenerateContentRequest) -> Result<Response, UpstreamError> {
        let response = self.client.post(url).json(body).send().await?;
        check_status(response).await
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderReply, UpstreamError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending request to Gemini");

        let body = Self::request_body(prompt, params);
        let response = self.send(self.endpoint("generateContent", false), &body).await?;

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::Malformed(format!("undecodable provider response: {}", e.without_url()))
            }
        })?;

        reply_from_response(parsed)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderStream, UpstreamError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Starting streamed request to Gemini");

        let body = Self::request_body(prompt, params);
        let response = self.send(self.endpoint("streamGenerateContent", true), &body).await?;

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::default();
            let mut finish = FinishReason::Stop;

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!("Stream consumer went away, dropping upstream connection");
                        return;
                    }
                    next = bytes.next() => next,
                };

                let (events, done) = match next {
                    Some(Ok(chunk)) => (decoder.push(&chunk), false),
                    Some(Err(e)) => {
                        let _ = tx.send(Err(UpstreamError::from(e))).await;
                        return;
                    }
                    None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
                };

                for data in events {
                    match decode_event(&data, &mut finish) {
                        Ok(Some(text)) => {
                            if tx.send(Ok(StreamChunk::Text(text))).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }

                if done {
                    break;
                }
            }

            let _ = tx
                .send(Ok(StreamChunk::Complete {
                    finish_reason: finish,
                }))
                .await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

async fn check_status(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    warn!(status = status.as_u16(), "Gemini returned an error status");

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(UpstreamError::RateLimited);
    }

    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

fn candidate_text(candidate: &Candidate) -> String {
    candidate
        .content
        .as_ref()
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|p| !p.thought.unwrap_or(false))
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn is_blocked(response: &GenerateContentResponse) -> bool {
    response
        .prompt_feedback
        .as_ref()
        .is_some_and(|f| f.block_reason.is_some())
}

fn reply_from_response(response: GenerateContentResponse) -> Result<ProviderReply, UpstreamError> {
    if is_blocked(&response) {
        return Err(UpstreamError::ContentFiltered);
    }

    let candidate = response.candidates.first().ok_or(UpstreamError::Empty)?;
    let finish_reason = candidate
        .finish_reason
        .as_deref()
        .map(FinishReason::from_gemini)
        .unwrap_or(FinishReason::Stop);

    if finish_reason == FinishReason::ContentFilter {
        return Err(UpstreamError::ContentFiltered);
    }

    let text = candidate_text(candidate);
    if text.trim().is_empty() {
        return Err(UpstreamError::Empty);
    }

    let usage = response.usage_metadata.unwrap_or_default();
    Ok(ProviderReply {
        text,
        finish_reason,
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
    })
}

/// Decode one SSE data payload into a text fragment.
fn decode_event(data: &str, finish: &mut FinishReason) -> Result<Option<String>, UpstreamError> {
    let response: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| UpstreamError::Malformed(format!("undecodable stream event: {e}")))?;

    if is_blocked(&response) {
        return Err(UpstreamError::ContentFiltered);
    }

    let Some(candidate) = response.candidates.first() else {
        return Ok(None);
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        *finish = FinishReason::from_gemini(reason);
        if *finish == FinishReason::ContentFilter {
            return Err(UpstreamError::ContentFiltered);
        }
    }

    let text = candidate_text(candidate);
    Ok((!text.is_empty()).then_some(text))
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Returns the joined `data:` lines of each complete event. Chunk
/// boundaries may fall anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = event_data(&String::from_utf8_lossy(&raw)) {
                events.push(data);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        event_data(&String::from_utf8_lossy(&raw))
    }
}

fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if lines.is_empty() {
        return None;
    }

    let data = lines.join("\n");
    (!data.trim().is_empty()).then_some(data)
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}
