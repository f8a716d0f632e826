//! Streaming multi-provider AI client for code generation.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;

use super::decoder::{SseDecoder, StreamFrame};
use crate::config::{AiConfig, ProviderKind};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on one streamed generation.
const STREAM_TIMEOUT: Duration = Duration::from_secs(600);

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Incremental model output, already decoded to text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AiError>> + Send>>;

/// Build an HTTP client with proper timeout configuration.
fn build_http_client() -> Result<Client, AiError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(STREAM_TIMEOUT)
        .build()
        .map_err(|e| AiError::RequestFailed(format!("Failed to build HTTP client: {e}")))
}

/// Determine if a request should be retried based on status code and attempt count.
fn should_retry(status_code: u16, attempt: u32) -> bool {
    if attempt >= MAX_RETRIES {
        return false;
    }
    // Retry on 5xx server errors
    (500..600).contains(&status_code)
}

/// Calculate exponential backoff duration for retry attempts.
fn calculate_backoff(attempt: u32) -> Duration {
    // Exponential backoff: 1s, 2s, 4s
    Duration::from_secs(1 << attempt)
}

/// Errors from AI client operations.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("API key not configured (env: {0})")]
    MissingApiKey(String),
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("Provider reported an error: {0}")]
    Upstream(String),
    #[error("AI request timed out")]
    Timeout,
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::RequestFailed(e.to_string())
        }
    }
}

/// Trait for streaming AI providers.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Start a generation and return its text stream.
    ///
    /// Resolves once the provider has accepted the request; the stream then
    /// yields text fragments until the provider signals the end.
    async fn stream(&self, system: &str, user: &str) -> Result<TextStream, AiError>;
}

/// Send a request, retrying transient server errors.
async fn send_with_retry(request: impl Fn() -> RequestBuilder) -> Result<Response, AiError> {
    let mut attempt = 0;
    loop {
        let response = request().send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        if should_retry(status_code, attempt) {
            let backoff = calculate_backoff(attempt);
            tracing::warn!(status = status_code, attempt, "Retrying AI request");
            tokio::time::sleep(backoff).await;
            attempt += 1;
            continue;
        }

        let text = response.text().await.unwrap_or_default();
        return Err(AiError::RequestFailed(format!("HTTP {status}: {text}")));
    }
}

/// Turn an SSE body into a text stream.
///
/// The stream ends at the provider's terminal frame or at end of body,
/// whichever comes first. A transport error or provider error frame is
/// yielded once as `Err` and ends the stream.
fn decode_sse<S, B, E>(body: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<AiError> + Send + 'static,
{
    let state = (
        Box::pin(body),
        SseDecoder::new(),
        VecDeque::<Result<String, AiError>>::new(),
        false,
    );

    Box::pin(futures_util::stream::unfold(
        state,
        |(mut body, mut decoder, mut queue, mut done)| async move {
            loop {
                if let Some(item) = queue.pop_front() {
                    return Some((item, (body, decoder, queue, done)));
                }
                if done {
                    return None;
                }
                let frames = match body.next().await {
                    Some(Ok(chunk)) => decoder.feed(chunk.as_ref()),
                    Some(Err(e)) => {
                        done = true;
                        queue.push_back(Err(e.into()));
                        continue;
                    }
                    None => {
                        done = true;
                        decoder.finish()
                    }
                };
                done |= enqueue_frames(frames, &mut queue);
            }
        },
    ))
}

/// Queue decoded frames, returning true once a terminal frame is seen.
fn enqueue_frames(frames: Vec<StreamFrame>, queue: &mut VecDeque<Result<String, AiError>>) -> bool {
    for frame in frames {
        match frame {
            StreamFrame::Text(text) => queue.push_back(Ok(text)),
            StreamFrame::Done => return true,
            StreamFrame::Error(message) => {
                queue.push_back(Err(AiError::Upstream(message)));
                return true;
            }
        }
    }
    false
}

/// Gemini API provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// # Errors
    ///
    /// Returns `AiError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, AiError> {
        Ok(Self {
            client: build_http_client()?,
            base_url,
            api_key,
            model,
            max_tokens,
        })
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn stream(&self, system: &str, user: &str) -> Result<TextStream, AiError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": user }]
            }],
            "systemInstruction": {
                "parts": [{ "text": system }]
            },
            "generationConfig": {
                "maxOutputTokens": self.max_tokens
            }
        });

        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        tracing::debug!(model = %self.model, "Gemini stream opened");
        Ok(decode_sse(response.bytes_stream()))
    }
}

/// Claude API provider.
#[derive(Debug, Clone)]
pub struct ClaudeProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeProvider {
    /// Create a new Claude provider.
    ///
    /// # Errors
    ///
    /// Returns `AiError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, AiError> {
        Ok(Self {
            client: build_http_client()?,
            base_url,
            api_key,
            model,
            max_tokens,
        })
    }
}

#[async_trait]
impl AiProvider for ClaudeProvider {
    async fn stream(&self, system: &str, user: &str) -> Result<TextStream, AiError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "stream": true,
            "messages": [{
                "role": "user",
                "content": user
            }]
        });

        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        tracing::debug!(model = %self.model, "Claude stream opened");
        Ok(decode_sse(response.bytes_stream()))
    }
}

/// Provider enum for dispatch.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(GeminiProvider),
    Claude(ClaudeProvider),
}

#[async_trait]
impl AiProvider for Provider {
    async fn stream(&self, system: &str, user: &str) -> Result<TextStream, AiError> {
        match self {
            Self::Gemini(p) => p.stream(system, user).await,
            Self::Claude(p) => p.stream(system, user).await,
        }
    }
}

/// Client for streaming code generations.
#[derive(Debug, Clone)]
pub struct AiClient {
    provider: Provider,
    config: AiConfig,
}

impl AiClient {
    /// Create a new client with the given provider and config.
    #[must_use]
    pub fn new(provider: Provider, config: AiConfig) -> Self {
        Self { provider, config }
    }

    /// Create client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AiError::MissingApiKey` if the configured API key environment
    /// variable is not set.
    pub fn from_config(config: AiConfig) -> Result<Self, AiError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| AiError::MissingApiKey(config.api_key_env.clone()))?;

        let provider = match config.provider {
            ProviderKind::Gemini => Provider::Gemini(GeminiProvider::new(
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                config.max_tokens,
            )?),
            ProviderKind::Claude => Provider::Claude(ClaudeProvider::new(
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                config.max_tokens,
            )?),
        };

        Ok(Self { provider, config })
    }

    /// Get the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the provider kind.
    #[must_use]
    pub fn provider_kind(&self) -> &ProviderKind {
        &self.config.provider
    }
}

#[async_trait]
impl AiProvider for AiClient {
    async fn stream(&self, system: &str, user: &str) -> Result<TextStream, AiError> {
        self.provider.stream(system, user).await
    }
}
