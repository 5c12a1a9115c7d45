//! HTTP structured-generation client.
//!
//! One client speaks to Gemini, OpenAI-compatible and Ollama endpoints. Every
//! provider answers with text; the text is handed to the core interpreter
//! as-is, so parsing and floor checks stay in one place.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use valuequote_core::config::{LlmConfig, LlmProvider};
use valuequote_core::generation::{
    GenerationClient, GenerationError, GenerationOutput, GenerationRequest,
};

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

/// Exponential backoff before retry `attempt` (1-based), capped.
fn backoff_ms(attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 500 | 502 | 503 | 504)
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("llm.api_key is required for the {0} provider")]
    MissingApiKey(&'static str),
    #[error("could not build http client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct HttpGenerationClient {
    provider: LlmProvider,
    model: String,
    base_url: String,
    api_key: Option<SecretString>,
    max_retries: u32,
    http: Client,
}

impl HttpGenerationClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ClientBuildError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty());
        if api_key.is_none() && config.provider != LlmProvider::Ollama {
            return Err(ClientBuildError::MissingApiKey(config.provider.as_str()));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            provider: config.provider,
            model: config.resolved_model().to_string(),
            base_url: config.resolved_base_url().trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            http,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::Gemini => {
                format!("{}/models/{}:generateContent", self.base_url, self.model)
            }
            LlmProvider::OpenAi => format!("{}/chat/completions", self.base_url),
            LlmProvider::Ollama => format!("{}/api/generate", self.base_url),
        }
    }

    /// Build the provider-specific request body, declaring the response
    /// schema when the request carries one.
    fn request_body(&self, request: &GenerationRequest) -> Value {
        match self.provider {
            LlmProvider::Gemini => {
                let mut body = json!({
                    "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
                });
                if let Some(shape) = &request.shape {
                    body["generationConfig"] = json!({
                        "responseMimeType": "application/json",
                        "responseJsonSchema": shape.schema,
                    });
                }
                body
            }
            LlmProvider::OpenAi => {
                let mut body = json!({
                    "model": self.model,
                    "messages": [{"role": "user", "content": request.prompt}],
                });
                if let Some(shape) = &request.shape {
                    body["response_format"] = json!({
                        "type": "json_schema",
                        "json_schema": {"name": shape.name, "schema": shape.schema, "strict": false},
                    });
                }
                body
            }
            LlmProvider::Ollama => {
                let mut body = json!({
                    "model": self.model,
                    "prompt": request.prompt,
                    "stream": false,
                });
                if let Some(shape) = &request.shape {
                    body["format"] = shape.schema.clone();
                }
                body
            }
        }
    }

    /// Pull the generated text out of a provider response body.
    fn extract_text(&self, body: &Value) -> Result<String, GenerationError> {
        let text = match self.provider {
            LlmProvider::Gemini => body
                .pointer("/candidates/0/content/parts")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts.iter().filter_map(|part| part["text"].as_str()).collect::<String>()
                }),
            LlmProvider::OpenAi => {
                body.pointer("/choices/0/message/content").and_then(Value::as_str).map(str::to_string)
            }
            LlmProvider::Ollama => body["response"].as_str().map(str::to_string),
        };

        text.ok_or_else(|| {
            GenerationError::ServiceError(format!(
                "{} response did not contain generated text",
                self.provider.as_str()
            ))
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.api_key, self.provider) {
            (Some(key), LlmProvider::Gemini) => builder.header("x-goog-api-key", key.expose_secret()),
            (Some(key), _) => builder.bearer_auth(key.expose_secret()),
            (None, _) => builder,
        }
    }

    async fn send_once(&self, url: &str, body: &Value) -> Result<Value, Attempt> {
        let started = Instant::now();
        let response = match self
            .authorize(self.http.post(url))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) if error.is_timeout() => {
                return Err(Attempt::Transient(GenerationError::Timeout {
                    elapsed_ms: elapsed_ms(started),
                }));
            }
            Err(error) => {
                return Err(Attempt::Transient(GenerationError::ServiceError(error.to_string())));
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            return Err(Attempt::Fatal(GenerationError::RateLimited { retry_after_secs }));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = GenerationError::ServiceError(format!("{status}: {}", truncate(&text)));
            return Err(if is_retryable_status(status) {
                Attempt::Transient(error)
            } else {
                Attempt::Fatal(error)
            });
        }

        response.json::<Value>().await.map_err(|error| {
            if error.is_timeout() {
                Attempt::Transient(GenerationError::Timeout { elapsed_ms: elapsed_ms(started) })
            } else {
                Attempt::Fatal(GenerationError::ServiceError(format!(
                    "response body was not JSON: {error}"
                )))
            }
        })
    }
}

enum Attempt {
    Transient(GenerationError),
    Fatal(GenerationError),
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let url = self.endpoint();
        let body = self.request_body(request);
        debug!(
            event_name = "llm.request.start",
            provider = self.provider.as_str(),
            model = %self.model,
            kind = %request.kind,
            structured = request.shape.is_some(),
            "sending generation request"
        );

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let backoff = backoff_ms(attempt);
                warn!(
                    event_name = "llm.request.retry",
                    attempt,
                    backoff_ms = backoff,
                    "retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(&url, &body).await {
                Ok(response) => {
                    let text = self.extract_text(&response)?;
                    debug!(event_name = "llm.request.success", attempt, chars = text.len());
                    return Ok(GenerationOutput::Text(text));
                }
                Err(Attempt::Transient(error)) if attempt < self.max_retries => {
                    debug!(attempt, error = %error, "transient generation failure");
                    attempt += 1;
                }
                Err(Attempt::Transient(error)) | Err(Attempt::Fatal(error)) => {
                    warn!(
                        event_name = "llm.request.failed",
                        provider = self.provider.as_str(),
                        error = %error,
                        "generation request failed"
                    );
                    return Err(error);
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 300;
    match text.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
