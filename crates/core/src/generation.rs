use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Quote,
    CounterOfferAnalysis,
    ChatTurn,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quote => "quote",
            Self::CounterOfferAnalysis => "counter-offer analysis",
            Self::ChatTurn => "chat turn",
        })
    }
}

/// Response contract declared to the generation service as a JSON Schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseShape {
    pub name: &'static str,
    pub schema: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub kind: RequestKind,
    pub prompt: String,
    pub shape: Option<ResponseShape>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GenerationOutput {
    Text(String),
    Structured(Value),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("generation service error: {0}")]
    ServiceError(String),
    #[error("generation service rate limited the request")]
    RateLimited { retry_after_secs: Option<u64> },
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::ServiceError(_) => false,
        }
    }
}

/// Capability-based structured generation service.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError>;
}

/// Replays queued responses in order and records every request it receives.
#[derive(Clone, Default)]
pub struct ScriptedGenerationClient {
    responses: Arc<Mutex<VecDeque<Result<GenerationOutput, GenerationError>>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedGenerationClient {
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(Ok(GenerationOutput::Text(text.into())))
    }

    pub fn push_structured(&self, value: Value) -> &Self {
        self.push(Ok(GenerationOutput::Structured(value)))
    }

    pub fn push_failure(&self, error: GenerationError) -> &Self {
        self.push(Err(error))
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, response: Result<GenerationOutput, GenerationError>) -> &Self {
        match self.responses.lock() {
            Ok(mut responses) => responses.push_back(response),
            Err(poisoned) => poisoned.into_inner().push_back(response),
        }
        self
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        let next = match self.responses.lock() {
            Ok(mut responses) => responses.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };

        next.unwrap_or_else(|| {
            Err(GenerationError::ServiceError("no scripted response queued".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        GenerationClient, GenerationError, GenerationOutput, GenerationRequest, RequestKind,
        ScriptedGenerationClient,
    };

    fn chat_request(prompt: &str) -> GenerationRequest {
        GenerationRequest { kind: RequestKind::ChatTurn, prompt: prompt.to_string(), shape: None }
    }

    #[tokio::test]
    async fn scripted_client_replays_in_order_and_records_requests() {
        let client = ScriptedGenerationClient::default();
        client.push_text("first").push_failure(GenerationError::Timeout { elapsed_ms: 30_000 });

        let first = client.generate(&chat_request("one")).await;
        let second = client.generate(&chat_request("two")).await;
        let exhausted = client.generate(&chat_request("three")).await;

        assert_eq!(first, Ok(GenerationOutput::Text("first".to_string())));
        assert_eq!(second, Err(GenerationError::Timeout { elapsed_ms: 30_000 }));
        assert!(matches!(exhausted, Err(GenerationError::ServiceError(_))));
        assert_eq!(client.requests().len(), 3);
        assert_eq!(client.requests()[1].prompt, "two");
    }

    #[test]
    fn only_timeouts_and_rate_limits_are_transient() {
        assert!(GenerationError::RateLimited { retry_after_secs: Some(2) }.is_transient());
        assert!(!GenerationError::ServiceError("bad request".to_string()).is_transient());
    }
}
