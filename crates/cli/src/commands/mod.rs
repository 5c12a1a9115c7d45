pub mod chat;
pub mod config;
pub mod costs;
pub mod negotiate;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use valuequote_agent::runtime::NegotiationRuntime;
use valuequote_core::config::AppConfig;
use valuequote_core::domain::identity::Identity;
use valuequote_core::errors::NegotiationError;
use valuequote_core::flows::NegotiationSession;
use valuequote_core::generation::{GenerationClient, ScriptedGenerationClient};

use crate::SessionArgs;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps a session error onto the interface taxonomy, keeping the detail for operators.
    pub fn negotiation_failure(
        command: &str,
        error: NegotiationError,
        correlation_id: &str,
    ) -> Self {
        let detail = error.to_string();
        let interface = error.into_interface(correlation_id);
        let retry = if interface.retry_allowed() { " (retry allowed)" } else { "" };
        Self::failure(
            command,
            interface.error_class(),
            format!(
                "{}{retry} [{}] {detail}",
                interface.user_message(),
                interface.correlation_id()
            ),
            6,
        )
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read `{}`", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("could not parse `{}`", path.display()))
}

/// Loads recorded generation responses: strings replay as raw text, anything
/// else as an already-structured payload.
pub(crate) fn load_replay(path: &Path) -> anyhow::Result<ScriptedGenerationClient> {
    let responses: Vec<Value> = read_json(path)?;
    let client = ScriptedGenerationClient::default();
    for response in responses {
        match response {
            Value::String(text) => client.push_text(text),
            other => client.push_structured(other),
        };
    }
    Ok(client)
}

pub(crate) fn current_thread_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Builds the runtime for one CLI invocation and opens a session on it.
/// The id stamped on the failed operation's audit and tracing events, or the
/// session id when no operation got that far.
pub(crate) fn correlation_id(session: &NegotiationSession) -> String {
    session.last_correlation_id().unwrap_or_else(|| session.id().to_string())
}

pub(crate) fn open_session(
    command: &str,
    config: &AppConfig,
    args: &SessionArgs,
) -> Result<(NegotiationRuntime, NegotiationSession), CommandResult> {
    let runtime = match &args.replay {
        Some(path) => {
            let client = load_replay(path).map_err(|error| {
                CommandResult::failure(command, "invalid_input", format!("{error:#}"), 4)
            })?;
            let client: Arc<dyn GenerationClient> = Arc::new(client);
            NegotiationRuntime::with_client(config, client)
        }
        None => NegotiationRuntime::from_config(config).map_err(|error| {
            CommandResult::failure(command, "generation_client", error.to_string(), 5)
        })?,
    };

    let session = runtime.open_session(Identity::new(args.identity.clone()));
    Ok((runtime, session))
}
