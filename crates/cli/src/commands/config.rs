use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use valuequote_core::config::{AppConfig, ConfigError, LoadOptions};

use crate::commands::CommandResult;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    overridden: bool,
}

pub fn run(loaded: Result<AppConfig, ConfigError>, options: &LoadOptions) -> CommandResult {
    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = options.config_path.clone().or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let fields = [
        Field {
            key: "llm.provider",
            value: config.llm.provider.as_str().to_string(),
            env_keys: &["VALUEQUOTE_LLM_PROVIDER"],
            overridden: overrides.llm_provider.is_some(),
        },
        Field {
            key: "llm.model",
            value: config.llm.resolved_model().to_string(),
            env_keys: &["VALUEQUOTE_LLM_MODEL"],
            overridden: overrides.llm_model.is_some(),
        },
        Field {
            key: "llm.base_url",
            value: config.llm.resolved_base_url().to_string(),
            env_keys: &["VALUEQUOTE_LLM_BASE_URL"],
            overridden: overrides.llm_base_url.is_some(),
        },
        Field {
            key: "llm.api_key",
            value: config
                .llm
                .api_key
                .as_ref()
                .map(|key| redact_key(key.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["VALUEQUOTE_LLM_API_KEY"],
            overridden: false,
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["VALUEQUOTE_LLM_TIMEOUT_SECS"],
            overridden: false,
        },
        Field {
            key: "llm.max_retries",
            value: config.llm.max_retries.to_string(),
            env_keys: &["VALUEQUOTE_LLM_MAX_RETRIES"],
            overridden: false,
        },
        Field {
            key: "llm.invariant_retries",
            value: config.llm.invariant_retries.to_string(),
            env_keys: &["VALUEQUOTE_LLM_INVARIANT_RETRIES"],
            overridden: false,
        },
        Field {
            key: "proposal.currency",
            value: config.proposal.currency.clone(),
            env_keys: &["VALUEQUOTE_PROPOSAL_CURRENCY"],
            overridden: overrides.currency.is_some(),
        },
        Field {
            key: "proposal.validity_days",
            value: config.proposal.validity_days.to_string(),
            env_keys: &["VALUEQUOTE_PROPOSAL_VALIDITY_DAYS"],
            overridden: false,
        },
        Field {
            key: "proposal.payment_terms",
            value: config.proposal.payment_terms.clone(),
            env_keys: &["VALUEQUOTE_PROPOSAL_PAYMENT_TERMS"],
            overridden: false,
        },
        Field {
            key: "usage.free_quotes",
            value: config.usage.free_quotes.to_string(),
            env_keys: &["VALUEQUOTE_USAGE_FREE_QUOTES"],
            overridden: overrides.free_quotes.is_some(),
        },
        Field {
            key: "usage.whitelist",
            value: format!("{} entr(ies)", config.usage.whitelist.len()),
            env_keys: &["VALUEQUOTE_USAGE_WHITELIST"],
            overridden: false,
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["VALUEQUOTE_LOGGING_LEVEL", "VALUEQUOTE_LOG_LEVEL"],
            overridden: overrides.log_level.is_some(),
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["VALUEQUOTE_LOGGING_FORMAT", "VALUEQUOTE_LOG_FORMAT"],
            overridden: false,
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: cli > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path() -> Option<PathBuf> {
    ["valuequote.toml", "config/valuequote.toml"].into_iter().map(PathBuf::from).find(|p| p.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "cli".to_string();
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
