use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assembly::{DEFAULT_PAYMENT_TERMS, DEFAULT_VALIDITY_DAYS};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub proposal: ProposalConfig,
    pub usage: UsageConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Reinforced retries after a response breaches the cost floor.
    pub invariant_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ProposalConfig {
    pub currency: String,
    pub validity_days: u32,
    pub payment_terms: String,
}

#[derive(Clone, Debug)]
pub struct UsageConfig {
    pub free_quotes: u32,
    pub whitelist: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::Ollama => "llama3.1",
        }
    }

    fn requires_api_key(&self) -> bool {
        matches!(self, Self::Gemini | Self::OpenAi)
    }
}

impl LlmConfig {
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn resolved_model(&self) -> &str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub currency: Option<String>,
    pub free_quotes: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: None,
                model: None,
                timeout_secs: 60,
                max_retries: 2,
                invariant_retries: 1,
            },
            proposal: ProposalConfig {
                currency: "BRL".to_string(),
                validity_days: DEFAULT_VALIDITY_DAYS,
                payment_terms: DEFAULT_PAYMENT_TERMS.to_string(),
            },
            usage: UsageConfig { free_quotes: 1, whitelist: Vec::new() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("valuequote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = Some(model);
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(invariant_retries) = llm.invariant_retries {
                self.llm.invariant_retries = invariant_retries;
            }
        }

        if let Some(proposal) = patch.proposal {
            if let Some(currency) = proposal.currency {
                self.proposal.currency = currency;
            }
            if let Some(validity_days) = proposal.validity_days {
                self.proposal.validity_days = validity_days;
            }
            if let Some(payment_terms) = proposal.payment_terms {
                self.proposal.payment_terms = payment_terms;
            }
        }

        if let Some(usage) = patch.usage {
            if let Some(free_quotes) = usage.free_quotes {
                self.usage.free_quotes = free_quotes;
            }
            if let Some(whitelist) = usage.whitelist {
                self.usage.whitelist = whitelist;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VALUEQUOTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("VALUEQUOTE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("VALUEQUOTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("VALUEQUOTE_LLM_MODEL") {
            self.llm.model = Some(value);
        }
        if let Some(value) = read_env("VALUEQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("VALUEQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VALUEQUOTE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("VALUEQUOTE_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("VALUEQUOTE_LLM_INVARIANT_RETRIES") {
            self.llm.invariant_retries = parse_u32("VALUEQUOTE_LLM_INVARIANT_RETRIES", &value)?;
        }

        if let Some(value) = read_env("VALUEQUOTE_PROPOSAL_CURRENCY") {
            self.proposal.currency = value;
        }
        if let Some(value) = read_env("VALUEQUOTE_PROPOSAL_VALIDITY_DAYS") {
            self.proposal.validity_days = parse_u32("VALUEQUOTE_PROPOSAL_VALIDITY_DAYS", &value)?;
        }
        if let Some(value) = read_env("VALUEQUOTE_PROPOSAL_PAYMENT_TERMS") {
            self.proposal.payment_terms = value;
        }

        if let Some(value) = read_env("VALUEQUOTE_USAGE_FREE_QUOTES") {
            self.usage.free_quotes = parse_u32("VALUEQUOTE_USAGE_FREE_QUOTES", &value)?;
        }
        if let Some(value) = read_env("VALUEQUOTE_USAGE_WHITELIST") {
            self.usage.whitelist = parse_list(&value);
        }

        let log_level =
            read_env("VALUEQUOTE_LOGGING_LEVEL").or_else(|| read_env("VALUEQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VALUEQUOTE_LOGGING_FORMAT").or_else(|| read_env("VALUEQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = Some(llm_model);
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(currency) = overrides.currency {
            self.proposal.currency = currency;
        }
        if let Some(free_quotes) = overrides.free_quotes {
            self.usage.free_quotes = free_quotes;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_proposal(&self.proposal)?;
        validate_usage(&self.usage)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("valuequote.toml"), PathBuf::from("config/valuequote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 5 {
        return Err(ConfigError::Validation(
            "llm.max_retries must be in range 0..=5".to_string(),
        ));
    }

    if llm.invariant_retries > 3 {
        return Err(ConfigError::Validation(
            "llm.invariant_retries must be in range 0..=3".to_string(),
        ));
    }

    if llm.provider.requires_api_key() {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(format!(
                "llm.api_key is required for the {} provider (set VALUEQUOTE_LLM_API_KEY)",
                llm.provider.as_str()
            )));
        }
    }

    let base_url = llm.resolved_base_url();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_proposal(proposal: &ProposalConfig) -> Result<(), ConfigError> {
    let currency = proposal.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "proposal.currency must be a three-letter uppercase code such as BRL or USD"
                .to_string(),
        ));
    }

    if proposal.validity_days == 0 || proposal.validity_days > 90 {
        return Err(ConfigError::Validation(
            "proposal.validity_days must be in range 1..=90".to_string(),
        ));
    }

    if proposal.payment_terms.trim().is_empty() {
        return Err(ConfigError::Validation(
            "proposal.payment_terms must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_usage(usage: &UsageConfig) -> Result<(), ConfigError> {
    if let Some(entry) = usage.whitelist.iter().find(|entry| !entry.contains('@')) {
        return Err(ConfigError::Validation(format!(
            "usage.whitelist entries must be email addresses, found `{entry}`"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    proposal: Option<ProposalPatch>,
    usage: Option<UsagePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    invariant_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProposalPatch {
    currency: Option<String>,
    validity_days: Option<u32>,
    payment_terms: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UsagePatch {
    free_quotes: Option<u32>,
    whitelist: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_credentials() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| format!("defaults should validate: {err}"))?;

        ensure(config.llm.provider == LlmProvider::Ollama, "default provider should be ollama")?;
        ensure(
            config.llm.resolved_base_url() == "http://localhost:11434",
            "ollama base url should default to localhost",
        )?;
        ensure(config.llm.invariant_retries == 1, "one reinforced retry by default")?;
        ensure(config.proposal.validity_days == 7, "proposals should be valid for a week")?;
        ensure(config.usage.free_quotes == 1, "one free quote by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_VALUEQUOTE_GEMINI_KEY", "gemini-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("valuequote.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "gemini"
api_key = "${TEST_VALUEQUOTE_GEMINI_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gemini-from-env")
                    == Some(true),
                "api key should be loaded from environment",
            )?;
            ensure(
                config.llm.resolved_model() == "gemini-2.5-flash",
                "gemini should default to its flash model",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_VALUEQUOTE_GEMINI_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("VALUEQUOTE_LOG_LEVEL", "warn");
        env::set_var("VALUEQUOTE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["VALUEQUOTE_LOG_LEVEL", "VALUEQUOTE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("VALUEQUOTE_PROPOSAL_CURRENCY", "EUR");
        env::set_var("VALUEQUOTE_USAGE_WHITELIST", "ops@valuequote.io, founder@example.com");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("valuequote.toml");
            fs::write(
                &path,
                r#"
[proposal]
currency = "USD"
validity_days = 14

[usage]
free_quotes = 3
whitelist = ["file@example.com"]

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    currency: Some("GBP".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.proposal.currency == "GBP", "override currency should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.proposal.validity_days == 14, "file validity should beat default")?;
            ensure(config.usage.free_quotes == 3, "file free quotes should beat default")?;
            ensure(
                config.usage.whitelist
                    == vec!["ops@valuequote.io".to_string(), "founder@example.com".to_string()],
                "env whitelist should win over file",
            )?;
            Ok(())
        })();

        clear_vars(&["VALUEQUOTE_PROPOSAL_CURRENCY", "VALUEQUOTE_USAGE_WHITELIST"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("VALUEQUOTE_LLM_PROVIDER", "gemini");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(&["VALUEQUOTE_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("VALUEQUOTE_PROPOSAL_VALIDITY_DAYS", "a week");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected an invalid override error".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "VALUEQUOTE_PROPOSAL_VALIDITY_DAYS"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["VALUEQUOTE_PROPOSAL_VALIDITY_DAYS"]);
        result
    }

    #[test]
    fn proposal_and_retry_ranges_are_validated() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.proposal.validity_days = 120;
        ensure(
            matches!(config.validate(), Err(ConfigError::Validation(ref message)) if message.contains("validity_days")),
            "validity above 90 days should be rejected",
        )?;

        let mut config = AppConfig::default();
        config.llm.invariant_retries = 4;
        ensure(
            matches!(config.validate(), Err(ConfigError::Validation(ref message)) if message.contains("invariant_retries")),
            "more than three reinforced retries should be rejected",
        )?;

        let mut config = AppConfig::default();
        config.llm.max_retries = u32::MAX;
        ensure(
            matches!(config.validate(), Err(ConfigError::Validation(ref message)) if message.contains("max_retries")),
            "more than five transport retries should be rejected",
        )?;

        let mut config = AppConfig::default();
        config.proposal.currency = "reais".to_string();
        ensure(config.validate().is_err(), "currency must be a three-letter code")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("VALUEQUOTE_LLM_PROVIDER", "openai");
        env::set_var("VALUEQUOTE_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["VALUEQUOTE_LLM_PROVIDER", "VALUEQUOTE_LLM_API_KEY"]);
        result
    }
}
