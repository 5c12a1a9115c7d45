pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use valuequote_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "valuequote",
    about = "ValueQuote operator CLI",
    long_about = "Produce value-based quotes, analyze client counter-offers, chat with the pricing advisor, and render proposal documents.",
    after_help = "Examples:\n  valuequote costs --project project.json\n  valuequote negotiate --project project.json --counter-implementation 30000 --counter-recurring 900 --details details.json\n  valuequote chat --project project.json --message \"Why is the setup fee so high?\"\n  valuequote config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a valuequote.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the configured log level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override the generation provider (gemini|openai|ollama)")]
    provider: Option<LlmProvider>,
    #[arg(long, global = true, help = "Override the generation model")]
    model: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Aggregate the third-party tool costs of a project into the pricing floor")]
    Costs {
        #[arg(long, help = "Project JSON file")]
        project: PathBuf,
    },
    #[command(about = "Quote a project, optionally analyze a counter-offer and render the proposal")]
    Negotiate(NegotiateArgs),
    #[command(about = "Quote a project, then ask the pricing advisor follow-up questions")]
    Chat(ChatArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

/// Where generated answers come from and who is asking.
#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    #[arg(long, help = "Project JSON file")]
    pub project: PathBuf,
    #[arg(long, default_value = "operator@localhost", help = "Email used for usage metering")]
    pub identity: String,
    #[arg(
        long,
        help = "JSON array of recorded generation responses to replay instead of calling the provider"
    )]
    pub replay: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct NegotiateArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(long, requires = "counter_recurring", help = "Client counter-offer implementation fee")]
    pub counter_implementation: Option<Decimal>,
    #[arg(long, requires = "counter_implementation", help = "Client counter-offer monthly fee")]
    pub counter_recurring: Option<Decimal>,
    #[arg(long, help = "Proposal details JSON file (issuer, client, payment terms)")]
    pub details: Option<PathBuf>,
    #[arg(long, default_value = ".", help = "Directory the proposal document is written to")]
    pub output_dir: PathBuf,
    #[arg(long, help = "Render printable HTML even when wkhtmltopdf is available")]
    pub html: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ChatArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(long = "message", required = true, help = "Question for the advisor (repeatable)")]
    pub messages: Vec<String>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: ConfigOverrides {
            log_level: cli.log_level.clone(),
            llm_provider: cli.provider,
            llm_model: cli.model.clone(),
            ..ConfigOverrides::default()
        },
    };

    let result = match AppConfig::load(options.clone()) {
        Ok(config) => {
            init_logging(&config);
            dispatch(cli.command, &config, &options)
        }
        Err(error) => match cli.command {
            Command::Config => commands::config::run(Err(error), &options),
            _ => commands::CommandResult::failure(
                command_name(&cli.command),
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            ),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn dispatch(command: Command, config: &AppConfig, options: &LoadOptions) -> commands::CommandResult {
    match command {
        Command::Costs { project } => commands::costs::run(&project),
        Command::Negotiate(args) => commands::negotiate::run(config, &args),
        Command::Chat(args) => commands::chat::run(config, &args),
        Command::Config => commands::config::run(Ok(config.clone()), options),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Costs { .. } => "costs",
        Command::Negotiate(_) => "negotiate",
        Command::Chat(_) => "chat",
        Command::Config => "config",
    }
}

/// Logs go to stderr; stdout carries the structured command result.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
