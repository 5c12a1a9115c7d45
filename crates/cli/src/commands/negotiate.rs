use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::info;
use valuequote_core::config::AppConfig;
use valuequote_core::domain::project::ProjectData;
use valuequote_core::domain::proposal::ProposalDetails;
use valuequote_core::domain::quote::ClientCounterOffer;
use valuequote_core::errors::NegotiationError;
use valuequote_core::flows::NegotiationSession;
use valuequote_core::render::DocumentRenderer;
use valuequote_render::ProposalRenderer;

use crate::commands::{
    correlation_id, current_thread_runtime, open_session, read_json, CommandResult,
};
use crate::NegotiateArgs;

const COMMAND: &str = "negotiate";

struct WrittenDocument {
    path: PathBuf,
    content_type: &'static str,
}

enum Failure {
    Negotiation(NegotiationError),
    Output(String),
}

impl From<NegotiationError> for Failure {
    fn from(error: NegotiationError) -> Self {
        Self::Negotiation(error)
    }
}

pub fn run(config: &AppConfig, args: &NegotiateArgs) -> CommandResult {
    let project: ProjectData = match read_json(&args.session.project) {
        Ok(project) => project,
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_input", format!("{error:#}"), 4)
        }
    };
    let details: Option<ProposalDetails> = match args.details.as_deref().map(read_json).transpose()
    {
        Ok(details) => details,
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_input", format!("{error:#}"), 4)
        }
    };
    let counter_offer = match (args.counter_implementation, args.counter_recurring) {
        (Some(implementation), Some(recurring)) => {
            Some(ClientCounterOffer { implementation, recurring })
        }
        _ => None,
    };

    let (runtime, session) = match open_session(COMMAND, config, &args.session) {
        Ok(opened) => opened,
        Err(result) => return result,
    };
    let executor = match current_thread_runtime(COMMAND) {
        Ok(executor) => executor,
        Err(result) => return result,
    };

    let outcome = executor.block_on(negotiate(
        &session,
        project,
        counter_offer,
        details.as_ref(),
        args,
    ));

    match outcome {
        Ok(document) => {
            let state = session.state();
            CommandResult::success_with_data(
                COMMAND,
                format!("negotiation reached `{state}`"),
                Some(json!({
                    "session_id": session.id(),
                    "state": state.label(),
                    "costs": session.costs(),
                    "quote": session.quote(),
                    "counter_offer": session.counter_offer(),
                    "analysis": session.analysis(),
                    "resolved_terms": session.resolved_terms(),
                    "document": document.map(|written| json!({
                        "path": written.path.display().to_string(),
                        "content_type": written.content_type,
                    })),
                    "audit_events": runtime.audit_log().event_types(),
                })),
            )
        }
        Err(Failure::Negotiation(error)) => {
            CommandResult::negotiation_failure(COMMAND, error, &correlation_id(&session))
        }
        Err(Failure::Output(message)) => CommandResult::failure(COMMAND, "output", message, 7),
    }
}

async fn negotiate(
    session: &NegotiationSession,
    project: ProjectData,
    counter_offer: Option<ClientCounterOffer>,
    details: Option<&ProposalDetails>,
    args: &NegotiateArgs,
) -> Result<Option<WrittenDocument>, Failure> {
    session.submit_project(project).await?;

    if let Some(offer) = counter_offer {
        session.submit_counter_offer(offer).await?;
        session.resolve()?;
    }

    let Some(details) = details else {
        return Ok(None);
    };

    let document = session.assemble_proposal(details)?;
    let renderer = if args.html { ProposalRenderer::html_only() } else { ProposalRenderer::new() }
        .map_err(NegotiationError::from)?;
    let rendered = renderer.render(&document).await.map_err(NegotiationError::from)?;

    let path = args
        .output_dir
        .join(Path::new(&document.file_name).with_extension(rendered.extension()));
    let content_type = rendered.content_type();
    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .map_err(|error| Failure::Output(format!("{}: {error}", args.output_dir.display())))?;
    tokio::fs::write(&path, rendered.into_bytes())
        .await
        .map_err(|error| Failure::Output(format!("{}: {error}", path.display())))?;

    info!(
        event_name = "cli.proposal.written",
        path = %path.display(),
        content_type,
        "proposal document written"
    );
    Ok(Some(WrittenDocument { path, content_type }))
}
