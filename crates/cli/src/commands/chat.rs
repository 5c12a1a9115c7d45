use serde_json::json;
use valuequote_core::config::AppConfig;
use valuequote_core::domain::project::ProjectData;
use valuequote_core::errors::NegotiationError;
use valuequote_core::flows::NegotiationSession;

use crate::commands::{correlation_id, current_thread_runtime, open_session, read_json, CommandResult};
use crate::ChatArgs;

const COMMAND: &str = "chat";

pub fn run(config: &AppConfig, args: &ChatArgs) -> CommandResult {
    let project: ProjectData = match read_json(&args.session.project) {
        Ok(project) => project,
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_input", format!("{error:#}"), 4)
        }
    };

    let (_runtime, session) = match open_session(COMMAND, config, &args.session) {
        Ok(opened) => opened,
        Err(result) => return result,
    };
    let executor = match current_thread_runtime(COMMAND) {
        Ok(executor) => executor,
        Err(result) => return result,
    };

    match executor.block_on(converse(&session, project, &args.messages)) {
        Ok(replies) => CommandResult::success_with_data(
            COMMAND,
            format!("advisor answered {replies} message(s)"),
            Some(json!({
                "session_id": session.id(),
                "quote": session.quote(),
                "transcript": session.transcript(),
            })),
        ),
        Err(error) => CommandResult::negotiation_failure(COMMAND, error, &correlation_id(&session)),
    }
}

async fn converse(
    session: &NegotiationSession,
    project: ProjectData,
    messages: &[String],
) -> Result<usize, NegotiationError> {
    session.submit_project(project).await?;
    for message in messages {
        session.send_chat_message(message).await?;
    }
    Ok(messages.len())
}
