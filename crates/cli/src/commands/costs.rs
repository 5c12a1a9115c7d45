use std::path::Path;

use serde_json::json;
use valuequote_core::cpq::aggregate_costs;
use valuequote_core::domain::project::ProjectData;

use crate::commands::{read_json, CommandResult};

pub fn run(project_path: &Path) -> CommandResult {
    let project: ProjectData = match read_json(project_path) {
        Ok(project) => project,
        Err(error) => {
            return CommandResult::failure("costs", "invalid_input", format!("{error:#}"), 4);
        }
    };

    let issues = project.validation_issues();
    if !issues.is_empty() {
        return CommandResult::failure(
            "costs",
            "invalid_input",
            format!("project is invalid: {}", issues.join("; ")),
            4,
        );
    }

    let costs = aggregate_costs(&project.tools);
    let floor = costs.floor();
    CommandResult::success_with_data(
        "costs",
        format!("aggregated {} tool(s)", project.tools.len()),
        Some(json!({
            "costs": costs,
            "floor": floor,
        })),
    )
}
