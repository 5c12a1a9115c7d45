use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::floor::CostFloor;
use crate::domain::tool::{CostType, Tool};

pub const NO_TOOLS_SUMMARY: &str = "No specific tools listed.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedCosts {
    pub total_one_time: Decimal,
    pub total_monthly: Decimal,
    pub summary: String,
}

impl AggregatedCosts {
    pub fn floor(&self) -> CostFloor {
        CostFloor { implementation: self.total_one_time, recurring: self.total_monthly }
    }
}

/// Partitions tool costs by cost type and renders one summary line per tool,
/// in input order.
pub fn aggregate_costs(tools: &[Tool]) -> AggregatedCosts {
    let mut total_one_time = Decimal::ZERO;
    let mut total_monthly = Decimal::ZERO;

    for tool in tools {
        match tool.cost_type {
            CostType::OneTime => total_one_time += tool.cost,
            CostType::Monthly => total_monthly += tool.cost,
        }
    }

    let summary = if tools.is_empty() {
        NO_TOOLS_SUMMARY.to_string()
    } else {
        tools
            .iter()
            .map(|tool| format!("- {}: {} ({})", tool.name, tool.cost, tool.cost_type.label()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    AggregatedCosts { total_one_time, total_monthly, summary }
}
