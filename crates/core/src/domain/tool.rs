use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    OneTime,
    Monthly,
}

impl CostType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::Monthly => "monthly",
        }
    }
}

/// A third-party tool or service whose cost the quote must pass through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: ToolId,
    pub name: String,
    pub cost: Decimal,
    pub cost_type: CostType,
}

impl Tool {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cost: Decimal,
        cost_type: CostType,
    ) -> Self {
        Self { id: ToolId(id.into()), name: name.into(), cost, cost_type }
    }
}
