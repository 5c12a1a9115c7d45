use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tool::{CostType, Tool};

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientSize {
    Startup,
    SmallBusiness,
    MidMarket,
    Enterprise,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Urgent,
    HardDeadline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationNeeds {
    None,
    Simple,
    Complex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Standard,
    Elevated,
    Maximum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSeniority {
    JuniorMid,
    MidSenior,
    Specialists,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    Basic,
    Extended,
    Premium,
}

impl ClientSize {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Startup => "Startup",
            Self::SmallBusiness => "Small business",
            Self::MidMarket => "Mid-market company",
            Self::Enterprise => "Large enterprise",
        }
    }
}

impl Complexity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very high",
        }
    }
}

impl Urgency {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Urgent => "Urgent",
            Self::HardDeadline => "Hard deadline",
        }
    }
}

impl IntegrationNeeds {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Simple => "Simple (public APIs)",
            Self::Complex => "Complex (legacy systems, ERPs)",
        }
    }
}

impl SecurityLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Elevated => "Elevated (sensitive data)",
            Self::Maximum => "Maximum (finance/healthcare)",
        }
    }
}

impl TeamSeniority {
    pub fn label(&self) -> &'static str {
        match self {
            Self::JuniorMid => "Junior to mid-level",
            Self::MidSenior => "Mid-level to senior",
            Self::Specialists => "Specialists",
        }
    }
}

impl SupportLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Basic => "Basic (business hours)",
            Self::Extended => "Extended (24/5)",
            Self::Premium => "Premium (24/7)",
        }
    }
}

/// Immutable snapshot of every input a negotiation session prices against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectData {
    pub client_value: String,
    pub client_size: ClientSize,
    pub duration_hours: u32,
    pub complexity: Complexity,
    pub urgency: Urgency,
    pub integration_needs: IntegrationNeeds,
    pub security_level: SecurityLevel,
    pub team_size: u32,
    pub team_seniority: TeamSeniority,
    pub support_level: SupportLevel,
    pub desired_margin_pct: Decimal,
    pub annual_revenue: String,
    pub process_to_optimize: String,
    pub hours_per_month: Decimal,
    pub people_involved: u32,
    pub estimated_monthly_loss: Decimal,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl ProjectData {
    /// Caller contract violations that must be fixed before a quote is requested.
    pub fn validation_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.client_value.trim().is_empty() {
            issues.push("client_value must not be empty".to_string());
        }
        if self.team_size == 0 {
            issues.push("team_size must be greater than zero".to_string());
        }
        if self.desired_margin_pct < Decimal::ZERO {
            issues.push("desired_margin_pct must not be negative".to_string());
        }
        if self.hours_per_month < Decimal::ZERO {
            issues.push("hours_per_month must not be negative".to_string());
        }
        if self.estimated_monthly_loss < Decimal::ZERO {
            issues.push("estimated_monthly_loss must not be negative".to_string());
        }

        if self.estimated_monthly_loss.checked_mul(MONTHS_PER_YEAR).is_none() {
            issues.push("estimated_monthly_loss is too large to annualize".to_string());
        }

        let mut seen_ids = BTreeSet::new();
        let mut one_time = Some(Decimal::ZERO);
        let mut monthly = Some(Decimal::ZERO);
        for tool in &self.tools {
            if !seen_ids.insert(&tool.id) {
                issues.push(format!("tool id `{}` is used more than once", tool.id.0));
            }
            if tool.cost < Decimal::ZERO {
                issues.push(format!("tool `{}` has a negative cost", tool.name));
            }
            let total = match tool.cost_type {
                CostType::OneTime => &mut one_time,
                CostType::Monthly => &mut monthly,
            };
            *total = total.and_then(|sum| sum.checked_add(tool.cost));
        }
        if one_time.is_none() {
            issues.push("one-time tool costs overflow when summed".to_string());
        }
        if monthly.is_none() {
            issues.push("monthly tool costs overflow when summed".to_string());
        }

        issues
    }

    /// Only total for projects without validation issues.
    pub fn annual_gain(&self) -> Decimal {
        self.estimated_monthly_loss * MONTHS_PER_YEAR
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::fixtures::project_fixture;
    use crate::domain::tool::{CostType, Tool};

    #[test]
    fn fixture_project_has_no_validation_issues() {
        assert!(project_fixture().validation_issues().is_empty());
    }

    #[test]
    fn duplicate_tool_ids_and_negative_costs_are_reported() {
        let mut project = project_fixture();
        project.team_size = 0;
        project.tools.push(Tool::new("tool-1", "Duplicate", Decimal::from(-5), CostType::Monthly));

        let issues = project.validation_issues();

        assert_eq!(issues.len(), 3);
        assert!(issues.iter().any(|issue| issue.contains("team_size")));
        assert!(issues.iter().any(|issue| issue.contains("`tool-1` is used more than once")));
        assert!(issues.iter().any(|issue| issue.contains("negative cost")));
    }

    #[test]
    fn tool_costs_that_overflow_when_summed_are_reported() {
        let half = Decimal::MAX / Decimal::from(2) + Decimal::ONE;
        let mut project = project_fixture();
        project.tools = vec![
            Tool::new("big-1", "Mainframe", half, CostType::OneTime),
            Tool::new("big-2", "Mainframe mirror", half, CostType::OneTime),
            Tool::new("big-3", "Mainframe support", half, CostType::Monthly),
        ];

        let issues = project.validation_issues();

        assert_eq!(issues, vec!["one-time tool costs overflow when summed".to_string()]);
    }

    #[test]
    fn monthly_loss_too_large_to_annualize_is_reported() {
        let mut project = project_fixture();
        project.estimated_monthly_loss = Decimal::MAX / Decimal::from(6);

        let issues = project.validation_issues();

        assert_eq!(issues, vec!["estimated_monthly_loss is too large to annualize".to_string()]);
    }

    #[test]
    fn annual_gain_is_twelve_months_of_loss() {
        assert_eq!(project_fixture().annual_gain(), Decimal::from(300_000));
    }
}
