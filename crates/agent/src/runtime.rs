use std::sync::Arc;

use tracing::info;
use valuequote_core::access::{QuotaUsageGate, UsageGate};
use valuequote_core::audit::{AuditSink, InMemoryAuditSink};
use valuequote_core::config::AppConfig;
use valuequote_core::domain::identity::Identity;
use valuequote_core::flows::{NegotiationSession, SessionSettings};
use valuequote_core::generation::GenerationClient;

use crate::llm::{ClientBuildError, HttpGenerationClient};

/// Shared collaborators from which negotiation sessions are opened.
pub struct NegotiationRuntime {
    settings: SessionSettings,
    client: Arc<dyn GenerationClient>,
    usage: Arc<dyn UsageGate>,
    audit: Arc<InMemoryAuditSink>,
}

impl NegotiationRuntime {
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientBuildError> {
        let client = HttpGenerationClient::from_config(&config.llm)?;
        info!(
            event_name = "runtime.generation_client.ready",
            provider = client.provider().as_str(),
            model = client.model(),
            "generation client configured"
        );
        Ok(Self::with_client(config, Arc::new(client)))
    }

    pub fn with_client(config: &AppConfig, client: Arc<dyn GenerationClient>) -> Self {
        Self {
            settings: SessionSettings::from_config(config),
            client,
            usage: Arc::new(QuotaUsageGate::new(
                config.usage.free_quotes,
                config.usage.whitelist.iter(),
            )),
            audit: Arc::new(InMemoryAuditSink::default()),
        }
    }

    pub fn with_usage_gate(mut self, usage: Arc<dyn UsageGate>) -> Self {
        self.usage = usage;
        self
    }

    pub fn open_session(&self, identity: Identity) -> NegotiationSession {
        let audit: Arc<dyn AuditSink> = self.audit.clone();
        NegotiationSession::new(
            identity,
            self.settings.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.usage),
            audit,
        )
    }

    pub fn audit_log(&self) -> &InMemoryAuditSink {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use serde_json::json;
    use valuequote_core::config::AppConfig;
    use valuequote_core::domain::identity::Identity;
    use valuequote_core::domain::project::ProjectData;
    use valuequote_core::errors::NegotiationError;
    use valuequote_core::generation::ScriptedGenerationClient;

    use super::NegotiationRuntime;

    fn project() -> ProjectData {
        serde_json::from_value(json!({
            "client_value": "Automate onboarding",
            "client_size": "small_business",
            "duration_hours": 120,
            "complexity": "medium",
            "urgency": "normal",
            "integration_needs": "simple",
            "security_level": "standard",
            "team_size": 2,
            "team_seniority": "mid_senior",
            "support_level": "basic",
            "desired_margin_pct": 35,
            "annual_revenue": "R$ 5M",
            "process_to_optimize": "Customer onboarding",
            "hours_per_month": 80,
            "people_involved": 2,
            "estimated_monthly_loss": 12000,
            "tools": [
                {"id": "crm", "name": "CRM seats", "cost": 300, "cost_type": "monthly"}
            ]
        }))
        .expect("project fixture")
    }

    #[tokio::test]
    async fn sessions_share_the_configured_allowance() {
        let client = ScriptedGenerationClient::default();
        client
            .push_structured(json!({"implementationFee": 20000, "recurringFee": 1800, "reasoning": "ROI"}));
        let runtime = NegotiationRuntime::with_client(&AppConfig::default(), Arc::new(client));
        let identity = Identity::new("founder@example.com");

        let first = runtime.open_session(identity.clone());
        let quote = first.submit_project(project()).await.expect("first quote is free");
        assert_eq!(quote.recurring_fee, Decimal::from(1_800));

        let second = runtime.open_session(identity);
        let error = second.submit_project(project()).await.expect_err("allowance used");
        assert!(matches!(error, NegotiationError::AccessDenied { .. }));
        assert!(!runtime.audit_log().events().is_empty());
    }
}
