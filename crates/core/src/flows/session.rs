//! Negotiation session: the state machine driven by generation calls.
//!
//! Every public operation takes `&self`. A session accepts one operation at a
//! time; a second call while one is in flight fails with `SessionBusy`. The
//! session data is snapshotted when an operation starts and restored if the
//! operation fails or its future is dropped, so a failed or cancelled call
//! never leaves partial state behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use crate::access::UsageGate;
use crate::assembly::ProposalAssembler;
use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::config::AppConfig;
use crate::cpq::{aggregate_costs, AggregatedCosts};
use crate::domain::chat::ChatMessage;
use crate::domain::identity::{Identity, SessionId};
use crate::domain::project::ProjectData;
use crate::domain::proposal::{PricingPath, ProposalDetails, ProposalDocument, ResolvedTerms};
use crate::domain::quote::{AnalysisVerdict, ClientCounterOffer, CounterOfferAnalysis, Quote};
use crate::errors::NegotiationError;
use crate::flows::engine::{FlowEngine, NegotiationFlow};
use crate::flows::states::{FlowContext, NegotiationEvent, NegotiationState, TransitionOutcome};
use crate::generation::{GenerationClient, GenerationOutput, GenerationRequest};
use crate::interpret::ResponseInterpreter;
use crate::prompts::PromptBuilder;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub currency: String,
    pub validity_days: u32,
    pub payment_terms: String,
    pub invariant_retries: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            currency: config.proposal.currency.clone(),
            validity_days: config.proposal.validity_days,
            payment_terms: config.proposal.payment_terms.clone(),
            invariant_retries: config.llm.invariant_retries,
        }
    }
}

#[derive(Clone, Debug)]
struct SessionData {
    state: NegotiationState,
    project: Option<ProjectData>,
    costs: Option<AggregatedCosts>,
    quote: Option<Quote>,
    counter_offer: Option<ClientCounterOffer>,
    analysis: Option<CounterOfferAnalysis>,
    resolved: Option<ResolvedTerms>,
    transcript: Vec<ChatMessage>,
}

impl SessionData {
    fn new(state: NegotiationState) -> Self {
        Self {
            state,
            project: None,
            costs: None,
            quote: None,
            counter_offer: None,
            analysis: None,
            resolved: None,
            transcript: Vec::new(),
        }
    }

    /// Project, costs and quote, present from `QuoteReady` onward.
    fn quoted(&self) -> Option<(ProjectData, AggregatedCosts, Quote)> {
        match (&self.project, &self.costs, &self.quote) {
            (Some(project), Some(costs), Some(quote)) => {
                Some((project.clone(), costs.clone(), quote.clone()))
            }
            _ => None,
        }
    }

    fn document_terms(&self) -> Option<ResolvedTerms> {
        match self.state {
            NegotiationState::QuoteReady => self.quote.as_ref().map(|quote| ResolvedTerms {
                path: PricingPath::OriginalQuote,
                implementation_fee: quote.implementation_fee,
                recurring_fee: quote.recurring_fee,
                reasoning: quote.reasoning.clone(),
            }),
            _ => self.resolved.clone(),
        }
    }
}

pub struct NegotiationSession {
    id: SessionId,
    identity: Identity,
    engine: FlowEngine<NegotiationFlow>,
    prompts: PromptBuilder,
    interpreter: ResponseInterpreter,
    assembler: ProposalAssembler,
    invariant_retries: u32,
    client: Arc<dyn GenerationClient>,
    usage: Arc<dyn UsageGate>,
    audit: Arc<dyn AuditSink>,
    in_flight: AtomicBool,
    data: Mutex<SessionData>,
    last_correlation_id: Mutex<Option<String>>,
}

/// Marks the session busy for one operation and restores the snapshot taken
/// at its start unless the operation commits.
struct InFlight<'a> {
    session: &'a NegotiationSession,
    snapshot: Option<SessionData>,
}

impl InFlight<'_> {
    fn commit(mut self) {
        self.snapshot = None;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.session.with_data(|data| *data = snapshot);
        }
        self.session.in_flight.store(false, Ordering::Release);
    }
}

impl NegotiationSession {
    pub fn new(
        identity: Identity,
        settings: SessionSettings,
        client: Arc<dyn GenerationClient>,
        usage: Arc<dyn UsageGate>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let engine = FlowEngine::new(NegotiationFlow);
        let initial = engine.initial_state();
        Self {
            id: SessionId::generate(),
            identity,
            engine,
            prompts: PromptBuilder::new(settings.currency.clone()),
            interpreter: ResponseInterpreter,
            assembler: ProposalAssembler::new(
                settings.currency,
                settings.validity_days,
                settings.payment_terms,
            ),
            invariant_retries: settings.invariant_retries,
            client,
            usage,
            audit,
            in_flight: AtomicBool::new(false),
            data: Mutex::new(SessionData::new(initial)),
            last_correlation_id: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Correlation id of the most recent operation, as stamped on its audit
    /// and tracing events.
    pub fn last_correlation_id(&self) -> Option<String> {
        match self.last_correlation_id.lock() {
            Ok(id) => id.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn state(&self) -> NegotiationState {
        self.with_data(|data| data.state)
    }

    pub fn costs(&self) -> Option<AggregatedCosts> {
        self.with_data(|data| data.costs.clone())
    }

    pub fn quote(&self) -> Option<Quote> {
        self.with_data(|data| data.quote.clone())
    }

    pub fn counter_offer(&self) -> Option<ClientCounterOffer> {
        self.with_data(|data| data.counter_offer)
    }

    pub fn analysis(&self) -> Option<CounterOfferAnalysis> {
        self.with_data(|data| data.analysis.clone())
    }

    pub fn resolved_terms(&self) -> Option<ResolvedTerms> {
        self.with_data(|data| data.resolved.clone())
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.with_data(|data| data.transcript.clone())
    }

    /// Validates the project, checks the usage gate and requests a quote.
    pub async fn submit_project(&self, project: ProjectData) -> Result<Quote, NegotiationError> {
        let guard = self.begin()?;
        let audit = self.audit_context();
        info!(
            event_name = "negotiation.project.submitted",
            session_id = %self.id,
            correlation_id = %audit.correlation_id,
            tools = project.tools.len(),
            "project submitted for quoting"
        );

        let outcome = self.transition(
            NegotiationEvent::ProjectSubmitted,
            &FlowContext::with_issues(project.validation_issues()),
            &audit,
        )?;

        let allowed = self.usage.check_access(&self.identity).await?;
        if !allowed {
            self.audit.emit(
                audit
                    .event("negotiation.access_denied", AuditCategory::Access, AuditOutcome::Rejected)
                    .with_metadata("identity", self.identity.metering_key()),
            );
            warn!(
                event_name = "negotiation.access.denied",
                session_id = %self.id,
                correlation_id = %audit.correlation_id,
                "quote allowance exhausted"
            );
            return Err(NegotiationError::AccessDenied { identity: self.identity.email.clone() });
        }

        let costs = aggregate_costs(&project.tools);
        let request = self.prompts.quote_request(&project, &costs);
        let quote = self
            .generate_checked(request, &costs, &audit, |output| {
                self.interpreter.interpret_quote(output, &costs)
            })
            .await?;

        if let Err(error) = self.usage.record_usage(&self.identity).await {
            warn!(
                event_name = "negotiation.access.record_failed",
                session_id = %self.id,
                correlation_id = %audit.correlation_id,
                error = %error,
                "quote produced but usage could not be recorded"
            );
        }

        self.with_data(|data| {
            *data = SessionData::new(outcome.to);
            data.project = Some(project);
            data.costs = Some(costs);
            data.quote = Some(quote.clone());
        });
        self.engine.audit_outcome(&Ok(outcome), self.audit.as_ref(), &audit);
        guard.commit();

        info!(
            event_name = "negotiation.quote.ready",
            session_id = %self.id,
            correlation_id = %audit.correlation_id,
            implementation_fee = %quote.implementation_fee,
            recurring_fee = %quote.recurring_fee,
            "value-based quote ready"
        );
        Ok(quote)
    }

    /// Records the client's counter-offer and requests an analysis of it.
    pub async fn submit_counter_offer(
        &self,
        offer: ClientCounterOffer,
    ) -> Result<CounterOfferAnalysis, NegotiationError> {
        let guard = self.begin()?;
        let audit = self.audit_context();

        let submitted = self.transition(
            NegotiationEvent::CounterOfferSubmitted,
            &FlowContext::with_issues(offer.validation_issues()),
            &audit,
        )?;
        let (project, costs, quote) = self.quoted_context(NegotiationEvent::CounterOfferSubmitted)?;
        self.engine.audit_outcome(&Ok(submitted.clone()), self.audit.as_ref(), &audit);
        self.with_data(|data| {
            data.state = submitted.to;
            data.counter_offer = Some(offer);
        });
        info!(
            event_name = "negotiation.counter_offer.submitted",
            session_id = %self.id,
            correlation_id = %audit.correlation_id,
            implementation = %offer.implementation,
            recurring = %offer.recurring,
            "client counter-offer submitted for analysis"
        );

        let request = self.prompts.counter_offer_request(&project, &costs, &quote, &offer);
        let result = self
            .generate_checked(request, &costs, &audit, |output| {
                self.interpreter.interpret_analysis(output, &costs, &offer)
            })
            .await;

        match result {
            Ok(analysis) => {
                let received = self.transition(
                    NegotiationEvent::AnalysisReceived,
                    &FlowContext::default(),
                    &audit,
                )?;
                self.engine.audit_outcome(&Ok(received.clone()), self.audit.as_ref(), &audit);
                self.with_data(|data| {
                    data.state = received.to;
                    data.analysis = Some(analysis.clone());
                });
                guard.commit();

                info!(
                    event_name = "negotiation.analysis.ready",
                    session_id = %self.id,
                    correlation_id = %audit.correlation_id,
                    recommendation = %analysis.recommendation(),
                    "counter-offer analysis ready"
                );
                Ok(analysis)
            }
            Err(error) => {
                if let Ok(failed) = self.transition(
                    NegotiationEvent::AnalysisFailed,
                    &FlowContext::default(),
                    &audit,
                ) {
                    self.engine.audit_outcome(&Ok(failed), self.audit.as_ref(), &audit);
                }
                Err(error)
            }
        }
    }

    /// Applies the analysis recommendation. Returns the final figures, or
    /// `None` when the recommendation was to decline.
    pub fn resolve(&self) -> Result<Option<ResolvedTerms>, NegotiationError> {
        let guard = self.begin()?;
        let audit = self.audit_context();

        let (analysis, quote, offer) =
            self.with_data(|data| (data.analysis.clone(), data.quote.clone(), data.counter_offer));
        let outcome = self.transition(
            NegotiationEvent::ResolutionRequested,
            &FlowContext::with_recommendation(analysis.as_ref().map(|a| a.recommendation())),
            &audit,
        )?;

        let resolved = match (analysis.map(|a| a.verdict), quote, offer) {
            (Some(AnalysisVerdict::Accept), Some(quote), Some(offer)) => Some(ResolvedTerms {
                path: PricingPath::AcceptedCounter,
                implementation_fee: offer.implementation,
                recurring_fee: offer.recurring,
                reasoning: quote.reasoning,
            }),
            (Some(AnalysisVerdict::Counter { new_offer }), Some(quote), _) => Some(ResolvedTerms {
                path: PricingPath::NegotiatedCounter,
                implementation_fee: new_offer.implementation_fee,
                recurring_fee: new_offer.recurring_fee,
                reasoning: quote.reasoning,
            }),
            _ => None,
        };

        self.with_data(|data| {
            data.state = outcome.to;
            data.resolved = resolved.clone();
        });
        self.engine.audit_outcome(&Ok(outcome.clone()), self.audit.as_ref(), &audit);
        guard.commit();

        info!(
            event_name = "negotiation.resolved",
            session_id = %self.id,
            correlation_id = %audit.correlation_id,
            state = %outcome.to,
            "negotiation resolved"
        );
        Ok(resolved)
    }

    /// Sends one chat turn, replaying the full transcript, and returns the
    /// advisor's reply.
    pub async fn send_chat_message(&self, text: &str) -> Result<String, NegotiationError> {
        let guard = self.begin()?;
        let audit = self.audit_context();

        let state = self.state();
        if !state.has_quote() {
            return Err(NegotiationError::InvalidTransition {
                state,
                operation: "send_chat_message".to_owned(),
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(NegotiationError::InvalidInput(vec!["chat message is empty".to_owned()]));
        }

        let (project, costs, quote) = self.with_data(|data| data.quoted()).ok_or_else(|| {
            NegotiationError::InvalidTransition { state, operation: "send_chat_message".to_owned() }
        })?;
        let transcript = self.with_data(|data| {
            data.transcript.push(ChatMessage::user(text));
            data.transcript.clone()
        });

        let request = self.prompts.chat_request(&project, &costs, &quote, &transcript);
        let output = self.call(&request, &audit).await?;
        let reply = self.interpreter.interpret_chat(output)?;

        self.with_data(|data| data.transcript.push(ChatMessage::advisor(reply.clone())));
        guard.commit();

        info!(
            event_name = "negotiation.chat.replied",
            session_id = %self.id,
            correlation_id = %audit.correlation_id,
            turns = transcript.len() + 1,
            "advisor replied"
        );
        Ok(reply)
    }

    pub fn assemble_proposal(
        &self,
        details: &ProposalDetails,
    ) -> Result<ProposalDocument, NegotiationError> {
        let guard = self.begin()?;
        let audit = self.audit_context();

        let (state, terms) = self.with_data(|data| (data.state, data.document_terms()));
        match self.assembler.assemble(state, terms.as_ref(), details) {
            Ok(document) => {
                self.audit.emit(
                    audit
                        .event(
                            "negotiation.proposal_assembled",
                            AuditCategory::Document,
                            AuditOutcome::Success,
                        )
                        .with_metadata("path", format!("{:?}", document.path))
                        .with_metadata("file_name", document.file_name.clone()),
                );
                guard.commit();
                info!(
                    event_name = "negotiation.proposal.assembled",
                    session_id = %self.id,
                    correlation_id = %audit.correlation_id,
                    file_name = %document.file_name,
                    "proposal document assembled"
                );
                Ok(document)
            }
            Err(error) => {
                self.audit.emit(
                    audit
                        .event(
                            "negotiation.proposal_rejected",
                            AuditCategory::Document,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("error", error.to_string()),
                );
                Err(error)
            }
        }
    }

    /// Discards all session data and returns to `Drafting`.
    pub fn restart(&self) -> Result<(), NegotiationError> {
        let guard = self.begin()?;
        let audit = self.audit_context();

        let outcome = self.transition(NegotiationEvent::Restart, &FlowContext::default(), &audit)?;
        self.with_data(|data| *data = SessionData::new(outcome.to));
        self.engine.audit_outcome(&Ok(outcome), self.audit.as_ref(), &audit);
        guard.commit();

        info!(
            event_name = "negotiation.restarted",
            session_id = %self.id,
            correlation_id = %audit.correlation_id,
            "negotiation restarted"
        );
        Ok(())
    }

    fn begin(&self) -> Result<InFlight<'_>, NegotiationError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(event_name = "negotiation.session.busy", session_id = %self.id, "request refused");
            return Err(NegotiationError::SessionBusy);
        }
        let snapshot = self.with_data(|data| data.clone());
        Ok(InFlight { session: self, snapshot: Some(snapshot) })
    }

    /// Checks a transition against the current state. Rejections are audited
    /// here; applied transitions are audited by the caller once committed.
    fn transition(
        &self,
        event: NegotiationEvent,
        context: &FlowContext,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, NegotiationError> {
        let result = self.engine.apply(&self.state(), &event, context);
        if result.is_err() {
            self.engine.audit_outcome(&result, self.audit.as_ref(), audit);
        }
        result.map_err(NegotiationError::from)
    }

    fn quoted_context(
        &self,
        event: NegotiationEvent,
    ) -> Result<(ProjectData, AggregatedCosts, Quote), NegotiationError> {
        self.with_data(|data| data.quoted()).ok_or_else(|| NegotiationError::InvalidTransition {
            state: self.state(),
            operation: event.operation().to_owned(),
        })
    }

    /// Generates and interprets a response, retrying with a reinforced
    /// cost-floor directive while the interpretation breaches the floor.
    async fn generate_checked<T, F>(
        &self,
        request: GenerationRequest,
        costs: &AggregatedCosts,
        audit: &AuditContext,
        interpret: F,
    ) -> Result<T, NegotiationError>
    where
        F: Fn(GenerationOutput) -> Result<T, NegotiationError>,
    {
        let mut attempt = 0;
        let mut current = request.clone();
        loop {
            let output = self.call(&current, audit).await?;
            match interpret(output) {
                Err(NegotiationError::InvariantViolation { kind, detail })
                    if attempt < self.invariant_retries =>
                {
                    attempt += 1;
                    warn!(
                        event_name = "negotiation.generation.floor_breached",
                        session_id = %self.id,
                        correlation_id = %audit.correlation_id,
                        kind = %kind,
                        attempt,
                        detail = %detail,
                        "response breached the cost floor, retrying with reinforced prompt"
                    );
                    current = self.prompts.reinforce_cost_floor(&request, costs);
                }
                Err(error) => {
                    self.audit.emit(
                        audit
                            .event(
                                "negotiation.response_rejected",
                                AuditCategory::Generation,
                                AuditOutcome::Rejected,
                            )
                            .with_metadata("kind", current.kind.to_string())
                            .with_metadata("error", error.to_string()),
                    );
                    return Err(error);
                }
                Ok(value) => return Ok(value),
            }
        }
    }

    async fn call(
        &self,
        request: &GenerationRequest,
        audit: &AuditContext,
    ) -> Result<GenerationOutput, NegotiationError> {
        self.client.generate(request).await.map_err(|error| {
            warn!(
                event_name = "negotiation.generation.failed",
                session_id = %self.id,
                correlation_id = %audit.correlation_id,
                kind = %request.kind,
                transient = error.is_transient(),
                error = %error,
                "generation request failed"
            );
            self.audit.emit(
                audit
                    .event("negotiation.generation_failed", AuditCategory::Generation, AuditOutcome::Failed)
                    .with_metadata("kind", request.kind.to_string())
                    .with_metadata("error", error.to_string()),
            );
            NegotiationError::from(error)
        })
    }

    fn audit_context(&self) -> AuditContext {
        let correlation_id = format!("req-{}", Uuid::new_v4().simple());
        match self.last_correlation_id.lock() {
            Ok(mut last) => *last = Some(correlation_id.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(correlation_id.clone()),
        }
        AuditContext::new(Some(self.id.clone()), correlation_id, self.identity.email.clone())
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut SessionData) -> T) -> T {
        match self.data.lock() {
            Ok(mut data) => f(&mut data),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use super::{NegotiationSession, SessionSettings};
    use crate::access::{QuotaUsageGate, UnlimitedUsageGate, UsageGate};
    use crate::audit::InMemoryAuditSink;
    use crate::domain::chat::Sender;
    use crate::domain::identity::Identity;
    use crate::domain::project::fixtures::project_fixture;
    use crate::domain::proposal::{ClientInfo, IssuerInfo, PricingPath, ProposalDetails};
    use crate::domain::quote::{ClientCounterOffer, Recommendation};
    use crate::errors::NegotiationError;
    use crate::flows::NegotiationState;
    use crate::generation::{
        GenerationClient, GenerationError, GenerationOutput, GenerationRequest, RequestKind,
        ScriptedGenerationClient,
    };

    fn quote_payload() -> Value {
        json!({
            "implementationFee": 45000,
            "recurringFee": 5000,
            "reasoning": "Removes 25k/month of reconciliation losses."
        })
    }

    fn counter_offer() -> ClientCounterOffer {
        ClientCounterOffer { implementation: Decimal::from(40_000), recurring: Decimal::from(4_500) }
    }

    fn analysis_payload(recommendation: &str, new_offer: Option<(u32, u32)>) -> Value {
        let mut payload = json!({
            "analysis": "The client is anchoring low.",
            "recommendation": recommendation,
            "suggestedResponse": "Let's revisit the monthly loss together."
        });
        if let Some((implementation, recurring)) = new_offer {
            payload["newOffer"] = json!({"implementationFee": implementation, "recurringFee": recurring});
        }
        payload
    }

    fn details() -> ProposalDetails {
        ProposalDetails {
            issuer: IssuerInfo {
                company_name: "Northwind Automation".to_owned(),
                email: "hello@northwind.io".to_owned(),
                phone: "+55 11 5555-0100".to_owned(),
                logo_data_uri: None,
            },
            client: ClientInfo {
                company_name: "Acme Retail".to_owned(),
                contact_name: "Dana Souza".to_owned(),
            },
            payment_terms: None,
        }
    }

    struct Harness {
        session: NegotiationSession,
        client: ScriptedGenerationClient,
        audit: InMemoryAuditSink,
    }

    fn harness_with(usage: Arc<dyn UsageGate>, settings: SessionSettings) -> Harness {
        let client = ScriptedGenerationClient::default();
        let audit = InMemoryAuditSink::default();
        let session = NegotiationSession::new(
            Identity::new("founder@example.com"),
            settings,
            Arc::new(client.clone()),
            usage,
            Arc::new(audit.clone()),
        );
        Harness { session, client, audit }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(UnlimitedUsageGate), SessionSettings::default())
    }

    async fn quoted_harness() -> Harness {
        let harness = harness();
        harness.client.push_structured(quote_payload());
        harness.session.submit_project(project_fixture()).await.expect("quote");
        harness
    }

    /// Answers the first request with a quote and never answers again.
    struct StallingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationClient for StallingClient {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationOutput, GenerationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(GenerationOutput::Structured(quote_payload()));
            }
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn submitting_a_project_produces_a_quote() {
        let usage = Arc::new(QuotaUsageGate::new(1, Vec::<String>::new()));
        let harness = harness_with(usage.clone(), SessionSettings::default());
        harness.client.push_structured(quote_payload());

        let quote = harness.session.submit_project(project_fixture()).await.expect("quote");

        assert_eq!(quote.implementation_fee, Decimal::from(45_000));
        assert_eq!(harness.session.state(), NegotiationState::QuoteReady);
        let costs = harness.session.costs().expect("costs are kept");
        assert_eq!(costs.total_one_time, Decimal::from(2_000));
        assert_eq!(costs.total_monthly, Decimal::from(500));
        assert_eq!(usage.used(harness.session.identity()), 1);
        assert_eq!(harness.client.requests()[0].kind, RequestKind::Quote);
        assert!(harness
            .audit
            .event_types()
            .contains(&"negotiation.transition_applied".to_owned()));
    }

    #[tokio::test]
    async fn malformed_quote_leaves_session_drafting() {
        let usage = Arc::new(QuotaUsageGate::new(1, Vec::<String>::new()));
        let harness = harness_with(usage.clone(), SessionSettings::default());
        harness.client.push_text("I think 45k would be fair.");

        let error = harness
            .session
            .submit_project(project_fixture())
            .await
            .expect_err("prose is not a quote");

        assert!(matches!(error, NegotiationError::MalformedResponse { .. }));
        assert_eq!(harness.session.state(), NegotiationState::Drafting);
        assert!(harness.session.quote().is_none());
        assert_eq!(usage.used(harness.session.identity()), 0);
        assert!(!harness.session.is_busy());
    }

    #[tokio::test]
    async fn invalid_project_is_rejected_before_generation() {
        let harness = harness();
        let mut project = project_fixture();
        project.team_size = 0;

        let error = harness.session.submit_project(project).await.expect_err("invalid project");

        assert!(matches!(error, NegotiationError::InvalidInput(_)));
        assert!(harness.client.requests().is_empty());
        assert_eq!(
            harness.audit.event_types(),
            vec!["negotiation.transition_rejected".to_owned()]
        );
    }

    #[tokio::test]
    async fn failed_operation_exposes_its_audit_correlation_id() {
        let harness = harness();
        assert_eq!(harness.session.last_correlation_id(), None);
        let mut project = project_fixture();
        project.team_size = 0;

        let _ = harness.session.submit_project(project).await.expect_err("invalid project");

        let events = harness.audit.events();
        let correlation_id = harness.session.last_correlation_id().expect("operation ran");
        assert!(correlation_id.starts_with("req-"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, correlation_id);
    }

    #[tokio::test]
    async fn exhausted_allowance_short_circuits_before_generation() {
        let harness = harness_with(
            Arc::new(QuotaUsageGate::new(0, Vec::<String>::new())),
            SessionSettings::default(),
        );
        harness.client.push_structured(quote_payload());

        let error =
            harness.session.submit_project(project_fixture()).await.expect_err("no allowance");

        assert!(matches!(error, NegotiationError::AccessDenied { .. }));
        assert!(harness.client.requests().is_empty());
        assert_eq!(harness.session.state(), NegotiationState::Drafting);
    }

    #[tokio::test]
    async fn floor_breach_is_retried_once_with_reinforced_prompt() {
        let harness = harness();
        harness
            .client
            .push_structured(json!({"implementationFee": 1500, "recurringFee": 5000, "reasoning": "x"}))
            .push_structured(quote_payload());

        let quote = harness.session.submit_project(project_fixture()).await.expect("retried quote");

        let requests = harness.client.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].prompt.contains("MANDATORY COST FLOOR"));
        assert!(requests[1].prompt.contains("MANDATORY COST FLOOR"));
        assert_eq!(quote.implementation_fee, Decimal::from(45_000));
    }

    #[tokio::test]
    async fn floor_breach_surfaces_when_retries_are_exhausted() {
        let settings = SessionSettings { invariant_retries: 0, ..SessionSettings::default() };
        let harness = harness_with(Arc::new(UnlimitedUsageGate), settings);
        harness
            .client
            .push_structured(json!({"implementationFee": 45000, "recurringFee": 100, "reasoning": "x"}));

        let error = harness.session.submit_project(project_fixture()).await.expect_err("breach");

        assert!(matches!(
            error,
            NegotiationError::InvariantViolation { kind: RequestKind::Quote, .. }
        ));
        assert_eq!(harness.client.requests().len(), 1);
        assert_eq!(harness.session.state(), NegotiationState::Drafting);
    }

    #[tokio::test]
    async fn countered_negotiation_produces_new_figures_and_document() {
        let harness = quoted_harness().await;
        harness.client.push_structured(analysis_payload("COUNTER", Some((42_000, 4_800))));

        let analysis =
            harness.session.submit_counter_offer(counter_offer()).await.expect("analysis");
        assert_eq!(analysis.recommendation(), Recommendation::Counter);
        assert_eq!(harness.session.state(), NegotiationState::AnalysisReady);

        let terms = harness.session.resolve().expect("resolve").expect("counter has figures");
        assert_eq!(harness.session.state(), NegotiationState::Countered);
        assert_eq!(terms.path, PricingPath::NegotiatedCounter);
        assert_eq!(terms.implementation_fee, Decimal::from(42_000));
        assert_eq!(terms.recurring_fee, Decimal::from(4_800));

        let document = harness.session.assemble_proposal(&details()).expect("document");
        assert_eq!(document.implementation_fee, Decimal::from(42_000));
        assert!(document.reasoning.starts_with("Counter-proposal based on the negotiation analysis."));
        assert!(document.reasoning.ends_with("Removes 25k/month of reconciliation losses."));
    }

    #[tokio::test]
    async fn accepted_counter_offer_uses_client_figures() {
        let harness = quoted_harness().await;
        harness.client.push_structured(analysis_payload("ACCEPT", None));

        harness.session.submit_counter_offer(counter_offer()).await.expect("analysis");
        let terms = harness.session.resolve().expect("resolve").expect("accept has figures");

        assert_eq!(harness.session.state(), NegotiationState::Accepted);
        assert_eq!(terms.path, PricingPath::AcceptedCounter);
        assert_eq!(terms.implementation_fee, Decimal::from(40_000));
        assert_eq!(terms.recurring_fee, Decimal::from(4_500));
    }

    #[tokio::test]
    async fn declined_negotiation_blocks_the_document() {
        let harness = quoted_harness().await;
        harness.client.push_structured(analysis_payload("DECLINE", None));

        harness.session.submit_counter_offer(counter_offer()).await.expect("analysis");
        let terms = harness.session.resolve().expect("resolve");

        assert!(terms.is_none());
        assert_eq!(harness.session.state(), NegotiationState::Declined);
        let error = harness.session.assemble_proposal(&details()).expect_err("declined");
        assert_eq!(
            error,
            NegotiationError::InvalidStateForDocument { state: NegotiationState::Declined }
        );
        assert!(harness
            .audit
            .event_types()
            .contains(&"negotiation.proposal_rejected".to_owned()));
    }

    #[tokio::test]
    async fn failed_analysis_returns_to_quote_ready() {
        let harness = quoted_harness().await;
        harness.client.push_failure(GenerationError::RateLimited { retry_after_secs: Some(30) });

        let error =
            harness.session.submit_counter_offer(counter_offer()).await.expect_err("rate limited");

        assert!(matches!(error, NegotiationError::GenerationFailure(_)));
        assert_eq!(harness.session.state(), NegotiationState::QuoteReady);
        assert!(harness.session.counter_offer().is_none());
        assert!(harness.session.analysis().is_none());
    }

    #[tokio::test]
    async fn quote_ready_document_uses_original_quote() {
        let harness = quoted_harness().await;

        let document = harness.session.assemble_proposal(&details()).expect("document");

        assert_eq!(document.path, PricingPath::OriginalQuote);
        assert_eq!(document.implementation_fee, Decimal::from(45_000));
        assert_eq!(document.recurring_fee, Decimal::from(5_000));
    }

    #[tokio::test]
    async fn drafting_rejects_every_other_operation() {
        let harness = harness();

        assert!(matches!(
            harness.session.submit_counter_offer(counter_offer()).await,
            Err(NegotiationError::InvalidTransition { state: NegotiationState::Drafting, .. })
        ));
        assert!(matches!(
            harness.session.resolve(),
            Err(NegotiationError::InvalidTransition { state: NegotiationState::Drafting, .. })
        ));
        assert!(matches!(
            harness.session.send_chat_message("hello").await,
            Err(NegotiationError::InvalidTransition { state: NegotiationState::Drafting, .. })
        ));
        assert!(matches!(
            harness.session.assemble_proposal(&details()),
            Err(NegotiationError::InvalidStateForDocument { state: NegotiationState::Drafting })
        ));
        assert_eq!(harness.session.state(), NegotiationState::Drafting);
        assert!(harness.client.requests().is_empty());
    }

    #[tokio::test]
    async fn chat_replays_transcript_and_keeps_state() {
        let harness = quoted_harness().await;
        harness.client.push_text("Ask what a month of delay costs them.");
        harness.client.push_text("Hold the anchor and trade scope, not price.");

        harness.session.send_chat_message("They say it's too expensive").await.expect("reply");
        let reply =
            harness.session.send_chat_message("And if they push back again?").await.expect("reply");

        assert_eq!(reply, "Hold the anchor and trade scope, not price.");
        let transcript = harness.session.transcript();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[1].sender, Sender::Advisor);
        let last_request = harness.client.requests().pop().expect("chat request");
        assert_eq!(last_request.kind, RequestKind::ChatTurn);
        assert!(last_request.prompt.contains("Advisor: Ask what a month of delay costs them."));
        assert!(last_request.prompt.contains("User: And if they push back again?"));
        assert_eq!(harness.session.state(), NegotiationState::QuoteReady);
    }

    #[tokio::test]
    async fn failed_chat_turn_drops_pending_user_message() {
        let harness = quoted_harness().await;
        harness.client.push_failure(GenerationError::Timeout { elapsed_ms: 60_000 });

        let error = harness.session.send_chat_message("Any advice?").await.expect_err("timeout");

        assert!(matches!(error, NegotiationError::GenerationFailure(_)));
        assert!(harness.session.transcript().is_empty());
    }

    #[tokio::test]
    async fn restart_discards_terminal_state() {
        let harness = quoted_harness().await;
        harness.client.push_structured(analysis_payload("DECLINE", None));
        harness.session.submit_counter_offer(counter_offer()).await.expect("analysis");
        harness.session.resolve().expect("resolve");

        harness.session.restart().expect("restart");

        assert_eq!(harness.session.state(), NegotiationState::Drafting);
        assert!(harness.session.quote().is_none());
        assert!(harness.session.resolved_terms().is_none());
        assert!(harness.session.costs().is_none());
    }

    #[tokio::test]
    async fn in_flight_request_blocks_others_and_cancellation_rolls_back() {
        let session = NegotiationSession::new(
            Identity::new("founder@example.com"),
            SessionSettings::default(),
            Arc::new(StallingClient { calls: AtomicUsize::new(0) }),
            Arc::new(UnlimitedUsageGate),
            Arc::new(InMemoryAuditSink::default()),
        );
        session.submit_project(project_fixture()).await.expect("quote");

        {
            let pending = session.submit_counter_offer(counter_offer());
            tokio::pin!(pending);
            tokio::select! {
                biased;
                _ = &mut pending => panic!("analysis should stay pending"),
                _ = tokio::time::sleep(Duration::from_millis(20)) => {}
            }

            assert!(session.is_busy());
            assert_eq!(session.state(), NegotiationState::CounterSubmitted);
            assert_eq!(session.restart(), Err(NegotiationError::SessionBusy));
            assert!(matches!(
                session.send_chat_message("still there?").await,
                Err(NegotiationError::SessionBusy)
            ));
        }

        assert!(!session.is_busy());
        assert_eq!(session.state(), NegotiationState::QuoteReady);
        assert!(session.counter_offer().is_none());
        session.restart().expect("restart after cancellation");
    }
}
