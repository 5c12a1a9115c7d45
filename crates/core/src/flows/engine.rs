use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::quote::Recommendation;
use crate::flows::states::{FlowContext, NegotiationEvent, NegotiationState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> NegotiationState;
    fn transition(
        &self,
        current: &NegotiationState,
        event: &NegotiationEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct NegotiationFlow;

impl FlowDefinition for NegotiationFlow {
    fn initial_state(&self) -> NegotiationState {
        NegotiationState::Drafting
    }

    fn transition(
        &self,
        current: &NegotiationState,
        event: &NegotiationEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_negotiation(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> NegotiationState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &NegotiationState,
        event: &NegotiationEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    /// Emits the audit record for a transition. Sessions call this once the
    /// work behind an applied transition has succeeded.
    pub fn audit_outcome<S>(
        &self,
        result: &Result<TransitionOutcome, FlowTransitionError>,
        sink: &S,
        audit: &AuditContext,
    ) where
        S: AuditSink + ?Sized,
    {
        match result {
            Ok(outcome) => {
                sink.emit(
                    audit
                        .event(
                            "negotiation.transition_applied",
                            AuditCategory::Flow,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", format!("{:?}", outcome.from))
                        .with_metadata("to", format!("{:?}", outcome.to))
                        .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event(
                            "negotiation.transition_rejected",
                            AuditCategory::Flow,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("error", error.to_string()),
                );
            }
        }
    }
}

impl Default for FlowEngine<NegotiationFlow> {
    fn default() -> Self {
        Self::new(NegotiationFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid input before transition from {state:?}: {issues:?}")]
    InvalidInput { state: NegotiationState, issues: Vec<String> },
    #[error("no recommendation available to resolve from {state:?}")]
    MissingRecommendation { state: NegotiationState },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: NegotiationState, event: NegotiationEvent },
}

fn transition_negotiation(
    current: &NegotiationState,
    event: &NegotiationEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use NegotiationEvent::{
        AnalysisFailed, AnalysisReceived, CounterOfferSubmitted, ProjectSubmitted,
        ResolutionRequested, Restart,
    };
    use NegotiationState::{
        Accepted, AnalysisReady, CounterSubmitted, Countered, Declined, Drafting, QuoteReady,
    };

    let to = match (current, event) {
        (_, Restart) => Drafting,
        (Drafting, ProjectSubmitted) | (QuoteReady, CounterOfferSubmitted) => {
            if !context.validation_issues.is_empty() {
                return Err(FlowTransitionError::InvalidInput {
                    state: *current,
                    issues: context.validation_issues.clone(),
                });
            }
            match event {
                ProjectSubmitted => QuoteReady,
                _ => CounterSubmitted,
            }
        }
        (CounterSubmitted, AnalysisReceived) => AnalysisReady,
        (CounterSubmitted, AnalysisFailed) => QuoteReady,
        (AnalysisReady, ResolutionRequested) => match context.recommendation {
            Some(Recommendation::Accept) => Accepted,
            Some(Recommendation::Counter) => Countered,
            Some(Recommendation::Decline) => Declined,
            None => {
                return Err(FlowTransitionError::MissingRecommendation { state: *current });
            }
        },
        _ => {
            return Err(FlowTransitionError::InvalidTransition { state: *current, event: *event });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event })
}
