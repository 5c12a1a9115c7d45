use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::quote::Recommendation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationState {
    Drafting,
    QuoteReady,
    CounterSubmitted,
    AnalysisReady,
    Accepted,
    Countered,
    Declined,
}

impl NegotiationState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Drafting => "drafting",
            Self::QuoteReady => "quote_ready",
            Self::CounterSubmitted => "counter_submitted",
            Self::AnalysisReady => "analysis_ready",
            Self::Accepted => "accepted",
            Self::Countered => "countered",
            Self::Declined => "declined",
        }
    }

    /// States from which a proposal document may be assembled.
    pub fn permits_document(&self) -> bool {
        matches!(self, Self::QuoteReady | Self::Accepted | Self::Countered)
    }

    pub fn has_quote(&self) -> bool {
        !matches!(self, Self::Drafting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Countered | Self::Declined)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NegotiationEvent {
    ProjectSubmitted,
    CounterOfferSubmitted,
    AnalysisReceived,
    AnalysisFailed,
    ResolutionRequested,
    Restart,
}

impl NegotiationEvent {
    /// Session operation that raises the event.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ProjectSubmitted => "submit_project",
            Self::CounterOfferSubmitted | Self::AnalysisReceived | Self::AnalysisFailed => {
                "submit_counter_offer"
            }
            Self::ResolutionRequested => "resolve",
            Self::Restart => "restart",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub validation_issues: Vec<String>,
    pub recommendation: Option<Recommendation>,
}

impl FlowContext {
    pub fn with_issues(validation_issues: Vec<String>) -> Self {
        Self { validation_issues, recommendation: None }
    }

    pub fn with_recommendation(recommendation: Option<Recommendation>) -> Self {
        Self { validation_issues: Vec::new(), recommendation }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: NegotiationState,
    pub to: NegotiationState,
    pub event: NegotiationEvent,
}
