//! Value-based quoting and negotiation engine.
//!
//! A [`NegotiationSession`] walks a project from its first value-anchored
//! quote through a client counter-offer to the final proposal document. Fixed
//! tool costs form a floor that every quote, counter and accepted offer must
//! cover.

pub mod access;
pub mod assembly;
pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod generation;
pub mod interpret;
pub mod prompts;
pub mod render;

pub use access::{AccessError, QuotaUsageGate, UnlimitedUsageGate, UsageGate};
pub use assembly::ProposalAssembler;
pub use cpq::{aggregate_costs, AggregatedCosts, CostFloor};
pub use domain::chat::{ChatMessage, Sender};
pub use domain::identity::{Identity, SessionId};
pub use domain::project::ProjectData;
pub use domain::proposal::{
    ClientInfo, IssuerInfo, PricingPath, ProposalDetails, ProposalDocument, ResolvedTerms,
};
pub use domain::quote::{
    AnalysisVerdict, ClientCounterOffer, CounterOfferAnalysis, Offer, Quote, Recommendation,
};
pub use domain::tool::{CostType, Tool, ToolId};
pub use errors::{InterfaceError, NegotiationError};
pub use flows::{NegotiationSession, NegotiationState, SessionSettings};
pub use generation::{
    GenerationClient, GenerationError, GenerationOutput, GenerationRequest, RequestKind,
    ResponseShape, ScriptedGenerationClient,
};
pub use interpret::ResponseInterpreter;
pub use prompts::PromptBuilder;
pub use render::{DocumentRenderer, RenderError, RenderedDocument};
