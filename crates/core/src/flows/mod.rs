pub mod engine;
pub mod session;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, NegotiationFlow};
pub use session::{NegotiationSession, SessionSettings};
pub use states::{FlowContext, NegotiationEvent, NegotiationState, TransitionOutcome};
