use thiserror::Error;

use crate::access::AccessError;
use crate::flows::{FlowTransitionError, NegotiationState};
use crate::generation::{GenerationError, RequestKind};
use crate::render::RenderError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("{kind} response could not be parsed: {detail}")]
    MalformedResponse { kind: RequestKind, detail: String },
    #[error("{kind} response field `{field}` is invalid: {detail}")]
    SchemaViolation { kind: RequestKind, field: String, detail: String },
    #[error("{kind} response breaches the cost floor: {detail}")]
    InvariantViolation { kind: RequestKind, detail: String },
    #[error(transparent)]
    GenerationFailure(#[from] GenerationError),
    #[error("a proposal cannot be assembled while the negotiation is {state}")]
    InvalidStateForDocument { state: NegotiationState },
    #[error("`{operation}` is not allowed while the negotiation is {state}")]
    InvalidTransition { state: NegotiationState, operation: String },
    #[error("invalid input: {}", .0.join("; "))]
    InvalidInput(Vec<String>),
    #[error("`{identity}` has no remaining quote allowance")]
    AccessDenied { identity: String },
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("another request is already in flight for this session")]
    SessionBusy,
}

impl From<FlowTransitionError> for NegotiationError {
    fn from(value: FlowTransitionError) -> Self {
        match value {
            FlowTransitionError::InvalidInput { issues, .. } => Self::InvalidInput(issues),
            FlowTransitionError::MissingRecommendation { state } => {
                Self::InvalidTransition { state, operation: "resolve".to_owned() }
            }
            FlowTransitionError::InvalidTransition { state, event } => {
                Self::InvalidTransition { state, operation: event.operation().to_owned() }
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("retryable failure: {message}")]
    Retryable { message: String, correlation_id: String },
    #[error("non-compliant response: {message}")]
    NonCompliant { message: String, correlation_id: String },
    #[error("blocked: {message}")]
    Blocking { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Retryable { .. } => "The request could not be completed. Please try again.",
            Self::NonCompliant { .. } => {
                "Unable to produce a quote that covers the fixed tool costs. Please try again."
            }
            Self::Blocking { .. } => {
                "Resolve the negotiation before generating the proposal document."
            }
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => {
                "Your free quote allowance is used up. Contact us to unlock unlimited access."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    /// Stable machine-readable class for structured outputs.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Retryable { .. } => "retryable",
            Self::NonCompliant { .. } => "non_compliant",
            Self::Blocking { .. } => "blocking",
            Self::BadRequest { .. } => "bad_request",
            Self::Forbidden { .. } => "forbidden",
            Self::Internal { .. } => "internal",
        }
    }

    /// Whether the caller should offer the user a retry.
    pub fn retry_allowed(&self) -> bool {
        matches!(self, Self::Retryable { .. } | Self::NonCompliant { .. })
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Retryable { correlation_id, .. }
            | Self::NonCompliant { correlation_id, .. }
            | Self::Blocking { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl NegotiationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Retryable { correlation_id: id, .. }
            | InterfaceError::NonCompliant { correlation_id: id, .. }
            | InterfaceError::Blocking { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<NegotiationError> for InterfaceError {
    fn from(value: NegotiationError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            NegotiationError::MalformedResponse { .. }
            | NegotiationError::SchemaViolation { .. }
            | NegotiationError::GenerationFailure(_)
            | NegotiationError::SessionBusy => Self::Retryable { message, correlation_id },
            NegotiationError::InvariantViolation { .. } => {
                Self::NonCompliant { message, correlation_id }
            }
            NegotiationError::InvalidStateForDocument { .. } => {
                Self::Blocking { message, correlation_id }
            }
            NegotiationError::InvalidTransition { .. } | NegotiationError::InvalidInput(_) => {
                Self::BadRequest { message, correlation_id }
            }
            NegotiationError::AccessDenied { .. } => Self::Forbidden { message, correlation_id },
            NegotiationError::Access(_) | NegotiationError::Render(_) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{InterfaceError, NegotiationError};
    use crate::flows::{FlowTransitionError, NegotiationEvent, NegotiationState};
    use crate::generation::{GenerationError, RequestKind};

    #[test]
    fn generation_failure_maps_to_retryable_interface_error() {
        let interface = NegotiationError::from(GenerationError::Timeout { elapsed_ms: 30_000 })
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Retryable { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert!(interface.retry_allowed());
    }

    #[test]
    fn invariant_violation_is_reported_as_non_compliant() {
        let interface = NegotiationError::InvariantViolation {
            kind: RequestKind::Quote,
            detail: "implementation is 500 below the one-time tool cost".to_owned(),
        }
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::NonCompliant { .. }));
        assert_eq!(
            interface.user_message(),
            "Unable to produce a quote that covers the fixed tool costs. Please try again."
        );
        assert!(interface.retry_allowed());
    }

    #[test]
    fn document_from_declined_state_is_blocking() {
        let interface =
            NegotiationError::InvalidStateForDocument { state: NegotiationState::Declined }
                .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Blocking { .. }));
        assert_eq!(interface.error_class(), "blocking");
        assert!(!interface.retry_allowed());
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn flow_errors_become_invalid_transition_or_input() {
        let transition = NegotiationError::from(FlowTransitionError::InvalidTransition {
            state: NegotiationState::Drafting,
            event: NegotiationEvent::CounterOfferSubmitted,
        });
        assert_eq!(
            transition,
            NegotiationError::InvalidTransition {
                state: NegotiationState::Drafting,
                operation: "submit_counter_offer".to_owned(),
            }
        );
        assert_eq!(
            transition.to_string(),
            "`submit_counter_offer` is not allowed while the negotiation is drafting"
        );

        let input = NegotiationError::from(FlowTransitionError::InvalidInput {
            state: NegotiationState::Drafting,
            issues: vec!["client_value is required".to_owned()],
        });
        assert!(matches!(input.into_interface("req-4"), InterfaceError::BadRequest { .. }));
    }

    #[test]
    fn access_denied_maps_to_forbidden() {
        let interface = NegotiationError::AccessDenied { identity: "a@b.io".to_owned() }
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
        assert_eq!(interface.error_class(), "forbidden");
    }
}
