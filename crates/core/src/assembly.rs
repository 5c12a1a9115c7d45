use chrono::{DateTime, Duration, Utc};

use crate::domain::proposal::{PricingPath, ProposalDetails, ProposalDocument, ResolvedTerms};
use crate::errors::NegotiationError;
use crate::flows::NegotiationState;

pub const DEFAULT_PAYMENT_TERMS: &str = "50% on contract signature, 50% on project delivery.";
pub const DEFAULT_VALIDITY_DAYS: u32 = 7;

/// Builds the immutable proposal document for a resolved negotiation.
#[derive(Clone, Debug)]
pub struct ProposalAssembler {
    currency: String,
    validity_days: u32,
    default_payment_terms: String,
}

impl Default for ProposalAssembler {
    fn default() -> Self {
        Self::new("BRL", DEFAULT_VALIDITY_DAYS, DEFAULT_PAYMENT_TERMS)
    }
}

impl ProposalAssembler {
    pub fn new(
        currency: impl Into<String>,
        validity_days: u32,
        default_payment_terms: impl Into<String>,
    ) -> Self {
        Self {
            currency: currency.into(),
            validity_days,
            default_payment_terms: default_payment_terms.into(),
        }
    }

    pub fn assemble(
        &self,
        state: NegotiationState,
        terms: Option<&ResolvedTerms>,
        details: &ProposalDetails,
    ) -> Result<ProposalDocument, NegotiationError> {
        self.assemble_at(state, terms, details, Utc::now())
    }

    pub fn assemble_at(
        &self,
        state: NegotiationState,
        terms: Option<&ResolvedTerms>,
        details: &ProposalDetails,
        issued_at: DateTime<Utc>,
    ) -> Result<ProposalDocument, NegotiationError> {
        let terms = match (state.permits_document(), terms) {
            (true, Some(terms)) => terms,
            _ => return Err(NegotiationError::InvalidStateForDocument { state }),
        };

        let mut issues = Vec::new();
        if expected_path(state) != Some(terms.path) {
            issues.push(format!(
                "resolved terms from path {:?} do not match negotiation state {state}",
                terms.path
            ));
        }
        if details.issuer.company_name.trim().is_empty() {
            issues.push("issuer company name is required".to_owned());
        }
        if details.client.company_name.trim().is_empty() {
            issues.push("client company name is required".to_owned());
        }
        if !issues.is_empty() {
            return Err(NegotiationError::InvalidInput(issues));
        }

        let payment_terms = details
            .payment_terms
            .as_deref()
            .map(str::trim)
            .filter(|terms| !terms.is_empty())
            .unwrap_or(&self.default_payment_terms)
            .to_owned();

        Ok(ProposalDocument {
            issuer: details.issuer.clone(),
            client: details.client.clone(),
            currency: self.currency.clone(),
            path: terms.path,
            implementation_fee: terms.implementation_fee,
            recurring_fee: terms.recurring_fee,
            reasoning: format!("{} {}", terms.path.reasoning_prefix(), terms.reasoning),
            payment_terms,
            issued_at,
            expires_at: issued_at + Duration::days(i64::from(self.validity_days)),
            file_name: proposal_file_name(&details.client.company_name),
        })
    }
}

fn expected_path(state: NegotiationState) -> Option<PricingPath> {
    match state {
        NegotiationState::QuoteReady => Some(PricingPath::OriginalQuote),
        NegotiationState::Accepted => Some(PricingPath::AcceptedCounter),
        NegotiationState::Countered => Some(PricingPath::NegotiatedCounter),
        _ => None,
    }
}

/// Keeps alphanumerics, `-` and `_`; every other run of characters becomes a
/// single `_`, so the name can never carry a path component.
fn proposal_file_name(client_company: &str) -> String {
    let slug = client_company
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        return "proposal-client.pdf".to_owned();
    }
    format!("proposal-{slug}.pdf")
}
