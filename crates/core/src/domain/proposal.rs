use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerInfo {
    pub company_name: String,
    pub email: String,
    pub phone: String,
    /// Company logo as a `data:` URI.
    #[serde(default)]
    pub logo_data_uri: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub company_name: String,
    pub contact_name: String,
}

/// Caller-supplied metadata for a proposal document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDetails {
    pub issuer: IssuerInfo,
    pub client: ClientInfo,
    #[serde(default)]
    pub payment_terms: Option<String>,
}

/// Which negotiation path produced the final figures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPath {
    OriginalQuote,
    AcceptedCounter,
    NegotiatedCounter,
}

impl PricingPath {
    pub fn reasoning_prefix(&self) -> &'static str {
        match self {
            Self::OriginalQuote => "Original value-based quote.",
            Self::AcceptedCounter => "Client counter-offer accepted. Original justification:",
            Self::NegotiatedCounter => {
                "Counter-proposal based on the negotiation analysis. Original justification:"
            }
        }
    }
}

/// Final figures of a session together with the reasoning they came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTerms {
    pub path: PricingPath,
    pub implementation_fee: Decimal,
    pub recurring_fee: Decimal,
    pub reasoning: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDocument {
    pub issuer: IssuerInfo,
    pub client: ClientInfo,
    pub currency: String,
    pub path: PricingPath,
    pub implementation_fee: Decimal,
    pub recurring_fee: Decimal,
    pub reasoning: String,
    pub payment_terms: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub file_name: String,
}
