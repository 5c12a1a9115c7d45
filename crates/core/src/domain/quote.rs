use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value-anchored price produced by the generation step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub implementation_fee: Decimal,
    pub recurring_fee: Decimal,
    pub reasoning: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCounterOffer {
    pub implementation: Decimal,
    pub recurring: Decimal,
}

impl ClientCounterOffer {
    pub fn validation_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.implementation < Decimal::ZERO {
            issues.push("counter-offer implementation must not be negative".to_string());
        }
        if self.recurring < Decimal::ZERO {
            issues.push("counter-offer recurring must not be negative".to_string());
        }
        issues
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub implementation_fee: Decimal,
    pub recurring_fee: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Accept,
    Counter,
    Decline,
}

impl Recommendation {
    pub fn wire_value(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Counter => "COUNTER",
            Self::Decline => "DECLINE",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Some(Self::Accept),
            "COUNTER" => Some(Self::Counter),
            "DECLINE" => Some(Self::Decline),
            _ => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value())
    }
}

/// A recommendation together with the data only that recommendation carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "recommendation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisVerdict {
    Accept,
    Counter { new_offer: Offer },
    Decline,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOfferAnalysis {
    pub analysis: String,
    pub verdict: AnalysisVerdict,
    pub suggested_response: String,
}

impl CounterOfferAnalysis {
    pub fn recommendation(&self) -> Recommendation {
        match self.verdict {
            AnalysisVerdict::Accept => Recommendation::Accept,
            AnalysisVerdict::Counter { .. } => Recommendation::Counter,
            AnalysisVerdict::Decline => Recommendation::Decline,
        }
    }

    pub fn new_offer(&self) -> Option<&Offer> {
        match &self.verdict {
            AnalysisVerdict::Counter { new_offer } => Some(new_offer),
            AnalysisVerdict::Accept | AnalysisVerdict::Decline => None,
        }
    }
}
