//! Turns raw generation output into typed negotiation entities.
//!
//! Structural problems surface as `MalformedResponse` or `SchemaViolation`.
//! Once a quote or analysis parses, the cost floor is re-checked here; the
//! generation service is only ever instructed to respect it.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

use crate::cpq::AggregatedCosts;
use crate::domain::quote::{
    AnalysisVerdict, ClientCounterOffer, CounterOfferAnalysis, Offer, Quote, Recommendation,
};
use crate::errors::NegotiationError;
use crate::generation::{GenerationOutput, RequestKind};

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseInterpreter;

impl ResponseInterpreter {
    pub fn interpret_quote(
        &self,
        output: GenerationOutput,
        costs: &AggregatedCosts,
    ) -> Result<Quote, NegotiationError> {
        let kind = RequestKind::Quote;
        let object = structured_payload(kind, output)?;

        let quote = Quote {
            implementation_fee: required_amount(kind, &object, "implementationFee", "")?,
            recurring_fee: required_amount(kind, &object, "recurringFee", "")?,
            reasoning: verbatim_text(kind, &object, "reasoning")?,
        };

        costs
            .floor()
            .check(quote.implementation_fee, quote.recurring_fee)
            .map_err(|breach| NegotiationError::InvariantViolation {
                kind,
                detail: breach.to_string(),
            })?;

        Ok(quote)
    }

    pub fn interpret_analysis(
        &self,
        output: GenerationOutput,
        costs: &AggregatedCosts,
        offer: &ClientCounterOffer,
    ) -> Result<CounterOfferAnalysis, NegotiationError> {
        let kind = RequestKind::CounterOfferAnalysis;
        let object = structured_payload(kind, output)?;

        let analysis = required_text(kind, &object, "analysis")?;
        let raw_recommendation = required_text(kind, &object, "recommendation")?;
        let recommendation = Recommendation::from_wire(&raw_recommendation).ok_or_else(|| {
            NegotiationError::SchemaViolation {
                kind,
                field: "recommendation".to_owned(),
                detail: format!(
                    "expected one of ACCEPT, COUNTER or DECLINE, found `{raw_recommendation}`"
                ),
            }
        })?;
        let suggested_response = required_text(kind, &object, "suggestedResponse")?;

        let new_offer = match object.get("newOffer") {
            None | Some(Value::Null) => None,
            Some(Value::Object(offer)) => Some(Offer {
                implementation_fee: required_amount(kind, offer, "implementationFee", "newOffer.")?,
                recurring_fee: required_amount(kind, offer, "recurringFee", "newOffer.")?,
            }),
            Some(other) => {
                return Err(NegotiationError::SchemaViolation {
                    kind,
                    field: "newOffer".to_owned(),
                    detail: format!("expected an object, found {}", type_name(other)),
                });
            }
        };

        let floor = costs.floor();
        let verdict = match (recommendation, new_offer) {
            (Recommendation::Counter, Some(new_offer)) => {
                floor.check(new_offer.implementation_fee, new_offer.recurring_fee).map_err(
                    |breach| NegotiationError::InvariantViolation {
                        kind,
                        detail: format!("proposed counter-offer: {breach}"),
                    },
                )?;
                AnalysisVerdict::Counter { new_offer }
            }
            (Recommendation::Counter, None) => {
                return Err(NegotiationError::SchemaViolation {
                    kind,
                    field: "newOffer".to_owned(),
                    detail: "is required when recommending COUNTER".to_owned(),
                });
            }
            (Recommendation::Accept | Recommendation::Decline, Some(_)) => {
                return Err(NegotiationError::SchemaViolation {
                    kind,
                    field: "newOffer".to_owned(),
                    detail: format!("must be omitted when recommending {recommendation}"),
                });
            }
            (Recommendation::Accept, None) => {
                floor.check(offer.implementation, offer.recurring).map_err(|breach| {
                    NegotiationError::InvariantViolation {
                        kind,
                        detail: format!("accepted client counter-offer: {breach}"),
                    }
                })?;
                AnalysisVerdict::Accept
            }
            (Recommendation::Decline, None) => AnalysisVerdict::Decline,
        };

        Ok(CounterOfferAnalysis { analysis, verdict, suggested_response })
    }

    pub fn interpret_chat(&self, output: GenerationOutput) -> Result<String, NegotiationError> {
        let text = match output {
            GenerationOutput::Text(text) => text,
            GenerationOutput::Structured(Value::String(text)) => text,
            GenerationOutput::Structured(other) => {
                return Err(NegotiationError::MalformedResponse {
                    kind: RequestKind::ChatTurn,
                    detail: format!("expected free text, found {}", type_name(&other)),
                });
            }
        };

        let reply = text.trim();
        if reply.is_empty() {
            return Err(NegotiationError::MalformedResponse {
                kind: RequestKind::ChatTurn,
                detail: "reply is empty".to_owned(),
            });
        }
        Ok(reply.to_owned())
    }
}

fn structured_payload(
    kind: RequestKind,
    output: GenerationOutput,
) -> Result<Map<String, Value>, NegotiationError> {
    let value = match output {
        GenerationOutput::Structured(value) => value,
        GenerationOutput::Text(text) => serde_json::from_str(strip_code_fence(&text)).map_err(
            |error| NegotiationError::MalformedResponse { kind, detail: error.to_string() },
        )?,
    };

    match value {
        Value::Object(object) => Ok(object),
        other => Err(NegotiationError::MalformedResponse {
            kind,
            detail: format!("expected a JSON object, found {}", type_name(&other)),
        }),
    }
}

/// Removes a surrounding Markdown code fence (with optional language tag).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn required_text(
    kind: RequestKind,
    object: &Map<String, Value>,
    field: &str,
) -> Result<String, NegotiationError> {
    match object.get(field) {
        Some(Value::String(text)) => Ok(text.trim().to_owned()),
        None | Some(Value::Null) => Err(missing(kind, field)),
        Some(other) => Err(NegotiationError::SchemaViolation {
            kind,
            field: field.to_owned(),
            detail: format!("expected a string, found {}", type_name(other)),
        }),
    }
}

/// Like `required_text`, but the text is kept exactly as generated and a
/// blank value counts as missing.
fn verbatim_text(
    kind: RequestKind,
    object: &Map<String, Value>,
    field: &str,
) -> Result<String, NegotiationError> {
    match object.get(field) {
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(NegotiationError::SchemaViolation {
                kind,
                field: field.to_owned(),
                detail: "must not be empty".to_owned(),
            })
        }
        Some(Value::String(text)) => Ok(text.clone()),
        _ => required_text(kind, object, field),
    }
}

fn required_amount(
    kind: RequestKind,
    object: &Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<Decimal, NegotiationError> {
    let qualified = format!("{path}{field}");
    let amount = match object.get(field) {
        Some(Value::Number(number)) => {
            decimal_from_number(number).ok_or_else(|| NegotiationError::SchemaViolation {
                kind,
                field: qualified.clone(),
                detail: format!("`{number}` is not a representable amount"),
            })?
        }
        None | Some(Value::Null) => return Err(missing(kind, &qualified)),
        Some(other) => {
            return Err(NegotiationError::SchemaViolation {
                kind,
                field: qualified,
                detail: format!("expected a number, found {}", type_name(other)),
            });
        }
    };

    if amount < Decimal::ZERO {
        return Err(NegotiationError::SchemaViolation {
            kind,
            field: qualified,
            detail: format!("must not be negative, found {amount}"),
        });
    }
    Ok(amount.normalize())
}

fn decimal_from_number(number: &Number) -> Option<Decimal> {
    if let Some(value) = number.as_i64() {
        return Some(Decimal::from(value));
    }
    if let Some(value) = number.as_u64() {
        return Some(Decimal::from(value));
    }
    let raw = number.to_string();
    Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)).ok()
}

fn missing(kind: RequestKind, field: &str) -> NegotiationError {
    NegotiationError::SchemaViolation {
        kind,
        field: field.to_owned(),
        detail: "is required".to_owned(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
