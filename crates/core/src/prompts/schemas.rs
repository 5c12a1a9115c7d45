use serde_json::{json, Value};

use crate::generation::ResponseShape;

pub const QUOTE_SHAPE_NAME: &str = "quote";
pub const COUNTER_OFFER_SHAPE_NAME: &str = "counter_offer_analysis";

pub fn quote_shape() -> ResponseShape {
    ResponseShape { name: QUOTE_SHAPE_NAME, schema: quote_schema() }
}

pub fn counter_offer_shape() -> ResponseShape {
    ResponseShape { name: COUNTER_OFFER_SHAPE_NAME, schema: counter_offer_schema() }
}

fn quote_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "implementationFee": {
                "type": "number",
                "minimum": 0,
                "description": "One-time implementation fee. MUST include the total one-time tool cost."
            },
            "recurringFee": {
                "type": "number",
                "minimum": 0,
                "description": "Monthly recurring fee for maintenance and support. MUST include the total monthly tool cost."
            },
            "reasoning": {
                "type": "string",
                "description": "Pricing justification focused on the client's ROI and the value created."
            }
        },
        "required": ["implementationFee", "recurringFee", "reasoning"],
        "additionalProperties": false
    })
}

fn counter_offer_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "analysis": {
                "type": "string",
                "description": "Tactical assessment of the client's counter-offer against project ROI and fixed tool costs."
            },
            "recommendation": {
                "type": "string",
                "enum": ["ACCEPT", "COUNTER", "DECLINE"]
            },
            "suggestedResponse": {
                "type": "string",
                "description": "Professional message to send to the client, anchoring the conversation on value."
            },
            "newOffer": {
                "type": ["object", "null"],
                "description": "Required when recommendation is COUNTER, absent otherwise.",
                "properties": {
                    "implementationFee": { "type": "number", "minimum": 0 },
                    "recurringFee": { "type": "number", "minimum": 0 }
                },
                "required": ["implementationFee", "recurringFee"]
            }
        },
        "required": ["analysis", "recommendation", "suggestedResponse"]
    })
}

#[cfg(test)]
mod tests {
    use super::{counter_offer_shape, quote_shape};

    #[test]
    fn quote_schema_requires_every_field() {
        let shape = quote_shape();
        let required = shape.schema["required"].as_array().expect("required list");

        assert_eq!(required.len(), 3);
        assert_eq!(shape.schema["properties"]["implementationFee"]["type"], "number");
    }

    #[test]
    fn counter_offer_schema_keeps_new_offer_optional() {
        let shape = counter_offer_shape();
        let required = shape.schema["required"].as_array().expect("required list");

        assert!(!required.iter().any(|field| field == "newOffer"));
        assert_eq!(
            shape.schema["properties"]["recommendation"]["enum"],
            serde_json::json!(["ACCEPT", "COUNTER", "DECLINE"])
        );
    }
}
