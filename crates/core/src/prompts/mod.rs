//! Request builders for the three negotiation phases.
//!
//! Building is pure formatting: every figure the generation service needs is
//! embedded in the prompt, and the quote and analysis requests carry the JSON
//! Schema their responses are interpreted against.

pub mod schemas;

use crate::cpq::AggregatedCosts;
use crate::domain::chat::ChatMessage;
use crate::domain::project::ProjectData;
use crate::domain::quote::{ClientCounterOffer, Quote};
use crate::generation::{GenerationRequest, RequestKind};

const ADVISOR_PERSONA: &str = "You are a digital negotiation strategist specialised in value-based pricing, \
following the tactical empathy principles of Chris Voss.";

#[derive(Clone, Debug)]
pub struct PromptBuilder {
    currency: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("BRL")
    }
}

impl PromptBuilder {
    pub fn new(currency: impl Into<String>) -> Self {
        Self { currency: currency.into() }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn quote_request(&self, project: &ProjectData, costs: &AggregatedCosts) -> GenerationRequest {
        let currency = &self.currency;
        let prompt = format!(
            "{ADVISOR_PERSONA} Your task is to produce a quote that reflects the business impact of the \
solution for the client while passing through the fixed tool costs.
The market has high demand and few specialists: pricing must be premium and anchored on value, not on effort.

**Impact and ROI (client-provided data):**
- Client annual revenue: {annual_revenue}
- Process to optimize: {process}
- Time currently spent on the process: {hours} hours/month
- People involved in the process: {people}
- Estimated monthly cost or revenue loss caused by the current process: {currency} {loss}

**Tool costs (fixed, non-negotiable):**
{tools}
- Total one-time tool cost: {currency} {one_time}
- Total monthly tool cost: {currency} {monthly}

**Project details:**
- Value proposition for the client: {client_value}
- Client size: {client_size}
- Complexity: {complexity}
- Urgency: {urgency}
- Integration needs: {integration}
- Security level: {security}

**Team and business parameters:**
- Estimated duration: {duration} hours
- Team size: {team_size} person(s)
- Team seniority: {seniority}
- Post-launch support level: {support}
- Desired profit margin: {margin}%

**Your task:**
1. Anchor the price on VALUE, not cost. Use the estimated monthly loss as the main reference.
2. Compute an implementation fee and a recurring monthly fee that cover team cost, margin and perceived value.
3. You MUST add the fixed tool costs to the final figures:
   - implementationFee MUST be (your value-based implementation price) + {one_time}.
   - recurringFee MUST be (your value-based recurring price) + {monthly}.
4. In reasoning, write a compelling justification that demonstrates the client's ROI. Frame the price as an investment, not a cost.
5. The currency is {currency}; return plain numbers in the price fields.",
            annual_revenue = project.annual_revenue,
            process = project.process_to_optimize,
            hours = project.hours_per_month,
            people = project.people_involved,
            loss = project.estimated_monthly_loss,
            tools = costs.summary,
            one_time = costs.total_one_time,
            monthly = costs.total_monthly,
            client_value = project.client_value,
            client_size = project.client_size.label(),
            complexity = project.complexity.label(),
            urgency = project.urgency.label(),
            integration = project.integration_needs.label(),
            security = project.security_level.label(),
            duration = project.duration_hours,
            team_size = project.team_size,
            seniority = project.team_seniority.label(),
            support = project.support_level.label(),
            margin = project.desired_margin_pct,
        );

        GenerationRequest {
            kind: RequestKind::Quote,
            prompt,
            shape: Some(schemas::quote_shape()),
        }
    }

    pub fn counter_offer_request(
        &self,
        project: &ProjectData,
        costs: &AggregatedCosts,
        quote: &Quote,
        offer: &ClientCounterOffer,
    ) -> GenerationRequest {
        let currency = &self.currency;
        let prompt = format!(
            "{ADVISOR_PERSONA} You delivered a value-based quote and the client answered with a \
counter-offer. Analyse the offer and advise the next step with tactics and precision.

**Key context (project ROI):**
- Monthly cost or loss the solution removes: {currency} {loss}
- Annual gain for the client: {currency} {annual_gain}

**Fixed tool costs (non-negotiable):**
- Total one-time cost: {currency} {one_time}
- Total monthly cost: {currency} {monthly}

**Our original quote (value-based plus fixed costs):**
- Implementation: {currency} {quote_implementation}
- Recurring: {currency} {quote_recurring}/month

**Client counter-offer:**
- Implementation: {currency} {offer_implementation}
- Recurring: {currency} {offer_recurring}/month

**Your task:**
1. Check whether the counter-offer covers at least the fixed tool costs ({currency} {one_time} on implementation and {currency} {monthly} on recurring).
2. Assess whether the counter-offer undervalues the solution or compromises the profit margin.
3. Recommend exactly one of ACCEPT, COUNTER or DECLINE. You MUST recommend DECLINE when the offer does not cover the fixed tool costs.
4. When recommending COUNTER, provide newOffer with implementationFee >= {one_time} and recurringFee >= {monthly}. Omit newOffer for ACCEPT and DECLINE.
5. Write suggestedResponse as a strategic message to the client that brings the conversation back to VALUE; tool costs may be mentioned subtly if needed.
6. The currency is {currency}; return plain numbers in the price fields.",
            loss = project.estimated_monthly_loss,
            annual_gain = project.annual_gain(),
            one_time = costs.total_one_time,
            monthly = costs.total_monthly,
            quote_implementation = quote.implementation_fee,
            quote_recurring = quote.recurring_fee,
            offer_implementation = offer.implementation,
            offer_recurring = offer.recurring,
        );

        GenerationRequest {
            kind: RequestKind::CounterOfferAnalysis,
            prompt,
            shape: Some(schemas::counter_offer_shape()),
        }
    }

    pub fn chat_request(
        &self,
        project: &ProjectData,
        costs: &AggregatedCosts,
        quote: &Quote,
        history: &[ChatMessage],
    ) -> GenerationRequest {
        let currency = &self.currency;
        let transcript = history
            .iter()
            .map(|message| format!("{}: {}", message.sender.label(), message.text))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "{ADVISOR_PERSONA} You are in a conversation helping the user negotiate a project quote.
Be concise, tactical and direct. Give actionable advice.

**Project and quote summary:**
- Process to optimize: {process}
- Monthly cost or loss the solution removes: {currency} {loss}
- Proposed implementation fee: {currency} {implementation}
- Proposed recurring fee: {currency} {recurring}/month
- Tools and technologies (costs included in the quote):
{tools}

**Conversation so far:**
{transcript}

**Your task:**
Using all of the context above, answer ONLY the most recent User message, helpfully and strategically. \
Remember that tool costs are fixed.",
            process = project.process_to_optimize,
            loss = project.estimated_monthly_loss,
            implementation = quote.implementation_fee,
            recurring = quote.recurring_fee,
            tools = costs.summary,
        );

        GenerationRequest { kind: RequestKind::ChatTurn, prompt, shape: None }
    }

    /// Stronger-directive variant of a quote or analysis request, used for the
    /// single retry after a cost-floor breach.
    pub fn reinforce_cost_floor(
        &self,
        request: &GenerationRequest,
        costs: &AggregatedCosts,
    ) -> GenerationRequest {
        let currency = &self.currency;
        let directive = match request.kind {
            RequestKind::Quote => format!(
                "Your previous answer undercut the fixed tool costs. implementationFee MUST be at least \
{currency} {one_time} and recurringFee MUST be at least {currency} {monthly}. Answers below these \
figures are rejected.",
                one_time = costs.total_one_time,
                monthly = costs.total_monthly,
            ),
            RequestKind::CounterOfferAnalysis => format!(
                "Your previous answer accepted or proposed figures below the fixed tool costs. Any \
accepted or newly offered implementation figure MUST be at least {currency} {one_time} and any \
recurring figure MUST be at least {currency} {monthly}. Recommend DECLINE if the client's offer \
cannot reach these figures.",
                one_time = costs.total_one_time,
                monthly = costs.total_monthly,
            ),
            RequestKind::ChatTurn => return request.clone(),
        };

        GenerationRequest {
            kind: request.kind,
            prompt: format!("{}\n\n**MANDATORY COST FLOOR:**\n{directive}", request.prompt),
            shape: request.shape.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::PromptBuilder;
    use crate::cpq::aggregate_costs;
    use crate::domain::chat::ChatMessage;
    use crate::domain::project::fixtures::project_fixture;
    use crate::domain::quote::{ClientCounterOffer, Quote};
    use crate::generation::RequestKind;
    use crate::prompts::schemas::{COUNTER_OFFER_SHAPE_NAME, QUOTE_SHAPE_NAME};

    fn quote() -> Quote {
        Quote {
            implementation_fee: Decimal::from(45_000),
            recurring_fee: Decimal::from(5_000),
            reasoning: "Pays for itself in two months".to_string(),
        }
    }

    #[test]
    fn quote_request_embeds_costs_and_floor_instruction() {
        let project = project_fixture();
        let costs = aggregate_costs(&project.tools);

        let request = PromptBuilder::new("BRL").quote_request(&project, &costs);

        assert_eq!(request.kind, RequestKind::Quote);
        assert_eq!(request.shape.as_ref().map(|shape| shape.name), Some(QUOTE_SHAPE_NAME));
        assert!(request.prompt.contains("Total one-time tool cost: BRL 2000"));
        assert!(request.prompt.contains("Total monthly tool cost: BRL 500"));
        assert!(request.prompt.contains("implementationFee MUST be (your value-based implementation price) + 2000"));
        assert!(request.prompt.contains("recurringFee MUST be (your value-based recurring price) + 500"));
        assert!(request.prompt.contains("Invoice reconciliation"));
        assert!(request.prompt.contains("- Workflow engine license: 2000 (one-time)"));
    }

    #[test]
    fn counter_offer_request_embeds_quote_offer_and_decline_rule() {
        let project = project_fixture();
        let costs = aggregate_costs(&project.tools);
        let offer = ClientCounterOffer {
            implementation: Decimal::from(40_000),
            recurring: Decimal::from(4_500),
        };

        let request =
            PromptBuilder::default().counter_offer_request(&project, &costs, &quote(), &offer);

        assert_eq!(request.kind, RequestKind::CounterOfferAnalysis);
        assert_eq!(request.shape.as_ref().map(|shape| shape.name), Some(COUNTER_OFFER_SHAPE_NAME));
        assert!(request.prompt.contains("Implementation: BRL 45000"));
        assert!(request.prompt.contains("Implementation: BRL 40000"));
        assert!(request.prompt.contains("Annual gain for the client: BRL 300000"));
        assert!(request.prompt.contains("MUST recommend DECLINE"));
    }

    #[test]
    fn chat_request_replays_transcript_without_schema() {
        let project = project_fixture();
        let costs = aggregate_costs(&project.tools);
        let history = vec![
            ChatMessage::user("They say it's too expensive"),
            ChatMessage::advisor("Ask what the delay costs them"),
            ChatMessage::user("And if they push back again?"),
        ];

        let request = PromptBuilder::default().chat_request(&project, &costs, &quote(), &history);

        assert_eq!(request.kind, RequestKind::ChatTurn);
        assert!(request.shape.is_none());
        assert!(request.prompt.contains(
            "User: They say it's too expensive\nAdvisor: Ask what the delay costs them\nUser: And if they push back again?"
        ));
        assert!(request.prompt.contains("answer ONLY the most recent User message"));
    }

    #[test]
    fn reinforced_request_keeps_shape_and_appends_floor() {
        let project = project_fixture();
        let costs = aggregate_costs(&project.tools);
        let builder = PromptBuilder::default();
        let request = builder.quote_request(&project, &costs);

        let reinforced = builder.reinforce_cost_floor(&request, &costs);

        assert!(reinforced.prompt.starts_with(&request.prompt));
        assert!(reinforced.prompt.contains("MANDATORY COST FLOOR"));
        assert!(reinforced.prompt.contains("at least BRL 2000"));
        assert_eq!(reinforced.shape, request.shape);
    }
}
