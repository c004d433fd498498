//! Cost estimation from gateway usage and catalog pricing

use super::catalog::ModelPricing;
use super::stage::LlmUsage;

/// Estimated USD cost of one gateway call.
///
/// `None` when either pricing side is unknown or the result is not positive.
pub fn estimate_cost(usage: &LlmUsage, pricing: &ModelPricing) -> Option<f64> {
    let prompt = pricing.prompt?;
    let completion = pricing.completion?;
    let cost = usage.prompt_tokens as f64 * prompt / 1_000_000.0
        + usage.completion_tokens as f64 * completion / 1_000_000.0;
    (cost > 0.0).then_some(cost)
}
