use crate::core::cost::pricing::PricingTable;
use crate::core::models::cost::{CostSource, ModelCost, TokenRates};
use crate::core::models::usage::ModelUsage;

/// Price one model's usage against the table.
///
/// Cached tokens are the part of `input_tokens` the provider served from its
/// cache: they are charged at the cached rate and the remainder at the input
/// rate. Unknown models yield an all-zero cost tagged `Unpriced`.
/// Rates are recorded only for token kinds that were actually used.
pub fn price(usage: &ModelUsage, table: &PricingTable) -> ModelCost {
    let Some(p) = table.lookup(&usage.model) else {
        return ModelCost::unpriced();
    };

    let fresh_input = usage.input_tokens.saturating_sub(usage.cached_tokens);
    let input = fresh_input as f64 * p.input;
    let output = usage.output_tokens as f64 * p.output;
    let cached = usage.cached_tokens as f64 * p.cached;

    let used = |tokens: u64, rate: f64| (tokens > 0).then_some(rate);
    ModelCost::new(input, output, cached, CostSource::Priced).with_rates(TokenRates {
        input: used(usage.input_tokens, p.input),
        output: used(usage.output_tokens, p.output),
        cached: used(usage.cached_tokens, p.cached),
    })
}

/// Effective rates for a natively reported cost: dollars spent per token of
/// each kind, `None` where no tokens of that kind were used.
pub fn derive_rates(cost: &ModelCost, usage: Option<&ModelUsage>) -> TokenRates {
    fn rate(amount: f64, tokens: u64) -> Option<f64> {
        if tokens == 0 {
            None
        } else {
            Some(amount / tokens as f64)
        }
    }

    let Some(u) = usage else {
        return TokenRates::default();
    };
    TokenRates {
        input: rate(cost.input, u.input_tokens),
        output: rate(cost.output, u.output_tokens),
        cached: rate(cost.cached, u.cached_tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cost::pricing::PricingEntry;

    fn table() -> PricingTable {
        PricingTable::new([
            (
                "gpt-5.1-codex-mini".to_string(),
                PricingEntry {
                    input: 0.0000000677,
                    output: 0.000002,
                    cached: 0.0,
                },
            ),
            (
                "kimi-k2.5".to_string(),
                PricingEntry {
                    input: 0.0000006,
                    output: 0.0,
                    cached: 0.0,
                },
            ),
            (
                "cached-model".to_string(),
                PricingEntry {
                    input: 0.000001,
                    output: 0.000004,
                    cached: 0.0000001,
                },
            ),
        ])
    }

    fn usage(model: &str, input: u64, output: u64, cached: u64, requests: u64) -> ModelUsage {
        ModelUsage {
            input_tokens: input,
            output_tokens: output,
            cached_tokens: cached,
            requests,
            ..ModelUsage::new(model)
        }
    }

    #[test]
    fn codex_mini_example_costs() {
        let cost = price(&usage("gpt-5.1-codex-mini", 18_429_385, 77_666, 0, 279), &table());
        assert!((cost.input - 1.2477).abs() < 1e-3, "input = {}", cost.input);
        assert!((cost.output - 0.155332).abs() < 1e-6, "output = {}", cost.output);
        assert_eq!(cost.cached, 0.0);
        assert_eq!(cost.source, CostSource::Priced);
    }

    #[test]
    fn total_equals_sum_of_components() {
        let t = table();
        for u in [
            usage("gpt-5.1-codex-mini", 18_429_385, 77_666, 0, 279),
            usage("kimi-k2.5", 158_000, 0, 0, 3),
            usage("cached-model", 1_000_000, 20_000, 400_000, 12),
            usage("cached-model", 0, 0, 0, 0),
        ] {
            let c = price(&u, &t);
            assert_eq!(c.total, c.input + c.output + c.cached);
        }
    }

    #[test]
    fn cached_tokens_charged_at_cached_rate() {
        let c = price(&usage("cached-model", 1_000_000, 0, 400_000, 1), &table());
        assert!((c.input - 0.6).abs() < 1e-9);
        assert!((c.cached - 0.04).abs() < 1e-9);
    }

    #[test]
    fn no_cached_tokens_means_no_cached_cost() {
        let c = price(&usage("cached-model", 1_000, 1_000, 0, 1), &table());
        assert_eq!(c.cached, 0.0);
    }

    #[test]
    fn unknown_model_is_flagged_unpriced() {
        let c = price(&usage("mystery-model", 500, 500, 0, 1), &table());
        assert!(c.is_unpriced());
        assert_eq!(c.total, 0.0);
    }

    #[test]
    fn priced_cost_carries_table_rates() {
        let c = price(&usage("kimi-k2.5", 10, 0, 0, 1), &table());
        assert_eq!(c.per_token.input, Some(0.0000006));
        assert!(c.per_token.output.is_none());
        assert!(c.per_token.cached.is_none());
    }

    #[test]
    fn derive_rates_divides_by_tokens() {
        let cost = ModelCost::new(2.0, 1.0, 0.0, CostSource::Native);
        let u = usage("gpt-5.1", 1_000_000, 100_000, 0, 10);
        let rates = derive_rates(&cost, Some(&u));
        assert!((rates.input.unwrap() - 2e-6).abs() < 1e-15);
        assert!((rates.output.unwrap() - 1e-5).abs() < 1e-15);
        assert!(rates.cached.is_none());
    }

    #[test]
    fn derive_rates_without_usage_is_empty() {
        let cost = ModelCost::new(2.0, 1.0, 0.0, CostSource::Native);
        assert_eq!(derive_rates(&cost, None), TokenRates::default());
    }
}
