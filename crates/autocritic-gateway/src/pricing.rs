use serde::{Deserialize, Serialize};

use crate::Usage;

/// Token prices in USD per 1K tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

// Longest prefix wins, so "gpt-4-32k" must not be shadowed by "gpt-4".
const PRICE_TABLE: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.000_15, 0.000_6),
    ("gpt-4o", 0.002_5, 0.01),
    ("gpt-4-32k", 0.06, 0.12),
    ("gpt-4", 0.03, 0.06),
    ("gpt-35-turbo", 0.001_5, 0.002),
    ("gpt-3.5-turbo", 0.001_5, 0.002),
];

impl Pricing {
    pub const fn new(prompt_per_1k: f64, completion_per_1k: f64) -> Self {
        Self {
            prompt_per_1k,
            completion_per_1k,
        }
    }

    /// Built-in prices for a model name; unknown models are free
    pub fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        PRICE_TABLE
            .iter()
            .filter(|(prefix, _, _)| model.starts_with(prefix))
            .max_by_key(|(prefix, _, _)| prefix.len())
            .map(|&(_, prompt, completion)| Self::new(prompt, completion))
            .unwrap_or_default()
    }

    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.prompt_per_1k
            + (completion_tokens as f64 / 1000.0) * self.completion_per_1k
    }

    /// Build a billed usage record for the given token counts
    pub fn usage(&self, prompt_tokens: u64, completion_tokens: u64) -> Usage {
        Usage {
            prompt_tokens,
            completion_tokens,
            cost_usd: self.cost(prompt_tokens, completion_tokens),
            billed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt4_prices() {
        let pricing = Pricing::for_model("gpt-4");
        assert!((pricing.cost(1000, 1000) - 0.09).abs() < 1e-9);
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(Pricing::for_model("gpt-4-32k-0613"), Pricing::new(0.06, 0.12));
        assert_eq!(
            Pricing::for_model("gpt-4o-mini-2024-07-18"),
            Pricing::new(0.000_15, 0.000_6)
        );
        assert_eq!(Pricing::for_model("GPT-4-0613"), Pricing::new(0.03, 0.06));
    }

    #[test]
    fn test_unknown_model_is_free() {
        let usage = Pricing::for_model("llama3").usage(500, 200);
        assert_eq!(usage.cost_usd, 0.0);
        assert!(usage.billed);
        assert_eq!(usage.total_tokens(), 700);
    }
}
