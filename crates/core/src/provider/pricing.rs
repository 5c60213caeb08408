//! Per-model token pricing used when a backend does not report cost itself.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// USD price per million tokens for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: String,
    pub input_per_million: f64,
    pub output_per_million: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    by_model: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn new(entries: impl IntoIterator<Item = ModelPricing>) -> Self {
        Self {
            by_model: entries
                .into_iter()
                .map(|entry| (entry.model.clone(), entry))
                .collect(),
        }
    }

    /// Estimated cost, or `None` for an unpriced model.
    ///
    /// Vendor-qualified names ("openai/gpt-4o") fall back to the bare model name.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> Option<f64> {
        let pricing = self.by_model.get(model).or_else(|| {
            model
                .rsplit_once('/')
                .and_then(|(_, bare)| self.by_model.get(bare))
        })?;
        Some(
            input_tokens as f64 * pricing.input_per_million / 1_000_000.0
                + output_tokens as f64 * pricing.output_per_million / 1_000_000.0,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.by_model.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PricingTable {
        PricingTable::new([ModelPricing {
            model: "gpt-4o-mini".to_string(),
            input_per_million: 0.15,
            output_per_million: 0.60,
        }])
    }

    #[test]
    fn test_cost_for_known_model() {
        let cost = table().cost("gpt-4o-mini", 1_000_000, 500_000).unwrap();
        assert!((cost - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_vendor_qualified_name_falls_back() {
        assert!(table().cost("openai/gpt-4o-mini", 10, 10).is_some());
        assert!(table().cost("unknown-model", 10, 10).is_none());
    }
}
