use serde::{Deserialize, Serialize};

/// Where a cost figure came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    /// Reported directly by the provider's billing API.
    Native,
    /// Computed from token counts and the pricing table.
    #[default]
    Priced,
    /// No pricing entry matched; every component is zero.
    Unpriced,
}

/// Effective per-token rates behind a cost entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRates {
    pub input: Option<f64>,
    pub output: Option<f64>,
    pub cached: Option<f64>,
}

/// Cost breakdown for one model on one day, in dollars.
///
/// `total` is always `input + output + cached`; it is stored so the JSON
/// document is self-describing, but never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    pub input: f64,
    pub output: f64,
    pub cached: f64,
    pub total: f64,
    #[serde(default)]
    pub per_token: TokenRates,
    #[serde(default)]
    pub source: CostSource,
}

impl ModelCost {
    pub fn new(input: f64, output: f64, cached: f64, source: CostSource) -> Self {
        Self {
            input,
            output,
            cached,
            total: input + output + cached,
            per_token: TokenRates::default(),
            source,
        }
    }

    pub fn unpriced() -> Self {
        Self::new(0.0, 0.0, 0.0, CostSource::Unpriced)
    }

    pub fn is_unpriced(&self) -> bool {
        self.source == CostSource::Unpriced
    }

    pub fn with_rates(mut self, per_token: TokenRates) -> Self {
        self.per_token = per_token;
        self
    }

    /// Sum another cost for the same model into this one.
    ///
    /// Rates are dropped because a blended rate across providers is
    /// meaningless. The merged entry stays unpriced only if both sides were.
    pub fn accumulate(&mut self, other: &ModelCost) {
        self.input += other.input;
        self.output += other.output;
        self.cached += other.cached;
        self.total = self.input + self.output + self.cached;
        self.per_token = TokenRates::default();
        self.source = match (self.source, other.source) {
            (CostSource::Unpriced, CostSource::Unpriced) => CostSource::Unpriced,
            (CostSource::Native, _) | (_, CostSource::Native) => CostSource::Native,
            _ => CostSource::Priced,
        };
    }
}
