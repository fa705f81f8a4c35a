use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token counts for one service line (e.g. "completions", "embeddings").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default)]
    pub requests: u64,
}

impl ServiceUsage {
    pub fn accumulate(&mut self, other: &ServiceUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cached_tokens += other.cached_tokens;
        self.requests += other.requests;
    }
}

/// Raw per-model usage for one provider and one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    /// Input tokens served from the provider cache. Zero when not reported.
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default)]
    pub requests: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, ServiceUsage>,
}

impl ModelUsage {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Input plus output tokens. Cached tokens are a subset of input.
    pub fn tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Add another usage entry for the same model into this one.
    pub fn accumulate(&mut self, other: &ModelUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cached_tokens += other.cached_tokens;
        self.requests += other.requests;
        for (service, counts) in &other.services {
            self.services
                .entry(service.clone())
                .or_default()
                .accumulate(counts);
        }
    }

    /// Record a service line and fold it into the model totals.
    pub fn add_service(&mut self, service: &str, counts: ServiceUsage) {
        self.input_tokens += counts.input_tokens;
        self.output_tokens += counts.output_tokens;
        self.cached_tokens += counts.cached_tokens;
        self.requests += counts.requests;
        self.services
            .entry(service.to_string())
            .or_default()
            .accumulate(&counts);
    }
}
