use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::models::cost::ModelCost;
use crate::core::models::usage::ModelUsage;
use crate::core::providers::Provider;

/// The whole persisted document: one record per calendar date.
pub type Ledger = BTreeMap<NaiveDate, DailyRecord>;

/// A UTC calendar day, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn utc(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        Self {
            date,
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn today(now: DateTime<Utc>) -> Self {
        Self::utc(now.date_naive())
    }

    pub fn yesterday(now: DateTime<Utc>) -> Self {
        Self::utc(now.date_naive() - Duration::days(1))
    }

    /// `YYYY-MM-DD`, the key used in the persisted document.
    pub fn label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Cross-model totals for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub tokens: u64,
    pub requests: u64,
    pub avg_tokens_per_request: f64,
    pub input: u64,
    pub output: u64,
}

impl Summary {
    pub fn from_usage<'a>(usage: impl IntoIterator<Item = &'a ModelUsage>) -> Self {
        let mut summary = Summary::default();
        for u in usage {
            summary.input += u.input_tokens;
            summary.output += u.output_tokens;
            summary.requests += u.requests;
        }
        summary.tokens = summary.input + summary.output;
        summary.avg_tokens_per_request = if summary.requests == 0 {
            0.0
        } else {
            summary.tokens as f64 / summary.requests as f64
        };
        summary
    }
}

/// What a single provider contributed to a day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSlice {
    #[serde(default)]
    pub usage: BTreeMap<String, ModelUsage>,
    #[serde(default)]
    pub costs: BTreeMap<String, ModelCost>,
}

impl ProviderSlice {
    pub fn total_cost(&self) -> f64 {
        self.costs.values().fold(0.0, |acc, c| acc + c.total)
    }
}

/// Aggregated usage, cost and summary for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(default)]
    pub usage: BTreeMap<String, ModelUsage>,
    #[serde(default)]
    pub costs: BTreeMap<String, ModelCost>,
    #[serde(default)]
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub providers: BTreeMap<Provider, ProviderSlice>,
}

impl DailyRecord {
    /// An all-zero record covering `window`.
    pub fn empty(window: &DayWindow) -> Self {
        Self {
            start: window.start.with_timezone(&Utc.fix()),
            end: window.end.with_timezone(&Utc.fix()),
            usage: BTreeMap::new(),
            costs: BTreeMap::new(),
            summary: Summary::default(),
            providers: BTreeMap::new(),
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.costs.values().fold(0.0, |acc, c| acc + c.total)
    }

    /// Models whose cost could not be computed from the pricing table.
    pub fn unpriced_models(&self) -> Vec<&str> {
        self.costs
            .iter()
            .filter(|(_, c)| c.is_unpriced())
            .map(|(m, _)| m.as_str())
            .collect()
    }

    /// Providers that reported `model` on this day.
    ///
    /// Records written before per-provider slices existed fall back to a
    /// guess from the model name.
    pub fn providers_of(&self, model: &str) -> Vec<Provider> {
        let found: Vec<Provider> = self
            .providers
            .iter()
            .filter(|(_, slice)| slice.usage.contains_key(model) || slice.costs.contains_key(model))
            .map(|(p, _)| *p)
            .collect();
        if found.is_empty() {
            vec![Provider::guess_from_model(model)]
        } else {
            found
        }
    }

    /// Spend attributed to `provider`.
    pub fn provider_cost(&self, provider: Provider) -> f64 {
        if self.providers.is_empty() {
            return self
                .costs
                .iter()
                .filter(|(m, _)| Provider::guess_from_model(m) == provider)
                .fold(0.0, |acc, (_, c)| acc + c.total);
        }
        self.providers
            .get(&provider)
            .map(ProviderSlice::total_cost)
            .unwrap_or(0.0)
    }
}
