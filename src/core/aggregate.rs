use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::cost::calculator::{derive_rates, price};
use crate::core::cost::pricing::PricingTable;
use crate::core::models::cost::{CostSource, ModelCost};
use crate::core::models::record::{DailyRecord, DayWindow, ProviderSlice, Summary};
use crate::core::models::usage::ModelUsage;
use crate::core::providers::fetch::ProviderUsage;

/// How to combine costs when two providers report the same model id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Add the costs together.
    #[default]
    Sum,
    /// Keep a natively reported cost and drop a computed one.
    PreferNative,
}

fn merge_usage(into: &mut BTreeMap<String, ModelUsage>, usage: &ModelUsage) {
    into.entry(usage.model.clone())
        .and_modify(|e| e.accumulate(usage))
        .or_insert_with(|| usage.clone());
}

fn merge_cost(
    into: &mut BTreeMap<String, ModelCost>,
    model: &str,
    cost: &ModelCost,
    policy: OverlapPolicy,
) {
    let Some(existing) = into.get_mut(model) else {
        into.insert(model.to_string(), cost.clone());
        return;
    };
    match policy {
        OverlapPolicy::Sum => existing.accumulate(cost),
        OverlapPolicy::PreferNative => {
            let had_native = existing.source == CostSource::Native;
            let is_native = cost.source == CostSource::Native;
            match (had_native, is_native) {
                (true, false) => {}
                (false, true) => *existing = cost.clone(),
                _ => existing.accumulate(cost),
            }
        }
    }
}

/// Usage and cost contributed by one provider fetch.
///
/// Providers that report cost natively keep their figures; everything else,
/// including models missing from a native cost report, is priced from the
/// table.
pub fn provider_slice(fetched: &ProviderUsage, table: &PricingTable) -> ProviderSlice {
    let mut usage = BTreeMap::new();
    for u in &fetched.usage {
        merge_usage(&mut usage, u);
    }

    let mut costs: BTreeMap<String, ModelCost> = fetched
        .costs
        .iter()
        .flatten()
        .map(|(model, c)| {
            let mut c = c.clone();
            c.source = CostSource::Native;
            c.per_token = derive_rates(&c, usage.get(model));
            (model.clone(), c)
        })
        .collect();
    for (model, u) in &usage {
        costs
            .entry(model.clone())
            .or_insert_with(|| price(u, table));
    }

    ProviderSlice { usage, costs }
}

/// Merge every provider's usage for `window` into one record.
///
/// Pure: the same inputs always produce the same record.
pub fn aggregate(
    window: &DayWindow,
    fetched: &[ProviderUsage],
    table: &PricingTable,
    policy: OverlapPolicy,
) -> DailyRecord {
    let mut record = DailyRecord::empty(window);

    for f in fetched {
        let slice = provider_slice(f, table);
        for u in slice.usage.values() {
            merge_usage(&mut record.usage, u);
        }
        for (model, c) in &slice.costs {
            merge_cost(&mut record.costs, model, c, policy);
        }

        let entry = record.providers.entry(f.provider).or_default();
        for u in slice.usage.values() {
            merge_usage(&mut entry.usage, u);
        }
        for (model, c) in &slice.costs {
            merge_cost(&mut entry.costs, model, c, OverlapPolicy::Sum);
        }
    }

    record.summary = Summary::from_usage(record.usage.values());
    record
}
