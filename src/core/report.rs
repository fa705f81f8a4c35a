use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::formatter::{
    format_rate, format_token_delta, format_tokens, format_usd, format_usd_delta,
};
use crate::core::models::cost::TokenRates;
use crate::core::models::record::{DailyRecord, DayWindow, Ledger, Summary};
use crate::core::providers::Provider;
use crate::core::store::{JsonStore, StoreError};

/// Minimum elapsed time used for the 24h projection, so a run at 00:00
/// doesn't divide by zero.
const MIN_ELAPSED_HOURS: f64 = 0.01;

/// Plain-text notification body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSpend {
    pub provider: Provider,
    pub cost: f64,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub requests_per_hour: f64,
    pub projected_requests: f64,
    pub projected_spend: f64,
}

/// One day as the reporter sees it.
#[derive(Debug, Clone, Serialize)]
pub struct DaySnapshot {
    pub label: String,
    pub date: NaiveDate,
    /// False when the store had no record and zeros were substituted.
    pub recorded: bool,
    pub total_cost: f64,
    pub providers: Vec<ProviderSpend>,
    pub summary: Summary,
    pub cost_per_query: f64,
    pub avg_input_per_query: f64,
    pub avg_output_per_query: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelDelta {
    pub model: String,
    pub providers: Vec<Provider>,
    pub yesterday_tokens: u64,
    pub today_tokens: u64,
    pub yesterday_cost: f64,
    pub today_cost: f64,
    pub yesterday_rates: TokenRates,
    pub today_rates: TokenRates,
    pub token_delta: i64,
    pub cost_delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub generated_at: DateTime<Utc>,
    pub today: DaySnapshot,
    pub yesterday: DaySnapshot,
    /// today − yesterday
    pub token_delta: i64,
    pub cost_delta: f64,
    pub models: Vec<ModelDelta>,
}

fn per_query(value: f64, requests: u64) -> f64 {
    if requests == 0 {
        0.0
    } else {
        value / requests as f64
    }
}

fn token_delta(today: u64, yesterday: u64) -> i64 {
    (today as i128 - yesterday as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn snapshot(
    label: &str,
    window: &DayWindow,
    record: Option<&DailyRecord>,
    now: Option<DateTime<Utc>>,
) -> DaySnapshot {
    let empty;
    let (record, recorded) = match record {
        Some(r) => (r, true),
        None => {
            empty = DailyRecord::empty(window);
            (&empty, false)
        }
    };

    let total_cost = record.total_cost();
    let summary = record.summary.clone();
    let cost_per_query = per_query(total_cost, summary.requests);

    let providers = Provider::all()
        .iter()
        .map(|&provider| ProviderSpend {
            provider,
            cost: record.provider_cost(provider),
            models: record
                .usage
                .keys()
                .filter(|m| record.providers_of(m).contains(&provider))
                .cloned()
                .collect(),
        })
        .collect();

    let projection = now.map(|now| {
        let start = record.start.with_timezone(&Utc);
        let elapsed_hours = ((now - start).num_milliseconds() as f64 / 3_600_000.0)
            .max(MIN_ELAPSED_HOURS);
        let requests_per_hour = summary.requests as f64 / elapsed_hours;
        let projected_requests = requests_per_hour * 24.0;
        Projection {
            requests_per_hour,
            projected_requests,
            projected_spend: cost_per_query * projected_requests,
        }
    });

    DaySnapshot {
        label: label.to_string(),
        date: window.date,
        recorded,
        total_cost,
        providers,
        avg_input_per_query: per_query(summary.input as f64, summary.requests),
        avg_output_per_query: per_query(summary.output as f64, summary.requests),
        summary,
        cost_per_query,
        projection,
    }
}

fn model_deltas(today: Option<&DailyRecord>, yesterday: Option<&DailyRecord>) -> Vec<ModelDelta> {
    let models: BTreeSet<&str> = [today, yesterday]
        .into_iter()
        .flatten()
        .flat_map(|r| r.usage.keys().chain(r.costs.keys()))
        .map(String::as_str)
        .collect();

    let tokens = |r: Option<&DailyRecord>, m: &str| {
        r.and_then(|r| r.usage.get(m)).map(|u| u.tokens()).unwrap_or(0)
    };
    let cost = |r: Option<&DailyRecord>, m: &str| {
        r.and_then(|r| r.costs.get(m)).map(|c| c.total).unwrap_or(0.0)
    };
    let rates = |r: Option<&DailyRecord>, m: &str| {
        r.and_then(|r| r.costs.get(m))
            .map(|c| c.per_token)
            .unwrap_or_default()
    };

    models
        .into_iter()
        .map(|model| {
            let mut providers: Vec<Provider> = [today, yesterday]
                .into_iter()
                .flatten()
                .flat_map(|r| r.providers_of(model))
                .collect();
            providers.sort();
            providers.dedup();

            let (t_tokens, y_tokens) = (tokens(today, model), tokens(yesterday, model));
            let (t_cost, y_cost) = (cost(today, model), cost(yesterday, model));
            ModelDelta {
                model: model.to_string(),
                providers,
                yesterday_tokens: y_tokens,
                today_tokens: t_tokens,
                yesterday_cost: y_cost,
                today_cost: t_cost,
                yesterday_rates: rates(yesterday, model),
                today_rates: rates(today, model),
                token_delta: token_delta(t_tokens, y_tokens),
                cost_delta: t_cost - y_cost,
            }
        })
        .collect()
}

/// Compare today's record against yesterday's. Missing days count as zero.
pub fn compare(
    ledger: &Ledger,
    today: &DayWindow,
    yesterday: &DayWindow,
    now: DateTime<Utc>,
) -> Comparison {
    let t = ledger.get(&today.date);
    let y = ledger.get(&yesterday.date);
    let today_snap = snapshot("Today", today, t, Some(now));
    let yesterday_snap = snapshot("Yesterday", yesterday, y, None);

    Comparison {
        generated_at: now,
        token_delta: token_delta(today_snap.summary.tokens, yesterday_snap.summary.tokens),
        cost_delta: today_snap.total_cost - yesterday_snap.total_cost,
        models: model_deltas(t, y),
        today: today_snap,
        yesterday: yesterday_snap,
    }
}

/// Read both days from the store and format the notification body.
pub fn build_comparison(
    store: &JsonStore,
    today: &DayWindow,
    yesterday: &DayWindow,
    now: DateTime<Utc>,
) -> Result<Message, StoreError> {
    let ledger = store.read_all()?;
    Ok(compare(&ledger, today, yesterday, now).to_message())
}

/// Failure notice sent when the update path could not complete.
pub fn failure_message(error: &anyhow::Error) -> Message {
    Message {
        text: format!("Token usage report failed:\n{:#}", error),
    }
}

fn provider_label(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join("+")
}

impl DaySnapshot {
    pub fn lines(&self) -> Vec<String> {
        let label = &self.label;
        let split = self
            .providers
            .iter()
            .map(|p| format!("{}: {}", p.provider.display_name(), format_usd(p.cost)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut lines = vec![format!(
            "{} total spend: {} ({})",
            label,
            format_usd(self.total_cost),
            split
        )];
        if let Some(p) = &self.projection {
            lines.push(format!(
                "{} projected spend (24h trend): {} based on {:.2} requests/hour",
                label,
                format_usd(p.projected_spend),
                p.requests_per_hour
            ));
        }
        lines.push(format!("{} cost per query: ${:.6}", label, self.cost_per_query));
        lines.push(format!("{} avg tokens in per query: {:.1}", label, self.avg_input_per_query));
        lines.push(format!("{} avg tokens out per query: {:.1}", label, self.avg_output_per_query));
        for p in &self.providers {
            if !p.models.is_empty() {
                lines.push(format!(
                    "{} {} models: {}",
                    label,
                    p.provider.display_name(),
                    p.models.join(", ")
                ));
            }
        }
        lines
    }
}

impl ModelDelta {
    pub fn line(&self) -> String {
        format!(
            "{} {}: yesterday {} tokens / {} (in {}, out {}) | today {} tokens / {} (in {}, out {}) | delta tokens {} | delta cost {}",
            provider_label(&self.providers),
            self.model,
            format_tokens(self.yesterday_tokens),
            format_usd(self.yesterday_cost),
            format_rate(self.yesterday_rates.input),
            format_rate(self.yesterday_rates.output),
            format_tokens(self.today_tokens),
            format_usd(self.today_cost),
            format_rate(self.today_rates.input),
            format_rate(self.today_rates.output),
            format_token_delta(self.token_delta),
            format_usd_delta(self.cost_delta),
        )
    }
}

impl Comparison {
    pub fn to_message(&self) -> Message {
        let mut lines = self.today.lines();
        lines.push(String::new());
        lines.extend(self.yesterday.lines());
        if !self.models.is_empty() {
            lines.push(String::new());
            lines.push("Daily comparison (tokens + costs) by model".to_string());
            lines.extend(self.models.iter().map(ModelDelta::line));
        }
        lines.push(String::new());
        lines.push(format!(
            "Total: delta tokens {} | delta cost {}",
            format_token_delta(self.token_delta),
            format_usd_delta(self.cost_delta)
        ));
        Message {
            text: lines.join("\n"),
        }
    }
}
