use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::cli::output::{print_json, OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::aggregate::OverlapPolicy;
use crate::core::collector::{refresh_day, DayOutcome};
use crate::core::config::AppConfig;
use crate::core::cost::pricing::PricingTable;
use crate::core::models::record::{DailyRecord, DayWindow};
use crate::core::providers::{self, ProviderError, UsageProvider};
use crate::core::store::JsonStore;

/// Everything one update run needs, built once from config.
pub struct UpdateContext {
    pub store: JsonStore,
    pub providers: Vec<Box<dyn UsageProvider>>,
    pub pricing: PricingTable,
    pub overlap: OverlapPolicy,
    /// Providers that could not be built; reported on every refreshed day.
    pub skipped: Vec<ProviderError>,
}

impl UpdateContext {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let pricing = PricingTable::load(config.settings.pricing_path.as_deref())
            .context("Failed to load pricing table")?;
        if pricing.is_empty() {
            tracing::warn!("pricing table is empty, models without native costs will be unpriced");
        } else {
            tracing::debug!(models = pricing.len(), "pricing table loaded");
        }

        let (providers, skipped) = providers::configured(config);
        for e in &skipped {
            tracing::warn!(error = %e, hint = e.provider().auth_hint(), "provider skipped");
        }
        if providers.is_empty() {
            tracing::warn!("no usage providers available");
        }

        Ok(Self {
            store: JsonStore::new(config.data_path()),
            providers,
            pricing,
            overlap: config.aggregate.overlap,
            skipped,
        })
    }

    async fn refresh(&self, window: &DayWindow) -> Result<DayOutcome> {
        let outcome = refresh_day(&self.store, &self.providers, window, &self.pricing, self.overlap)
            .await
            .with_context(|| format!("Failed to update usage for {}", window.label()))?;
        Ok(outcome.with_skipped(&self.skipped))
    }
}

#[derive(Serialize)]
struct OutcomeJson<'a> {
    date: String,
    stored: bool,
    succeeded: Vec<&'static str>,
    failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a DailyRecord>,
}

impl<'a> From<&'a DayOutcome> for OutcomeJson<'a> {
    fn from(o: &'a DayOutcome) -> Self {
        Self {
            date: o.window.label(),
            stored: o.record.is_some(),
            succeeded: o.succeeded.iter().map(|p| p.id()).collect(),
            failures: o.failures.iter().map(|e| e.to_string()).collect(),
            record: o.record.as_ref(),
        }
    }
}

fn print_outcomes(outcomes: &[DayOutcome], opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Json => {
            let json: Vec<OutcomeJson> = outcomes.iter().map(OutcomeJson::from).collect();
            print_json(&json, opts.pretty)
        }
        OutputFormat::Text => {
            for outcome in outcomes {
                println!("{}", renderer::render_outcome(outcome, opts.use_color));
            }
            Ok(())
        }
    }
}

/// Days refreshed by a plain `update`: yesterday (late usage still lands) and
/// today, or the one explicit date.
pub fn update_windows(date: Option<NaiveDate>, today: NaiveDate) -> Result<Vec<DayWindow>> {
    match date {
        Some(d) if d > today => anyhow::bail!("Cannot update {}: date is in the future", d),
        Some(d) => Ok(vec![DayWindow::utc(d)]),
        None => Ok(vec![
            DayWindow::utc(today - Duration::days(1)),
            DayWindow::utc(today),
        ]),
    }
}

/// The last `days` days ending today, oldest first.
pub fn backfill_windows(days: u32, today: NaiveDate) -> Vec<DayWindow> {
    (0..i64::from(days))
        .rev()
        .map(|ago| DayWindow::utc(today - Duration::days(ago)))
        .collect()
}

/// Refresh and store the given days. Store failures abort the run.
pub async fn run_update(ctx: &UpdateContext, windows: &[DayWindow]) -> Result<Vec<DayOutcome>> {
    let mut outcomes = Vec::with_capacity(windows.len());
    for window in windows {
        outcomes.push(ctx.refresh(window).await?);
    }
    Ok(outcomes)
}

pub async fn run(config: &AppConfig, date: Option<NaiveDate>, opts: &OutputOptions) -> Result<()> {
    let ctx = UpdateContext::from_config(config)?;
    let windows = update_windows(date, Utc::now().date_naive())?;
    let outcomes = run_update(&ctx, &windows).await?;
    print_outcomes(&outcomes, opts)
}

pub async fn backfill(config: &AppConfig, days: u32, opts: &OutputOptions) -> Result<()> {
    if days == 0 {
        anyhow::bail!("--days must be at least 1");
    }
    let ctx = UpdateContext::from_config(config)?;

    let mut outcomes = Vec::new();
    for window in backfill_windows(days, Utc::now().date_naive()) {
        if ctx.store.contains(window.date)? {
            tracing::info!(date = %window.label(), "already recorded, skipping");
            continue;
        }
        outcomes.push(ctx.refresh(&window).await?);
    }
    if outcomes.is_empty() && opts.format == OutputFormat::Text {
        println!("All {} days already recorded.", days);
        return Ok(());
    }
    print_outcomes(&outcomes, opts)
}
