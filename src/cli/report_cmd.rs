use anyhow::{Context, Result};
use chrono::Utc;

use crate::cli::output::{print_json, OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::config::AppConfig;
use crate::core::models::record::DayWindow;
use crate::core::report;
use crate::core::store::JsonStore;

/// Print the yesterday/today comparison from the store without fetching.
pub fn run(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let store = JsonStore::new(config.data_path());
    let ledger = store.read_all().context("Failed to read usage store")?;
    let now = Utc::now();
    let cmp = report::compare(
        &ledger,
        &DayWindow::today(now),
        &DayWindow::yesterday(now),
        now,
    );

    match opts.format {
        OutputFormat::Json => print_json(&cmp, opts.pretty)?,
        OutputFormat::Text => println!("{}", renderer::render_comparison(&cmp, opts.use_color)),
    }
    Ok(())
}
