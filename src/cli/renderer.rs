use colored::{control, ColoredString, Colorize};

use crate::core::collector::DayOutcome;
use crate::core::formatter::{
    format_token_delta, format_tokens, format_tokens_compact, format_usd, format_usd_delta,
};
use crate::core::report::{Comparison, DaySnapshot, ModelDelta};

/// Render the yesterday/today comparison as a colored (or plain) block.
///
/// Layout:
/// ```text
///  Today 2026-02-07
///   Spend      $0.09480  (OpenAI $0.00000, Moonshot $0.09480)
///   Projected  $0.18960  (0.25 requests/hour)
///   Tokens     158.0K    (158,000 in / 0 out)
///   Requests   3         ($0.031600 per query)
///   Moonshot   kimi-k2.5
///
///  Yesterday 2026-02-06
///   ...
///
///  Change
///   Tokens     +158,000
///   Spend      $+0.09480
///   By Model:
///     kimi-k2.5                 Moonshot  +158,000  $+0.09480
/// ```
pub fn render_comparison(cmp: &Comparison, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines = Vec::new();
    render_day(&mut lines, &cmp.today);
    lines.push(String::new());
    render_day(&mut lines, &cmp.yesterday);
    lines.push(String::new());

    lines.push(" Change".bold().to_string());
    lines.push(format!(
        "  {}  {}",
        label("Tokens"),
        format_token_delta(cmp.token_delta)
    ));
    lines.push(format!(
        "  {}  {}",
        label("Spend"),
        color_cost_delta(cmp.cost_delta)
    ));
    if !cmp.models.is_empty() {
        lines.push(format!("  {}:", "By Model".cyan()));
        for m in &cmp.models {
            lines.push(render_model_delta(m));
        }
    }

    lines.join("\n")
}

/// One block per refreshed day, for `update` and `backfill`.
pub fn render_outcome(outcome: &DayOutcome, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines = Vec::new();
    let date = outcome.window.label();
    match &outcome.record {
        Some(record) => {
            let status = if outcome.is_partial() {
                "partial".yellow()
            } else {
                "stored".green()
            };
            lines.push(format!(" {} {}", date.bold(), status));
            lines.push(format!(
                "  {}  {} tokens, {} requests, {}",
                label("Usage"),
                format_tokens(record.summary.tokens),
                format_tokens(record.summary.requests),
                format_usd(record.total_cost())
            ));
            let unpriced = record.unpriced_models();
            if !unpriced.is_empty() {
                lines.push(format!(
                    "  {}  {}",
                    label("Unpriced"),
                    unpriced.join(", ").yellow()
                ));
            }
        }
        None => lines.push(format!(" {} {}", date.bold(), "not updated".red())),
    }
    for failure in &outcome.failures {
        lines.push(format!("  {}  {}", label("Skipped"), failure.to_string().dimmed()));
    }
    lines.join("\n")
}

fn render_day(lines: &mut Vec<String>, day: &DaySnapshot) {
    let mut header = format!(" {} {}", day.label, day.date).bold().to_string();
    if !day.recorded {
        header.push_str(&format!(" {}", "(no data)".dimmed()));
    }
    lines.push(header);

    let split = day
        .providers
        .iter()
        .map(|p| format!("{} {}", p.provider.display_name(), format_usd(p.cost)))
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(format!(
        "  {}  {:<9} ({})",
        label("Spend"),
        format_usd(day.total_cost),
        split
    ));
    if let Some(p) = &day.projection {
        lines.push(format!(
            "  {}  {:<9} ({:.2} requests/hour)",
            label("Projected"),
            format_usd(p.projected_spend),
            p.requests_per_hour
        ));
    }
    lines.push(format!(
        "  {}  {:<9} ({} in / {} out)",
        label("Tokens"),
        format_tokens_compact(day.summary.tokens),
        format_tokens(day.summary.input),
        format_tokens(day.summary.output)
    ));
    lines.push(format!(
        "  {}  {:<9} (${:.6} per query)",
        label("Requests"),
        day.summary.requests,
        day.cost_per_query
    ));
    for p in day.providers.iter().filter(|p| !p.models.is_empty()) {
        lines.push(format!(
            "  {}  {}",
            label(p.provider.display_name()),
            p.models.join(", ")
        ));
    }
}

fn render_model_delta(m: &ModelDelta) -> String {
    let providers = m
        .providers
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join("+");
    format!(
        "    {:<26} {:<9} {:>12}  {}",
        m.model,
        providers,
        format_token_delta(m.token_delta),
        color_cost_delta(m.cost_delta)
    )
}

/// Pad label to 9 chars for alignment.
fn label(text: &str) -> ColoredString {
    format!("{:<9}", text).cyan()
}

/// More spend is red, less is green.
fn color_cost_delta(delta: f64) -> ColoredString {
    let text = format_usd_delta(delta);
    if delta > 0.0 {
        text.red()
    } else if delta < 0.0 {
        text.green()
    } else {
        text.normal()
    }
}
