use anyhow::{Context, Result};
use serde::Serialize;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
}

/// Resolve colour from the `--no-color` flag, `NO_COLOR`, the config's
/// `settings.color` (`auto`/`always`/`never`) and whether stdout is a TTY.
pub fn detect_color(color_flag: bool, setting: &str) -> bool {
    if !color_flag || std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    match setting {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal(),
    }
}

pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
