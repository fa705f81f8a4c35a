use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::config::AppConfig;
use crate::core::providers::Provider;

fn target_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path)
}

pub fn init(path: Option<&Path>) -> Result<()> {
    let path = target_path(path);
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    AppConfig::default()
        .save(&path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    println!("Generated config at {}", path.display());
    println!("  Usage data: {}", AppConfig::default_data_path().display());
    println!("  Set OPENAI_ADMIN_KEY (or openai.admin_key_path) to enable OpenAI usage.");
    Ok(())
}

pub fn path(path: Option<&Path>) -> Result<()> {
    println!("{}", target_path(path).display());
    Ok(())
}

pub fn check(path: Option<&Path>) -> Result<()> {
    let file = target_path(path);
    if !file.exists() {
        eprintln!("No config file found at {} (using defaults)", file.display());
    }

    let config = AppConfig::resolve(Some(&file))
        .with_context(|| format!("Failed to load config from {}", file.display()))?;

    let issues = config.validate();
    if !issues.is_empty() {
        eprintln!("Config issues found in {}:", file.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        anyhow::bail!("{} config issue(s)", issues.len());
    }

    println!("Config is valid: {}", file.display());
    println!("  Usage data:  {}", config.data_path().display());
    match &config.settings.pricing_path {
        Some(p) => println!("  Pricing:     {}", p.display()),
        None => println!("  Pricing:     built-in"),
    }
    let enabled: Vec<&str> = Provider::all()
        .iter()
        .filter(|p| match p {
            Provider::OpenAi => config.openai.enabled,
            Provider::Moonshot => config.moonshot.enabled,
        })
        .map(|p| p.id())
        .collect();
    if enabled.is_empty() {
        println!("  No providers enabled.");
    } else {
        println!("  Enabled providers: {}", enabled.join(", "));
    }
    println!("  Overlap policy: {:?}", config.aggregate.overlap);
    Ok(())
}
