use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-model token pricing in dollars per token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
    #[serde(default)]
    pub cached: f64,
}

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Failed to read pricing table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse pricing table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Negative rate for model '{0}'")]
    NegativeRate(String),
}

#[derive(Deserialize)]
struct NestedModel {
    #[serde(default)]
    pricing: PricingEntry,
}

/// Both layouts seen in the wild: `{"models": {id: {"pricing": {...}}}}` and
/// a flat `{id: {...}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PricingFile {
    Nested { models: BTreeMap<String, NestedModel> },
    Flat(BTreeMap<String, PricingEntry>),
}

/// Built-in rates for the Kimi family, used when no pricing file exists.
static BUILTIN: &[(&str, PricingEntry)] = &[
    (
        "kimi-k2",
        PricingEntry {
            input: 6e-7,
            output: 2.5e-6,
            cached: 1.5e-7,
        },
    ),
    (
        "kimi-k2-thinking",
        PricingEntry {
            input: 6e-7,
            output: 2.5e-6,
            cached: 1.5e-7,
        },
    ),
    (
        "kimi-k2-turbo-preview",
        PricingEntry {
            input: 1.15e-6,
            output: 8e-6,
            cached: 1.5e-7,
        },
    ),
    (
        "kimi-k2.5",
        PricingEntry {
            input: 6e-7,
            output: 3e-6,
            cached: 1e-7,
        },
    ),
];

/// Immutable model → rate mapping, loaded once per run and passed explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingTable {
    entries: BTreeMap<String, PricingEntry>,
}

/// Normalize a model name by stripping provider prefixes and date suffixes.
/// Examples:
///   "moonshot/kimi-k2.5" -> "kimi-k2.5"
///   "gpt-4o-mini-2024-07-18" -> "gpt-4o-mini"
///   "kimi-k2-20250711" -> "kimi-k2"
pub fn normalize_model(model: &str) -> String {
    let mut name = model.trim().to_lowercase();

    for prefix in ["moonshot/", "moonshotai/", "openai/"] {
        if let Some(stripped) = name.strip_prefix(prefix) {
            name = stripped.to_string();
        }
    }

    // "-2024-07-18"
    if let Some(tail) = name.len().checked_sub(11).filter(|i| *i > 0).and_then(|i| name.get(i..)) {
        let digits: String = tail.chars().filter(|c| *c != '-').collect();
        if tail.starts_with('-')
            && tail.as_bytes()[5] == b'-'
            && tail.as_bytes()[8] == b'-'
            && digits.len() == 8
            && digits.chars().all(|c| c.is_ascii_digit())
        {
            name.truncate(name.len() - 11);
            return name;
        }
    }

    // "-20250711"
    if let Some(tail) = name.len().checked_sub(9).filter(|i| *i > 0).and_then(|i| name.get(i..)) {
        if tail.starts_with('-') && tail[1..].chars().all(|c| c.is_ascii_digit()) {
            name.truncate(name.len() - 9);
        }
    }

    name
}

impl PricingTable {
    pub fn new(entries: impl IntoIterator<Item = (String, PricingEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN.iter().map(|(m, p)| (m.to_string(), *p)))
    }

    pub fn from_json(content: &str) -> Result<Self, PricingError> {
        let entries = match serde_json::from_str::<PricingFile>(content)? {
            PricingFile::Nested { models } => models
                .into_iter()
                .map(|(id, m)| (id, m.pricing))
                .collect::<BTreeMap<_, _>>(),
            PricingFile::Flat(map) => map,
        };
        for (model, p) in &entries {
            if p.input < 0.0 || p.output < 0.0 || p.cached < 0.0 {
                return Err(PricingError::NegativeRate(model.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Load from `path`, or fall back to the built-in table when no file is
    /// configured or the configured file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, PricingError> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "pricing table not found, using built-in rates");
                Ok(Self::builtin())
            }
            Err(source) => Err(PricingError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Look up pricing for a model name. Returns None if unknown.
    pub fn lookup(&self, model: &str) -> Option<&PricingEntry> {
        self.entries
            .get(model)
            .or_else(|| self.entries.get(&normalize_model(model)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
