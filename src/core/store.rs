use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::models::record::{DailyRecord, Ledger};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Usage store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to access usage store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize usage store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Date-keyed daily records persisted as one JSON document.
///
/// Writers assume runs never overlap; the only protection is that a write
/// either fully replaces the document or leaves it untouched.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the whole document. A missing file is an empty ledger.
    pub fn load(&self) -> Result<Ledger, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Read-only view for the dashboard and reporter.
    pub fn read_all(&self) -> Result<Ledger, StoreError> {
        self.load()
    }

    pub fn get(&self, date: NaiveDate) -> Result<Option<DailyRecord>, StoreError> {
        Ok(self.load()?.remove(&date))
    }

    pub fn contains(&self, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self.get(date)?.is_some())
    }

    /// Replace the entry for `date` wholesale and write the document back.
    ///
    /// A corrupt document aborts before anything is written.
    pub fn upsert(&self, date: NaiveDate, record: DailyRecord) -> Result<(), StoreError> {
        let mut ledger = self.load()?;
        ledger.insert(date, record);
        self.write(&ledger)
    }

    /// Write to a sibling temp file, sync, then rename over the document.
    fn write(&self, ledger: &Ledger) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let content = serde_json::to_string_pretty(ledger)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp_path).map_err(|e| self.io_err(e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| self.io_err(e))?;
            file.write_all(b"\n").map_err(|e| self.io_err(e))?;
            file.sync_all().map_err(|e| self.io_err(e))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))?;
        tracing::debug!(path = %self.path.display(), days = ledger.len(), "usage store written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::record::{DayWindow, Summary};
    use crate::core::models::usage::ModelUsage;

    fn date(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    fn record_with_tokens(day: NaiveDate, model: &str, tokens: u64) -> DailyRecord {
        let mut record = DailyRecord::empty(&DayWindow::utc(day));
        let usage = ModelUsage {
            input_tokens: tokens,
            requests: 1,
            ..ModelUsage::new(model)
        };
        record.usage.insert(model.to_string(), usage);
        record.summary = Summary::from_usage(record.usage.values());
        record
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("token_usage.json"));
        assert!(store.load().unwrap().is_empty());
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn upsert_same_date_keeps_only_last_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("data").join("token_usage.json"));
        let day = date("2026-02-07");

        store.upsert(day, record_with_tokens(day, "old-model", 100)).unwrap();
        store.upsert(day, record_with_tokens(day, "new-model", 250)).unwrap();

        let ledger = store.load().unwrap();
        assert_eq!(ledger.len(), 1);
        let record = &ledger[&day];
        assert_eq!(record.summary.tokens, 250);
        assert!(!record.usage.contains_key("old-model"));
    }

    #[test]
    fn upsert_preserves_other_dates() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("token_usage.json"));
        let d1 = date("2026-02-06");
        let d2 = date("2026-02-07");
        store.upsert(d1, record_with_tokens(d1, "a", 10)).unwrap();
        store.upsert(d2, record_with_tokens(d2, "b", 20)).unwrap();

        assert_eq!(store.get(d1).unwrap().unwrap().summary.tokens, 10);
        assert!(store.contains(d2).unwrap());
        assert!(!store.contains(date("2026-02-08")).unwrap());
    }

    #[test]
    fn document_is_keyed_by_iso_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_usage.json");
        let store = JsonStore::new(&path);
        let day = date("2026-02-07");
        store.upsert(day, record_with_tokens(day, "a", 1)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &raw["2026-02-07"];
        assert!(record["start"].is_string());
        assert!(record["end"].is_string());
        assert_eq!(record["summary"]["tokens"], 1);
        assert!(!dir.path().join("token_usage.json.tmp").exists());
    }

    #[test]
    fn corrupt_store_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_usage.json");
        let original = b"{\"2026-02-06\": {\"start\": truncated";
        std::fs::write(&path, original).unwrap();
        let store = JsonStore::new(&path);

        let day = date("2026-02-07");
        let err = store.upsert(day, record_with_tokens(day, "a", 1)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), original);
        assert!(matches!(store.read_all(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn invalid_date_key_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token_usage.json");
        std::fs::write(&path, r#"{"yesterday": {}}"#).unwrap();
        let store = JsonStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }
}
