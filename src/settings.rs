//! Persisted search settings: a small JSON key-value file.

use crate::controller::QuerySource;
use crate::error::{CrawlError, CrawlResult};
use crate::model::Query;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const JOBS_KEY: &str = "jobs";
pub const REGION_KEY: &str = "region";

static RE_LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*").expect("static regex"));

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CrawlResult<BTreeMap<String, String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(CrawlError::Settings(format!("{}: {e}", self.path.display()))),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| CrawlError::Settings(format!("{}: {e}", self.path.display())))
    }

    /// Stored value, or an empty string when unset.
    pub fn get(&self, key: &str) -> CrawlResult<String> {
        Ok(self.load()?.remove(key).unwrap_or_default())
    }

    pub fn set(&self, key: &str, value: &str) -> CrawlResult<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&values)
            .map_err(|e| CrawlError::Settings(format!("{}: {e}", self.path.display())))?;
        fs::write(&self.path, json + "\n")
            .map_err(|e| CrawlError::Settings(format!("{}: {e}", self.path.display())))?;
        debug!(key, path = %self.path.display(), "stored setting");
        Ok(())
    }
}

impl QuerySource for SettingsStore {
    /// Every region crossed with every job term, region-major.
    fn queries(&self) -> CrawlResult<Vec<Query>> {
        let values = self.load()?;
        let list = |key: &str| values.get(key).map(|v| split_list(v)).unwrap_or_default();
        let (regions, jobs) = (list(REGION_KEY), list(JOBS_KEY));

        Ok(regions
            .iter()
            .flat_map(|region| jobs.iter().map(move |job| Query::new(region.clone(), job.clone())))
            .collect())
    }
}

/// Split a `"rust, go ,java"` style list; blank entries are dropped.
pub fn split_list(value: &str) -> Vec<String> {
    RE_LIST_SEPARATOR
        .split(value)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims_lists() {
        assert_eq!(split_list("rust, go ,java,,  "), vec!["rust", "go", "java"]);
        assert!(split_list("").is_empty());
        assert_eq!(split_list("software engineer"), vec!["software engineer"]);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("absent.json"));
        assert_eq!(store.get(JOBS_KEY).unwrap(), "");
        assert!(store.queries().unwrap().is_empty());
    }

    #[test]
    fn values_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json"));
        store.set(JOBS_KEY, "rust, go").unwrap();
        store.set(REGION_KEY, "wien").unwrap();

        let reopened = SettingsStore::open(store.path());
        assert_eq!(reopened.get(JOBS_KEY).unwrap(), "rust, go");
        assert_eq!(reopened.get(REGION_KEY).unwrap(), "wien");
    }

    #[test]
    fn queries_are_region_major() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json"));
        store.set(JOBS_KEY, "rust, go").unwrap();
        store.set(REGION_KEY, "wien, graz").unwrap();

        assert_eq!(
            store.queries().unwrap(),
            vec![
                Query::new("wien", "rust"),
                Query::new("wien", "go"),
                Query::new("graz", "rust"),
                Query::new("graz", "go"),
            ]
        );
    }

    #[test]
    fn corrupt_file_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = SettingsStore::open(&path).queries().unwrap_err();
        assert_eq!(err.kind(), "SettingsError");
    }
}
