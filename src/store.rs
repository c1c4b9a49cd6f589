use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::config::Config;
use crate::models::{record_key, ModelRecord};
use crate::record::merge_records;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store lock poisoned")]
    Poisoned,
}

/// Boundary to the record store. Writes for the same model are sequenced
/// by the implementation and go through the merge policy.
pub trait RecordStore: Send + Sync {
    /// Store `record`, merging it into any stored record for the same model.
    /// Returns the record as stored.
    fn upsert(&self, record: ModelRecord) -> Result<ModelRecord, StoreError>;
    fn get(&self, key: &str) -> Result<Option<ModelRecord>, StoreError>;
    /// All records, ordered by key.
    fn records(&self) -> Result<Vec<ModelRecord>, StoreError>;
}

/// In-memory record store for a single run.
pub struct MemoryStore {
    config: Config,
    inner: Mutex<BTreeMap<String, ModelRecord>>,
}

impl MemoryStore {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            inner: Mutex::new(BTreeMap::new()),
        }
    }
}

impl RecordStore for MemoryStore {
    fn upsert(&self, record: ModelRecord) -> Result<ModelRecord, StoreError> {
        let mut store = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let key = record.key();
        let stored = match store.get(&key) {
            Some(existing) => merge_records(existing, &record, &self.config),
            None => record,
        };
        store.insert(key, stored.clone());
        Ok(stored)
    }

    fn get(&self, key: &str) -> Result<Option<ModelRecord>, StoreError> {
        let key = match key.split_once('/') {
            Some((provider, model_name)) => record_key(provider, model_name),
            None => key.trim().to_lowercase(),
        };
        let store = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(store.get(&key).cloned())
    }

    fn records(&self) -> Result<Vec<ModelRecord>, StoreError> {
        let store = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(store.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::models::{
        DetectionMethod, FieldRecord, FieldSource, FieldValue, ModelInput, RegionCode,
        ResolvedRegion, Sections, SourceType,
    };
    use crate::record::assemble;

    fn record(provider: &str, name: &str, license: &str, confidence: f64) -> ModelRecord {
        let config = Config::builtin().unwrap();
        let mut sections = Sections::new();
        sections
            .entry("distribution".to_string())
            .or_default()
            .fields
            .insert(
                "license_type".to_string(),
                FieldRecord {
                    value: FieldValue::Text(license.into()),
                    source: Some(FieldSource {
                        url: "https://example.com".into(),
                        source_type: SourceType::GeneralWeb,
                        confidence,
                    }),
                },
            );
        assemble(
            &ModelInput {
                model_name: name.into(),
                provider: provider.into(),
                pages: Vec::new(),
            },
            ResolvedRegion {
                region: RegionCode::Us,
                method: DetectionMethod::KnownProvider,
                multi_region: false,
                candidate_scores: BTreeMap::new(),
                secondary_regions: Vec::new(),
            },
            sections,
            &config,
        )
    }

    #[test]
    fn test_upsert_merges_by_confidence() {
        let store = MemoryStore::new(Config::builtin().unwrap());
        store.upsert(record("Acme", "One", "Apache-2.0", 0.95)).unwrap();
        let stored = store.upsert(record("ACME", "one", "MIT", 0.4)).unwrap();

        assert_eq!(
            stored.sections["distribution"].fields["license_type"].text(),
            "Apache-2.0"
        );
        assert_eq!(store.records().unwrap().len(), 1);
        assert!(store.get("Acme/One").unwrap().is_some());
        assert!(store.get("acme/two").unwrap().is_none());
    }

    #[test]
    fn test_get_trims_key_parts() {
        let store = MemoryStore::new(Config::builtin().unwrap());
        store.upsert(record(" Acme ", "One", "MIT", 0.5)).unwrap();

        assert!(store.get(" acme/one").unwrap().is_some());
        assert!(store.get("ACME / One ").unwrap().is_some());
        assert!(store.get("acme").unwrap().is_none());
    }

    #[test]
    fn test_records_sorted_by_key() {
        let store = MemoryStore::new(Config::builtin().unwrap());
        store.upsert(record("Zeta", "Z", "MIT", 0.5)).unwrap();
        store.upsert(record("Acme", "A", "MIT", 0.5)).unwrap();
        let keys: Vec<String> = store.records().unwrap().iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["acme/a".to_string(), "zeta/z".to_string()]);
    }

    #[test]
    fn test_concurrent_upserts_are_sequenced() {
        let store = Arc::new(MemoryStore::new(Config::builtin().unwrap()));
        let handles: Vec<_> = [0.1, 0.9, 0.5, 0.3]
            .into_iter()
            .map(|confidence| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let license = format!("License-{}", confidence);
                    store.upsert(record("Acme", "One", &license, confidence)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = store.get("acme/one").unwrap().unwrap();
        assert_eq!(
            stored.sections["distribution"].fields["license_type"].text(),
            "License-0.9"
        );
    }
}
