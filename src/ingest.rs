use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{ModelInput, ModelRecord};

/// A fetch batch holds either one model or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Batch<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Batch<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Batch::Many(items) => items,
            Batch::One(item) => vec![item],
        }
    }
}

/// Load the fetcher's output: `[{ model_name, provider, pages: [...] }]`.
pub fn load_inputs(path: &Path) -> Result<Vec<ModelInput>> {
    read_batch(path).with_context(|| format!("Invalid model input {}", path.display()))
}

/// Load records of an earlier run, used as the base of a gap-filling pass.
pub fn load_records(path: &Path) -> Result<Vec<ModelRecord>> {
    read_batch(path).with_context(|| format!("Invalid record file {}", path.display()))
}

fn read_batch<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let batch: Batch<T> = serde_json::from_str(&content)?;
    Ok(batch.into_vec())
}
