//! Replica-catalog lookups used to confirm that requested runs exist.
use crate::error::AvailabilityError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Source of block names per dataset and run.
pub trait ReplicaCatalog {
    /// Block identifiers (`#`-suffixes) holding `run` of `dataset`.
    fn blocks(&self, dataset: &str, run: u64) -> Result<BTreeSet<String>>;
}

/// DBS reader over HTTP.
#[derive(Debug, Clone)]
pub struct DbsCatalog {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct BlockRecord {
    block_name: String,
}

impl DbsCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ReplicaCatalog for DbsCatalog {
    fn blocks(&self, dataset: &str, run: u64) -> Result<BTreeSet<String>> {
        let url = format!("{}/blocks", self.base_url);
        tracing::debug!(dataset, run, url = %url, "querying block catalog");
        let records: Vec<BlockRecord> = ureq::get(&url)
            .query("dataset", dataset)
            .query("run_num", run.to_string())
            .call()
            .with_context(|| format!("query blocks of {dataset} for run {run}"))?
            .body_mut()
            .read_json()
            .with_context(|| format!("parse block list of {dataset}"))?;
        Ok(records
            .into_iter()
            .map(|record| block_suffix(&record.block_name))
            .collect())
    }
}

/// `/A/B/RAW#1234-abcd` -> `#1234-abcd`; names without a suffix are kept.
fn block_suffix(name: &str) -> String {
    match name.find('#') {
        Some(idx) => name[idx..].to_string(),
        None => name.to_string(),
    }
}

/// Blocks holding the requested runs, per dataset.
///
/// Fails on the first dataset/run pair with no blocks.
pub fn check_availability(
    catalog: &dyn ReplicaCatalog,
    datasets: &[String],
    runs: &[u64],
) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut available = BTreeMap::new();
    for dataset in datasets {
        let found: &mut BTreeSet<String> = available.entry(dataset.clone()).or_default();
        for &run in runs {
            let blocks = catalog.blocks(dataset, run)?;
            if blocks.is_empty() {
                return Err(AvailabilityError::Unavailable {
                    dataset: dataset.clone(),
                    run,
                }
                .into());
            }
            tracing::info!(dataset, run, blocks = blocks.len(), "run available");
            found.extend(blocks);
        }
    }
    Ok(available)
}
