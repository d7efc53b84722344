//! Weakness vs category classification
//!
//! Classification fails open: anything that cannot be positively
//! identified as a category is treated as a weakness, so at worst a
//! category costs one extra 404 on the weakness endpoint.

use crate::api::CweApi;
use crate::client::FetchOutcome;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifiers per type-info request during partitioning
pub const TYPE_BATCH_SIZE: usize = 10;

/// Concurrent single-identifier probes
pub const PROBE_POOL: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CweKind {
    Weakness,
    Category,
}

impl CweKind {
    /// `Type` values mentioning "category" are categories
    pub fn from_type(type_name: &str) -> Self {
        if type_name.to_lowercase().contains("category") {
            CweKind::Category
        } else {
            CweKind::Weakness
        }
    }
}

/// `[{ID, Type}, ...]` → kind per identifier
pub fn parse_type_info(value: &Value) -> HashMap<String, CweKind> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|info| {
            let id = info.get("ID").and_then(cwe_common::record::value_to_id)?;
            let kind = info
                .get("Type")
                .and_then(Value::as_str)
                .map(CweKind::from_type)
                .unwrap_or(CweKind::Weakness);
            Some((id, kind))
        })
        .collect()
}

/// Classify up to 50 identifiers with one type-info request
///
/// Identifiers missing from the response are weaknesses.
pub async fn classify_batch(api: &CweApi, ids: &[String]) -> Vec<(String, CweKind)> {
    let known = match api.type_info(ids).await {
        FetchOutcome::Json(value) => parse_type_info(&value),
        _ => {
            warn!(count = ids.len(), "Type lookup failed, treating batch as weaknesses");
            HashMap::new()
        }
    };

    ids.iter()
        .take(crate::api::MAX_IDS_PER_REQUEST)
        .map(|id| (id.clone(), known.get(id).copied().unwrap_or(CweKind::Weakness)))
        .collect()
}

/// Single-identifier check against the category endpoint
pub async fn probe(api: &CweApi, id: &str, timeout: Duration) -> CweKind {
    match api.client().status(&api.category_url(id), timeout).await {
        Ok(status) if (200..300).contains(&status) => CweKind::Category,
        Ok(_) => CweKind::Weakness,
        Err(e) => {
            debug!(cwe = id, error = %e, "Category probe failed, treating as weakness");
            CweKind::Weakness
        }
    }
}

/// Split identifiers into `(weaknesses, categories)` using type-info batches
///
/// Input order is preserved within each list.
pub async fn partition(api: &CweApi, ids: &[String], workers: usize, batch_timeout: Duration) -> (Vec<String>, Vec<String>) {
    if ids.is_empty() {
        return (Vec::new(), Vec::new());
    }
    info!(count = ids.len(), "Identifying CWE types");

    let batches: Vec<&[String]> = ids.chunks(TYPE_BATCH_SIZE).collect();
    let pool = workers.clamp(1, batches.len());

    let results: Vec<Vec<(String, CweKind)>> = stream::iter(batches)
        .map(|batch| async move {
            match tokio::time::timeout(batch_timeout, classify_batch(api, batch)).await {
                Ok(kinds) => kinds,
                Err(_) => {
                    warn!(count = batch.len(), "Type lookup timed out, treating batch as weaknesses");
                    batch.iter().map(|id| (id.clone(), CweKind::Weakness)).collect()
                }
            }
        })
        .buffer_unordered(pool)
        .collect()
        .await;

    let kinds: HashMap<String, CweKind> = results.into_iter().flatten().collect();
    let split = split_by_kind(ids, &kinds);
    info!(weaknesses = split.0.len(), categories = split.1.len(), "Type identification complete");
    split
}

/// Split identifiers with single-identifier category probes
pub async fn filter_categories(api: &CweApi, ids: &[String], timeout: Duration) -> (Vec<String>, Vec<String>) {
    if ids.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let kinds: HashMap<String, CweKind> = stream::iter(ids)
        .map(|id| async move { (id.clone(), probe(api, id, timeout).await) })
        .buffer_unordered(PROBE_POOL.min(ids.len()))
        .collect()
        .await;

    let split = split_by_kind(ids, &kinds);
    info!(weaknesses = split.0.len(), categories = split.1.len(), "Category filtering complete");
    split
}

fn split_by_kind(ids: &[String], kinds: &HashMap<String, CweKind>) -> (Vec<String>, Vec<String>) {
    ids.iter()
        .cloned()
        .partition(|id| kinds.get(id).copied().unwrap_or(CweKind::Weakness) == CweKind::Weakness)
}
