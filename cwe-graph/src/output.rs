//! Graph artifact I/O
//!
//! The artifact is a JSON array of [`GraphEntry`] objects sorted by `cwe`.
//! In merge mode entries already on disk are kept unless the new run
//! produced the same identifier, in which case the new entry replaces them.

use crate::entry::GraphEntry;
use crate::error::{GraphError, GraphResult};
use cwe_common::output::write_json_atomic;
use cwe_common::WeaknessDocument;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// How to treat an existing artifact at the target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Merge,
    Overwrite,
}

/// What a write did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Entries read from the existing artifact
    pub existing: usize,
    /// Entries produced by this run
    pub new: usize,
    /// Entries written
    pub total: usize,
    /// Existing entries replaced by new ones
    pub replaced: usize,
    pub bytes: u64,
}

/// Read a `{"Weaknesses": [...]}` collection artifact
pub fn load_document(path: &Path) -> GraphResult<WeaknessDocument> {
    if !path.exists() {
        return Err(GraphError::InputNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| GraphError::InvalidInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write the graph artifact, merging with or replacing what is on disk
pub fn write_graph(
    entries: &HashMap<String, GraphEntry>,
    path: &Path,
    mode: WriteMode,
    pretty: bool,
) -> GraphResult<WriteSummary> {
    let mut merged: BTreeMap<String, GraphEntry> = BTreeMap::new();
    let mut summary = WriteSummary {
        new: entries.len(),
        ..Default::default()
    };

    if mode == WriteMode::Merge && path.exists() {
        match read_existing(path) {
            Ok(existing) => {
                summary.existing = existing.len();
                info!(path = %path.display(), entries = existing.len(), "Merging with existing graph");
                merged.extend(existing.into_iter().map(|e| (e.cwe.clone(), e)));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Existing graph unreadable, overwriting");
            }
        }
    }

    for (id, entry) in entries {
        if merged.insert(id.clone(), entry.clone()).is_some() {
            summary.replaced += 1;
        }
    }

    let ordered: Vec<&GraphEntry> = merged.values().collect();
    summary.total = ordered.len();
    summary.bytes = write_json_atomic(&ordered, path, pretty)?;

    Ok(summary)
}

/// Entries of an existing artifact; items that are not valid entries are
/// skipped one at a time so a single bad item never discards the rest
fn read_existing(path: &Path) -> GraphResult<Vec<GraphEntry>> {
    let content = std::fs::read_to_string(path)?;
    let items: Vec<Value> = serde_json::from_str(&content).map_err(|e| GraphError::InvalidInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let total = items.len();
    let entries: Vec<GraphEntry> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(index, error = %e, "Skipping malformed graph entry");
                None
            }
        })
        .collect();

    if entries.len() < total {
        warn!(
            path = %path.display(),
            skipped = total - entries.len(),
            "Existing graph had malformed entries"
        );
    }
    Ok(entries)
}
