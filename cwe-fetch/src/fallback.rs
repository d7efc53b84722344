//! Bulk snapshot fallback
//!
//! When the REST API is unreachable the full weakness catalogue is read
//! from a bulk JSON dump. The dump's layout has changed over time, so the
//! payload is normalised by trying each known shape in turn.

use crate::client::EndpointClient;
use cwe_common::WeaknessRecord;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

/// Keys that mark a list of objects as weakness-like
const RECORD_MARKERS: [&str; 4] = ["ID", "CWE_ID", "Name", "Description"];

pub struct FallbackProvider {
    client: Arc<EndpointClient>,
    url: String,
    timeout: Duration,
    snapshot: OnceCell<Arc<Vec<WeaknessRecord>>>,
}

impl FallbackProvider {
    pub fn new(client: Arc<EndpointClient>, url: &str, timeout: Duration) -> Self {
        Self {
            client,
            url: url.to_string(),
            timeout,
            snapshot: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Snapshot records; downloaded on first success and reused afterwards
    ///
    /// A failed or empty download is not remembered, so a later call tries
    /// again.
    pub async fn fetch_snapshot(&self) -> Arc<Vec<WeaknessRecord>> {
        let result = self
            .snapshot
            .get_or_try_init(|| async {
                let records = self.download().await;
                if records.is_empty() {
                    Err(())
                } else {
                    Ok(Arc::new(records))
                }
            })
            .await;

        match result {
            Ok(records) => Arc::clone(records),
            Err(()) => Arc::new(Vec::new()),
        }
    }

    async fn download(&self) -> Vec<WeaknessRecord> {
        info!(url = %self.url, "Fetching fallback snapshot");
        match self.client.get_json_once(&self.url, self.timeout).await {
            Ok(data) => {
                let records = normalize(data);
                if records.is_empty() {
                    warn!("No weaknesses found in fallback snapshot");
                } else {
                    info!(count = records.len(), "✓ Fallback snapshot loaded");
                }
                records
            }
            Err(e) => {
                error!(url = %self.url, error = %e, "Failed to fetch fallback snapshot");
                Vec::new()
            }
        }
    }
}

/// Extract weakness records from any known snapshot layout
///
/// Shapes, in order: a top-level list; `Weaknesses`; `WeaknessList`;
/// `CWE` (object holding `Weaknesses`, a list, or a single record); the
/// first list of objects whose first element carries a record marker.
pub fn normalize(data: Value) -> Vec<WeaknessRecord> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(list) = map.remove("Weaknesses") {
                into_list(list)
            } else if let Some(list) = map.remove("WeaknessList") {
                into_list(list)
            } else if let Some(cwe) = map.remove("CWE") {
                match cwe {
                    Value::Object(mut inner) if inner.contains_key("Weaknesses") => {
                        inner.remove("Weaknesses").map(into_list).unwrap_or_default()
                    }
                    other => into_list(other),
                }
            } else {
                best_guess(map)
            }
        }
        _ => {
            error!("Unexpected data format in fallback snapshot");
            Vec::new()
        }
    };

    items.into_iter().filter_map(WeaknessRecord::from_value).collect()
}

fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

fn best_guess(map: Map<String, Value>) -> Vec<Value> {
    for (key, value) in map {
        if let Value::Array(items) = value {
            let looks_like_records = items
                .first()
                .and_then(Value::as_object)
                .map(|first| RECORD_MARKERS.iter().any(|marker| first.contains_key(*marker)))
                .unwrap_or(false);
            if looks_like_records {
                info!(key = %key, "Using best-guess weakness list from fallback snapshot");
                return items;
            }
        }
    }
    warn!("Could not identify weakness data structure in fallback snapshot");
    Vec::new()
}
