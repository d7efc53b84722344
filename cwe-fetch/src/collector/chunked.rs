//! Chunked-individual strategy
//!
//! Used when grouped requests produce nothing. Categories are filtered out
//! with single-identifier probes first, then weaknesses are fetched one by
//! one in chunks, each chunk running its own small inner pool.

use super::{Harvester, Individual, StrategyOutcome};
use crate::classifier;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Inner pool cap per chunk
pub const CHUNK_POOL: usize = 8;

/// `⌈total / (2 × workers)⌉`, at least 1
pub fn chunk_size(total: usize, workers: usize) -> usize {
    let divisor = 2 * workers.max(1);
    ((total + divisor - 1) / divisor).max(1)
}

impl Harvester {
    pub(crate) async fn collect_chunked(&self, ids: &[String], visited: &mut HashSet<String>) -> StrategyOutcome {
        let (mut weaknesses, categories) =
            classifier::filter_categories(&self.api, ids, self.options.pacing.id_timeout).await;

        if !categories.is_empty() {
            let preview: Vec<&str> = categories.iter().take(10).map(String::as_str).collect();
            info!(count = categories.len(), first = ?preview, "Expanding category identifiers instead of fetching them");
            weaknesses.extend(self.expand_categories(categories, visited).await);
        }

        if weaknesses.is_empty() {
            warn!("No weakness identifiers left after category filtering");
            return StrategyOutcome::default();
        }

        let size = chunk_size(weaknesses.len(), self.options.workers);
        let chunks: Vec<Vec<String>> = weaknesses.chunks(size).map(<[String]>::to_vec).collect();
        let total = chunks.len();
        let chunk_timeout = self.options.pacing.chunk_timeout;
        info!(
            identifiers = weaknesses.len(),
            chunks = total,
            workers = self.options.workers,
            "Fetching weaknesses individually in chunks"
        );

        let results: Vec<StrategyOutcome> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| async move {
                debug!(chunk = index + 1, total, size = chunk.len(), "Processing chunk");
                let result = tokio::time::timeout(chunk_timeout, self.process_chunk(&chunk)).await;
                result.unwrap_or_else(|_| {
                    warn!(chunk = index + 1, "Chunk timed out");
                    StrategyOutcome {
                        failed: chunk,
                        ..StrategyOutcome::default()
                    }
                })
            })
            .buffer_unordered(self.options.workers)
            .collect()
            .await;

        let mut outcome = StrategyOutcome::default();
        for result in results {
            outcome.absorb(result);
        }
        info!(
            records = outcome.records.len(),
            failed = outcome.failed.len(),
            missing = outcome.missing.len(),
            "Chunked fetch complete"
        );
        outcome
    }

    /// Fetch each identifier of a chunk on its own (pool of at most 8)
    pub(crate) async fn process_chunk(&self, chunk: &[String]) -> StrategyOutcome {
        let pacing = &self.options.pacing;
        let pool = CHUNK_POOL.min(chunk.len()).max(1);

        let results: Vec<(&String, Option<Individual>)> = stream::iter(chunk)
            .map(|id| async move {
                let result = tokio::time::timeout(pacing.id_timeout, self.fetch_individual(id)).await.ok();
                tokio::time::sleep(pacing.chunk_call_delay).await;
                (id, result)
            })
            .buffer_unordered(pool)
            .collect()
            .await;

        let mut outcome = StrategyOutcome::default();
        for (id, result) in results {
            match result {
                Some(individual) => outcome.push(id, individual),
                None => {
                    debug!(cwe = %id, "Request timed out");
                    outcome.failed.push(id.clone());
                }
            }
        }
        outcome
    }
}
