//! Grouped-batch strategy
//!
//! One request per group of `batch_size` identifiers. A group that still
//! fails after its retries is refetched member by member.

use super::{Harvester, StrategyOutcome};
use crate::api::{weaknesses_of, MAX_IDS_PER_REQUEST};
use crate::client::FetchOutcome;
use cwe_common::WeaknessRecord;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

/// Split identifiers into consecutive groups of `size` (last group may be shorter)
///
/// `size` is capped at [`MAX_IDS_PER_REQUEST`], the longest list the API accepts.
pub fn partition_groups(ids: &[String], size: usize) -> Vec<Vec<String>> {
    ids.chunks(size.clamp(1, MAX_IDS_PER_REQUEST))
        .map(<[String]>::to_vec)
        .collect()
}

impl Harvester {
    pub(crate) async fn collect_grouped(&self, ids: &[String]) -> StrategyOutcome {
        let groups = partition_groups(ids, self.options.batch_size);
        let total = groups.len();
        let pool = (self.options.workers / 2).max(1).min(total.max(1));
        let group_timeout = self.options.pacing.group_timeout;
        info!(
            identifiers = ids.len(),
            groups = total,
            workers = pool,
            "Fetching weaknesses in groups"
        );

        let results: Vec<(Vec<String>, Option<Vec<WeaknessRecord>>)> = stream::iter(groups.into_iter().enumerate())
            .map(|(index, group)| async move {
                let result = tokio::time::timeout(group_timeout, self.fetch_group(&group, index, total)).await;
                let fetched = result.unwrap_or_else(|_| {
                    warn!(group = index + 1, "Group request timed out");
                    None
                });
                (group, fetched)
            })
            .buffer_unordered(pool)
            .collect()
            .await;

        let mut outcome = StrategyOutcome::default();
        for (group, fetched) in results {
            match fetched {
                Some(records) => outcome.records.extend(records),
                None => self.fetch_members_individually(&group, &mut outcome).await,
            }
        }
        outcome
    }

    /// One group with up to `group_retries` retries
    async fn fetch_group(&self, group: &[String], index: usize, total: usize) -> Option<Vec<WeaknessRecord>> {
        let pacing = &self.options.pacing;
        let attempts = pacing.group_retries + 1;
        debug!(group = index + 1, total, ids = %group.join(","), "Processing group");

        for retry in 0..attempts {
            match self.api.weaknesses(group).await {
                FetchOutcome::Json(value) => {
                    let records = weaknesses_of(&value);
                    if !records.is_empty() {
                        debug!(group = index + 1, count = records.len(), "✓ Group retrieved");
                        if index + 1 < total {
                            tokio::time::sleep(pacing.group_delay(self.api.client().stats().latencies())).await;
                        }
                        return Some(records);
                    }
                    warn!(group = index + 1, attempt = retry + 1, "Empty response for group");
                }
                FetchOutcome::Missing { .. } => {
                    // 404 on a list: some member is not a weakness, not retried
                    debug!(group = index + 1, "Group contains an unknown identifier");
                    return None;
                }
                FetchOutcome::Empty => {
                    warn!(group = index + 1, attempt = retry + 1, attempts, "Group request failed");
                }
            }

            if retry + 1 < attempts {
                let wait = pacing.group_retry_wait(retry);
                debug!(group = index + 1, wait_ms = wait.as_millis() as u64, "Waiting before group retry");
                tokio::time::sleep(wait).await;
            }
        }

        error!(group = index + 1, "Group failed after all retries");
        None
    }

    async fn fetch_members_individually(&self, group: &[String], outcome: &mut StrategyOutcome) {
        warn!(ids = %group.join(","), "Falling back to individual requests for group");
        for id in group {
            let result = self.fetch_individual(id).await;
            outcome.push(id, result);
            tokio::time::sleep(self.options.pacing.individual_delay).await;
        }
    }
}
