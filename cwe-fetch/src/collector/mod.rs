//! Concurrent batch collector
//!
//! [`Harvester`] turns a starting scope into the raw weakness records of
//! every identifier reachable from it:
//!
//! 1. Fallback mode short-circuits to the bulk snapshot.
//! 2. `All` uses `/cwe/weakness/all`, then the snapshot if that is empty.
//! 3. `View(id)` expands the view members through category relationships,
//!    children and descendants, classifies the result, expands categories,
//!    and fetches the weaknesses with the grouped strategy. If grouping
//!    yields nothing the chunked strategy takes over.
//! 4. Identifiers that 404 are re-examined as possible categories; failed
//!    identifiers get one last sequential pass before being dropped.
//!
//! Workers return their results to the coordinating task; aggregation
//! never happens inside a worker.

mod chunked;
mod expansion;
mod grouped;

pub use chunked::chunk_size;
pub use grouped::partition_groups;

use crate::api::{check_endpoint, weaknesses_of, CweApi, VersionInfo, MAX_IDS_PER_REQUEST};
use crate::classifier::{self, CweKind};
use crate::client::{ClientConfig, EndpointClient, FetchOutcome, TrustMode};
use crate::config::FetchSettings;
use crate::error::{CollectError, CollectResult, FetchError, FetchResult};
use crate::fallback::FallbackProvider;
use crate::mode::{SourceMode, SourceModeLatch};
use crate::pacing::PacingConfig;
use crate::retry::RetryPolicy;
use crate::stats::PerformanceStats;
use cwe_common::WeaknessRecord;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Starting point of a collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every identifier reachable from a view
    View(String),
    /// `/cwe/weakness/all`
    All,
}

/// Concurrency and pacing of a [`Harvester`]
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Outer pool size
    pub workers: usize,
    /// Identifiers per grouped request, at most [`MAX_IDS_PER_REQUEST`]
    pub batch_size: usize,
    pub pacing: PacingConfig,
}

/// Outcome of one identifier fetched on its own
#[derive(Debug)]
pub(crate) enum Individual {
    Records(Vec<WeaknessRecord>),
    Missing { category_hint: bool },
    Failed,
}

/// Identifier answered with 404 on the weakness endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MissingId {
    pub id: String,
    pub category_hint: bool,
}

/// What a strategy hands back to the coordinator
#[derive(Debug, Default)]
pub(crate) struct StrategyOutcome {
    pub records: Vec<WeaknessRecord>,
    pub failed: Vec<String>,
    pub missing: Vec<MissingId>,
}

impl StrategyOutcome {
    pub fn absorb(&mut self, other: StrategyOutcome) {
        self.records.extend(other.records);
        self.failed.extend(other.failed);
        self.missing.extend(other.missing);
    }

    pub fn push(&mut self, id: &str, result: Individual) {
        match result {
            Individual::Records(records) => self.records.extend(records),
            Individual::Missing { category_hint } => self.missing.push(MissingId {
                id: id.to_string(),
                category_hint,
            }),
            Individual::Failed => self.failed.push(id.to_string()),
        }
    }
}

pub struct Harvester {
    api: CweApi,
    fallback: FallbackProvider,
    mode: SourceModeLatch,
    options: HarvestOptions,
}

impl Harvester {
    pub fn new(api: CweApi, fallback: FallbackProvider, options: HarvestOptions) -> Self {
        Self {
            api,
            fallback,
            mode: SourceModeLatch::new(),
            options,
        }
    }

    /// Build the client stack with production timings
    pub fn from_settings(settings: &FetchSettings) -> FetchResult<Self> {
        let retry = RetryPolicy::default().with_max_retries(settings.max_retries);
        Self::from_settings_with(settings, retry, PacingConfig::default())
    }

    /// Build the client stack with explicit retry and pacing timings
    pub fn from_settings_with(settings: &FetchSettings, retry: RetryPolicy, pacing: PacingConfig) -> FetchResult<Self> {
        let config = ClientConfig {
            trust: if settings.insecure {
                TrustMode::Insecure
            } else {
                TrustMode::System
            },
            cache_capacity: settings.cache_capacity,
            retry,
            ..ClientConfig::default()
        };
        let client = Arc::new(EndpointClient::new(config)?);
        let api = CweApi::new(Arc::clone(&client), &settings.base_url);
        let fallback = FallbackProvider::new(client, &settings.fallback_url, pacing.fallback_timeout);

        Ok(Self::new(
            api,
            fallback,
            HarvestOptions {
                workers: settings.workers.max(1),
                batch_size: settings.batch_size.clamp(1, MAX_IDS_PER_REQUEST),
                pacing,
            },
        ))
    }

    pub fn api(&self) -> &CweApi {
        &self.api
    }

    pub fn mode(&self) -> SourceMode {
        self.mode.get()
    }

    pub fn workers(&self) -> usize {
        self.options.workers
    }

    pub fn stats(&self) -> PerformanceStats {
        let client = self.api.client();
        client.stats().report(client.cache().len(), self.options.workers)
    }

    /// Connectivity probe against `/cwe/version`
    ///
    /// A TLS failure is retried once with the bundled root set. If the API
    /// stays unreachable the fallback snapshot is loaded and the run
    /// switches to fallback mode; if that fails too the run cannot proceed.
    pub async fn probe(&self) -> CollectResult<SourceMode> {
        check_endpoint(self.api.base_url());

        let url = self.api.version_url();
        let timeout = self.options.pacing.probe_timeout;
        let client = self.api.client();
        info!(url = %url, "Testing connectivity");

        let failure = match client.probe(&url, timeout).await {
            Ok(body) => {
                self.on_reachable(body);
                return Ok(self.mode.get());
            }
            Err(FetchError::Tls(reason)) if client.trust() != TrustMode::Insecure => {
                error!(error = %reason, "TLS connectivity test failed");
                error!("Certificate verification failed: outdated trust store, intercepting proxy or wrong system clock");
                info!("Attempting alternative trust configuration");
                match client.probe_with_trust(TrustMode::BundledRoots, &url, timeout).await {
                    Ok(body) => {
                        info!("✓ Alternative trust configuration successful");
                        self.on_reachable(body);
                        return Ok(self.mode.get());
                    }
                    Err(e) => {
                        error!(error = %e, "Alternative trust configuration also failed");
                        e.to_string()
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Connectivity test failed");
                e.to_string()
            }
        };

        warn!("API connectivity failed, attempting fallback snapshot");
        if self.snapshot().await.is_empty() {
            error!("Both main API and fallback snapshot failed");
            return Err(CollectError::Unavailable(failure));
        }
        Ok(SourceMode::Fallback)
    }

    fn on_reachable(&self, body: Option<Value>) {
        info!("✓ Connectivity test successful");
        if let Some(version) = body {
            VersionInfo::from_value(&version).log();
        }
        self.mode.mark_primary();
    }

    /// Collect every raw record reachable from `scope`
    pub async fn collect(&self, scope: &Scope) -> CollectResult<Vec<WeaknessRecord>> {
        if self.mode.is_fallback() {
            info!("Using fallback snapshot for collection");
            return Ok(self.snapshot().await);
        }

        match scope {
            Scope::All => self.collect_all().await,
            Scope::View(view) => self.collect_view(view).await,
        }
    }

    /// Snapshot records; a non-empty snapshot latches fallback mode
    async fn snapshot(&self) -> Vec<WeaknessRecord> {
        let records = self.fallback.fetch_snapshot().await;
        if !records.is_empty() && self.mode.mark_fallback() != SourceMode::Fallback {
            warn!(count = records.len(), "Switched to fallback snapshot for the rest of the run");
        }
        records.as_ref().clone()
    }

    async fn collect_all(&self) -> CollectResult<Vec<WeaknessRecord>> {
        let records = self.api.all_weaknesses().await;
        if !records.is_empty() {
            info!(count = records.len(), "✓ Retrieved all weaknesses directly");
            return Ok(records);
        }

        warn!("Direct fetch returned nothing, attempting fallback snapshot");
        let records = self.snapshot().await;
        if records.is_empty() {
            return Err(CollectError::Unavailable(
                "direct fetch and fallback snapshot both returned no records".to_string(),
            ));
        }
        Ok(records)
    }

    async fn collect_view(&self, view: &str) -> CollectResult<Vec<WeaknessRecord>> {
        info!(view, "Collecting weaknesses from view");
        let members = self.api.view_members(view).await;
        if members.is_empty() {
            warn!(view, "No members found in view, trying direct fetch");
            return self.collect_all().await;
        }

        let universe: Vec<String> = self.expand_view(view, &members).await.into_iter().collect();
        info!(count = universe.len(), "Identifiers to fetch weakness data for");

        let mut visited: HashSet<String> = universe.iter().cloned().collect();
        let (mut weaknesses, categories) = classifier::partition(
            &self.api,
            &universe,
            self.options.workers,
            self.options.pacing.type_batch_timeout,
        )
        .await;
        if !categories.is_empty() {
            weaknesses.extend(self.expand_categories(categories, &mut visited).await);
        }

        Ok(self.collect_weaknesses(&weaknesses, &mut visited).await)
    }

    /// Grouped strategy, chunked strategy if that yields nothing, then the
    /// missing-identifier and final passes
    async fn collect_weaknesses(&self, ids: &[String], visited: &mut HashSet<String>) -> Vec<WeaknessRecord> {
        if ids.is_empty() {
            warn!("No weakness identifiers to fetch");
            return Vec::new();
        }

        let mut outcome = self.collect_grouped(ids).await;
        if outcome.records.is_empty() {
            warn!("Grouped requests returned nothing, switching to individual requests");
            outcome = self.collect_chunked(ids, visited).await;
        }

        let StrategyOutcome {
            mut records,
            mut failed,
            missing,
        } = outcome;

        let resolved = self.resolve_missing(missing, visited).await;
        records.extend(resolved.records);
        failed.extend(resolved.failed);

        if !failed.is_empty() {
            records.extend(self.final_pass(&failed).await);
        }

        info!(count = records.len(), "✓ Collected weakness entries");
        records
    }

    /// Fetch one identifier on the weakness endpoint
    pub(crate) async fn fetch_individual(&self, id: &str) -> Individual {
        match self.api.weakness(id).await {
            FetchOutcome::Json(value) => {
                let records = weaknesses_of(&value);
                if records.is_empty() {
                    debug!(cwe = id, "No data returned");
                    Individual::Failed
                } else {
                    Individual::Records(records)
                }
            }
            FetchOutcome::Missing { category_hint } => Individual::Missing { category_hint },
            FetchOutcome::Empty => Individual::Failed,
        }
    }

    /// 404'd identifiers: categories are expanded and their members fetched,
    /// everything else is dropped
    async fn resolve_missing(&self, missing: Vec<MissingId>, visited: &mut HashSet<String>) -> StrategyOutcome {
        if missing.is_empty() {
            return StrategyOutcome::default();
        }
        info!(count = missing.len(), "Re-examining identifiers not found on the weakness endpoint");

        let mut categories = Vec::new();
        for MissingId { id, category_hint } in missing {
            let kind = if category_hint {
                CweKind::Category
            } else {
                classifier::probe(&self.api, &id, self.options.pacing.id_timeout).await
            };
            match kind {
                CweKind::Category => {
                    debug!(cwe = %id, "Identifier is a category, expanding members");
                    visited.insert(id.clone());
                    categories.push(id);
                }
                CweKind::Weakness => warn!(cwe = %id, "Identifier not found, dropping"),
            }
        }

        let members = self.expand_categories(categories, visited).await;
        if members.is_empty() {
            return StrategyOutcome::default();
        }

        let mut outcome = self.process_chunk(&members).await;
        for dropped in outcome.missing.drain(..) {
            warn!(cwe = %dropped.id, "Category member not found, dropping");
        }
        outcome
    }

    /// Last sequential attempt for failed identifiers
    async fn final_pass(&self, failed: &[String]) -> Vec<WeaknessRecord> {
        let pacing = &self.options.pacing;
        info!(count = failed.len(), "Retrying failed identifiers");
        tokio::time::sleep(pacing.final_pause).await;

        let mut records = Vec::new();
        for (index, id) in failed.iter().enumerate() {
            debug!(cwe = %id, "Final retry");
            match self.fetch_individual(id).await {
                Individual::Records(found) => {
                    debug!(cwe = %id, "✓ Final retry successful");
                    records.extend(found);
                }
                Individual::Missing { .. } | Individual::Failed => {
                    error!(cwe = %id, "Final retry failed, dropping identifier");
                }
            }
            if index + 1 < failed.len() {
                tokio::time::sleep(pacing.final_call_delay).await;
            }
        }
        records
    }
}
