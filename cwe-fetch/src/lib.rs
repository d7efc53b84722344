//! cwe-fetch library - resilient CWE collection
//!
//! Collects raw weakness records from the CWE REST API, surviving flaky
//! networking, rate limiting and partial outages, with a bulk snapshot as
//! the last resort.

pub mod api;
pub mod cache;
pub mod classifier;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod fallback;
pub mod mode;
pub mod pacing;
pub mod retry;
pub mod stats;

pub use client::{ClientConfig, EndpointClient, FetchOutcome, TrustMode};
pub use collector::{HarvestOptions, Harvester, Scope};
pub use config::{CliOverrides, FetchSettings};
pub use error::{CollectError, CollectResult, FetchError, FetchResult};
pub use mode::SourceMode;
