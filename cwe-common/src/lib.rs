//! # CWE Harvest Common Library
//!
//! Shared code for the harvest binaries including:
//! - Raw weakness record model (the `{"Weaknesses": [...]}` document)
//! - Configuration loading (TOML bootstrap + environment)
//! - Tracing initialisation
//! - Atomic JSON output helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod record;

pub use error::{Error, Result};
pub use record::{Nature, Relationship, WeaknessDocument, WeaknessRecord};
