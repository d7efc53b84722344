//! Canonical graph node

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One merged node per weakness identifier
///
/// Scalar fields are populate-once: the first non-empty value wins. Set
/// fields only ever grow. `BTreeSet` keeps the serialized arrays sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub cwe: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub detail: Option<String>,
    #[serde(default)]
    pub parent: BTreeSet<String>,
    #[serde(default)]
    pub children: BTreeSet<String>,
    #[serde(default)]
    pub related: BTreeSet<String>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    pub mitigation: Option<String>,
    #[serde(default)]
    pub languages: BTreeSet<String>,
}

impl GraphEntry {
    /// Empty node (also used for relationship-only stubs)
    pub fn new(cwe: impl Into<String>) -> Self {
        Self {
            cwe: cwe.into(),
            ..Default::default()
        }
    }

    pub fn fill_name(&mut self, value: &str) {
        fill_once(&mut self.name, value);
    }

    pub fn fill_description(&mut self, value: &str) {
        fill_once(&mut self.description, value);
    }

    pub fn fill_detail(&mut self, value: &str) {
        fill_once(&mut self.detail, value);
    }

    /// Append mitigation text unless it is already contained
    ///
    /// Category-derived copies of the same record carry identical mitigation
    /// sections; the containment check keeps them from stacking up.
    pub fn merge_mitigation(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        match &mut self.mitigation {
            Some(existing) if !existing.is_empty() => {
                if !existing.contains(value) {
                    existing.push('\n');
                    existing.push_str(value);
                }
            }
            slot => *slot = Some(value.to_string()),
        }
    }

    /// True when no record has contributed content yet
    pub fn is_stub(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.detail.is_none() && self.mitigation.is_none()
    }
}

fn fill_once(slot: &mut Option<String>, value: &str) {
    if value.is_empty() {
        return;
    }
    if slot.as_deref().map_or(true, str::is_empty) {
        *slot = Some(value.to_string());
    }
}
