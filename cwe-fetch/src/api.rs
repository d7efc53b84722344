//! CWE REST API endpoints
//!
//! URL construction and response parsing for the read-only API. Lookups
//! that fail degrade to empty results; the caller decides what an empty
//! result means.

use crate::client::{EndpointClient, FetchOutcome};
use cwe_common::config::{is_trusted_domain, TRUSTED_API_DOMAINS};
use cwe_common::record::value_to_id;
use cwe_common::WeaknessRecord;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on identifiers per comma-list request
pub const MAX_IDS_PER_REQUEST: usize = 50;

/// Content version reported by `/cwe/version`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub content_version: Option<String>,
    pub content_date: Option<String>,
    pub total_weaknesses: Option<String>,
}

impl VersionInfo {
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(value_to_id);
        Self {
            content_version: field("ContentVersion"),
            content_date: field("ContentDate"),
            total_weaknesses: field("TotalWeaknesses"),
        }
    }

    pub fn log(&self) {
        info!(
            content_version = self.content_version.as_deref().unwrap_or("Unknown"),
            content_date = self.content_date.as_deref().unwrap_or("Unknown"),
            total_weaknesses = self.total_weaknesses.as_deref().unwrap_or("Unknown"),
            "CWE API version"
        );
    }
}

/// Which relationship tree to walk from an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Parents,
    Children,
    Descendants,
    Ancestors,
}

impl Relation {
    fn path(self) -> &'static str {
        match self {
            Relation::Parents => "parents",
            Relation::Children => "children",
            Relation::Descendants => "descendants",
            Relation::Ancestors => "ancestors",
        }
    }
}

pub struct CweApi {
    client: Arc<EndpointClient>,
    base_url: String,
}

impl CweApi {
    pub fn new(client: Arc<EndpointClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &Arc<EndpointClient> {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version_url(&self) -> String {
        format!("{}/cwe/version", self.base_url)
    }

    pub fn view_url(&self, view: &str) -> String {
        format!("{}/cwe/view/{}", self.base_url, view)
    }

    pub fn category_url(&self, id: &str) -> String {
        format!("{}/cwe/category/{}", self.base_url, id)
    }

    pub fn weakness_url(&self, ids: &[String]) -> String {
        format!("{}/cwe/weakness/{}", self.base_url, ids.join(","))
    }

    pub fn weakness_all_url(&self) -> String {
        format!("{}/cwe/weakness/all", self.base_url)
    }

    /// `/cwe/{list}`, truncated to [`MAX_IDS_PER_REQUEST`] identifiers
    pub fn info_url(&self, ids: &[String]) -> String {
        let ids = &ids[..ids.len().min(MAX_IDS_PER_REQUEST)];
        format!("{}/cwe/{}", self.base_url, ids.join(","))
    }

    pub fn relation_url(&self, id: &str, relation: Relation, view: Option<&str>, primary_only: bool) -> String {
        let mut url = format!("{}/cwe/{}/{}", self.base_url, id, relation.path());
        let mut params = Vec::new();
        if let Some(view) = view {
            params.push(format!("view={}", view));
        }
        if primary_only && relation == Relation::Ancestors {
            params.push("primary=true".to_string());
        }
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    pub async fn version(&self) -> Option<VersionInfo> {
        self.client
            .fetch(&self.version_url())
            .await
            .json()
            .map(VersionInfo::from_value)
    }

    pub async fn view_members(&self, view: &str) -> Vec<String> {
        let url = self.view_url(view);
        info!(url = %url, "Fetching view members");
        let members = self
            .client
            .fetch(&url)
            .await
            .json()
            .map(parse_view_members)
            .unwrap_or_default();
        info!(view, count = members.len(), "View members found");
        members
    }

    pub async fn category_relationships(&self, id: &str) -> Vec<String> {
        debug!(cwe = id, "Fetching category relationships");
        self.client
            .fetch(&self.category_url(id))
            .await
            .json()
            .map(parse_category_relationships)
            .unwrap_or_default()
    }

    /// Raw outcome of a weakness lookup for one or more identifiers
    pub async fn weaknesses(&self, ids: &[String]) -> FetchOutcome {
        self.client.fetch(&self.weakness_url(ids)).await
    }

    pub async fn weakness(&self, id: &str) -> FetchOutcome {
        self.client
            .fetch(&format!("{}/cwe/weakness/{}", self.base_url, id))
            .await
    }

    pub async fn all_weaknesses(&self) -> Vec<WeaknessRecord> {
        let url = self.weakness_all_url();
        info!(url = %url, "Fetching all weaknesses directly");
        self.client
            .fetch(&url)
            .await
            .json()
            .map(weaknesses_of)
            .unwrap_or_default()
    }

    /// `[{ID, Type}, ...]` for up to [`MAX_IDS_PER_REQUEST`] identifiers
    pub async fn type_info(&self, ids: &[String]) -> FetchOutcome {
        self.client.fetch(&self.info_url(ids)).await
    }

    pub async fn parents(&self, id: &str, view: Option<&str>) -> Vec<String> {
        self.related_ids(id, Relation::Parents, view, false).await
    }

    pub async fn children(&self, id: &str, view: Option<&str>) -> Vec<String> {
        self.related_ids(id, Relation::Children, view, false).await
    }

    pub async fn descendants(&self, id: &str, view: Option<&str>) -> Vec<String> {
        self.related_ids(id, Relation::Descendants, view, false).await
    }

    pub async fn ancestors(&self, id: &str, view: Option<&str>, primary_only: bool) -> Vec<String> {
        self.related_ids(id, Relation::Ancestors, view, primary_only).await
    }

    async fn related_ids(&self, id: &str, relation: Relation, view: Option<&str>, primary_only: bool) -> Vec<String> {
        let url = self.relation_url(id, relation, view, primary_only);
        debug!(cwe = id, relation = relation.path(), "Fetching related identifiers");
        let outcome = self.client.fetch(&url).await;
        let Some(value) = outcome.json() else {
            return Vec::new();
        };
        match relation {
            Relation::Parents | Relation::Children => parse_id_list(value),
            Relation::Descendants | Relation::Ancestors => parse_tree_ids(value),
        }
    }
}

/// Warn unless `base_url` points at an official MITRE host
pub fn check_endpoint(base_url: &str) -> bool {
    let host = match reqwest::Url::parse(base_url) {
        Ok(url) => url.host_str().unwrap_or_default().to_string(),
        Err(e) => {
            warn!(base_url, error = %e, "Base URL could not be parsed");
            return false;
        }
    };

    if is_trusted_domain(&host) {
        debug!(host = %host, "Connecting to trusted MITRE domain");
        true
    } else {
        warn!(host = %host, "Connecting to a non-official MITRE domain");
        warn!("Official MITRE CWE API domains: {}", TRUSTED_API_DOMAINS.join(", "));
        warn!("Please verify you trust this endpoint before proceeding");
        false
    }
}

/// `Weaknesses[]` of a weakness response
pub fn weaknesses_of(value: &Value) -> Vec<WeaknessRecord> {
    value
        .get("Weaknesses")
        .and_then(Value::as_array)
        .map(|items| items.iter().cloned().filter_map(WeaknessRecord::from_value).collect())
        .unwrap_or_default()
}

/// `Views[].Members[].CweID` (or `CWE_ID`)
pub fn parse_view_members(value: &Value) -> Vec<String> {
    nested_ids(value, "Views", "Members")
}

/// `Categories[].Relationships[].CweID` (or `CWE_ID`)
pub fn parse_category_relationships(value: &Value) -> Vec<String> {
    nested_ids(value, "Categories", "Relationships")
}

fn nested_ids(value: &Value, outer: &str, inner: &str) -> Vec<String> {
    value
        .get(outer)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get(inner).and_then(Value::as_array))
        .flatten()
        .filter_map(|member| {
            member
                .get("CWE_ID")
                .or_else(|| member.get("CweID"))
                .and_then(value_to_id)
        })
        .collect()
}

/// `ID` of every object in a top-level array
pub fn parse_id_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("ID").and_then(value_to_id))
        .collect()
}

/// Every `Data.ID` in a `{Data, Children|Parents}` tree, walked iteratively
///
/// The root may be a single node or a list of nodes.
pub fn parse_tree_ids(value: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<&Value> = match value {
        Value::Array(items) => items.iter().rev().collect(),
        other => vec![other],
    };

    while let Some(node) = stack.pop() {
        if let Some(id) = node.get("Data").and_then(|d| d.get("ID")).and_then(value_to_id) {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        for key in ["Children", "Parents"] {
            if let Some(next) = node.get(key).and_then(Value::as_array) {
                stack.extend(next.iter().rev());
            }
        }
    }
    ids
}
