//! Field extractors: raw record → markdown fragments and value sets

use cwe_common::record::{non_empty_str, WeaknessRecord};
use serde_json::Value;
use std::collections::BTreeSet;

/// Consequence scope that carries no information
const OTHER: &str = "Other";

/// Detail text from the descriptive sub-sections
///
/// Fragments are markdown, each ending in a newline, joined by newlines.
pub fn detail(record: &WeaknessRecord) -> String {
    let mut parts = Vec::new();

    if let Some(text) = record.text("ExtendedDescription") {
        parts.push(format!("**Extended Description:**\n{}\n", text));
    }

    let terms: Vec<&str> = record
        .section("AlternateTerms")
        .into_iter()
        .filter_map(|t| non_empty_str(t.get("Term")))
        .collect();
    if !terms.is_empty() {
        parts.push(format!("**Alternate Terms:** {}\n", terms.join(", ")));
    }

    for mode in record.section("ModesOfIntroduction") {
        if let Some(note) = non_empty_str(mode.get("Note")) {
            parts.push(format!("**Mode of Introduction:** {}\n", note));
        }
    }

    if let Some(background) = background_text(record.as_map().get("BackgroundDetails")) {
        parts.push(format!("**Background Details:**\n{}\n", background));
    }

    for consequence in record.section("CommonConsequences") {
        if let Some(note) = non_empty_str(consequence.get("Note")) {
            parts.push(format!("**Consequence Note:** {}\n", note));
        }
    }

    for example in record.section("DemonstrativeExamples") {
        if let Some(description) = non_empty_str(example.get("Description")) {
            parts.push(format!("**Example:**\n{}\n", description));
        }
    }

    parts.join("\n")
}

/// Mitigation text from detection methods and potential mitigations
pub fn mitigation(record: &WeaknessRecord) -> String {
    let mut parts = Vec::new();

    for method in record.section("DetectionMethods") {
        if let Some(description) = non_empty_str(method.get("Description")) {
            parts.push(format!("**Detection:** {}\n", description));
        }
    }

    for mitigation in record.section("PotentialMitigations") {
        if let Some(description) = non_empty_str(mitigation.get("Description")) {
            parts.push(format!("**Mitigation:** {}\n", description));
        }
        if let Some(notes) = non_empty_str(mitigation.get("EffectivenessNotes")) {
            parts.push(format!("**Effectiveness:** {}\n", notes));
        }
    }

    parts.join("\n")
}

/// Impact scopes of the common consequences, minus "Other"
pub fn scopes(record: &WeaknessRecord) -> BTreeSet<String> {
    let mut scopes = BTreeSet::new();
    for consequence in record.section("CommonConsequences") {
        let values: Vec<&Value> = match consequence.get("Scope") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(single) => vec![single],
            None => Vec::new(),
        };
        for scope in values.into_iter().filter_map(Value::as_str) {
            if !scope.is_empty() && scope != OTHER {
                scopes.insert(scope.to_string());
            }
        }
    }
    scopes
}

/// Named programming languages from the applicable platforms
pub fn languages(record: &WeaknessRecord) -> BTreeSet<String> {
    record
        .section("ApplicablePlatforms")
        .into_iter()
        .filter(|p| p.get("Type").and_then(Value::as_str) == Some("Language"))
        .filter(|p| p.get("Class").and_then(Value::as_str) != Some("Not Language-Specific"))
        .filter_map(|p| non_empty_str(p.get("Name")))
        .filter(|name| *name != OTHER)
        .map(str::to_string)
        .collect()
}

/// Background details are a string in some dumps and a list of strings in others
fn background_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let lines: Vec<&str> = items.iter().filter_map(Value::as_str).filter(|s| !s.is_empty()).collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        _ => None,
    }
}
