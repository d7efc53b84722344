//! Raw weakness records as returned by the CWE REST API
//!
//! Records are kept verbatim: the collection stage writes exactly what the
//! API (or the bulk snapshot) returned, and the graph stage reads fields on
//! demand. Sub-sections in the upstream JSON are inconsistent, a section may
//! be a list of objects or a single object, so accessors normalise that.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One weakness object from `Weaknesses[]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeaknessRecord(Map<String, Value>);

impl WeaknessRecord {
    /// Wrap a JSON value; only objects are records
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Record identifier (`ID`), numeric ids are rendered as strings
    pub fn id(&self) -> Option<String> {
        self.0.get("ID").and_then(value_to_id)
    }

    pub fn name(&self) -> Option<&str> {
        self.text("Name")
    }

    pub fn description(&self) -> Option<&str> {
        self.text("Description")
    }

    /// Non-empty string field
    pub fn text(&self, key: &str) -> Option<&str> {
        non_empty_str(self.0.get(key))
    }

    /// Sub-section normalised to a list of objects
    pub fn section(&self, key: &str) -> Vec<&Map<String, Value>> {
        one_or_many(self.0.get(key))
    }

    /// `MappingNotes.Usage`
    pub fn usage(&self) -> Option<&str> {
        self.0
            .get("MappingNotes")
            .and_then(Value::as_object)
            .and_then(|notes| notes.get("Usage"))
            .and_then(Value::as_str)
    }

    /// Records whose mapping usage is "Prohibited" must not be retained
    pub fn is_prohibited(&self) -> bool {
        self.usage()
            .map(|usage| usage.eq_ignore_ascii_case("prohibited"))
            .unwrap_or(false)
    }

    /// Typed relationships from `RelatedWeaknesses`
    ///
    /// Entries missing either a nature or a target are ignored.
    pub fn relationships(&self) -> Vec<Relationship> {
        self.section("RelatedWeaknesses")
            .into_iter()
            .filter_map(|rel| {
                let nature = non_empty_str(rel.get("Nature"))?;
                let target = rel.get("CweID").and_then(value_to_id)?;
                Some(Relationship {
                    nature: Nature::from(nature),
                    target,
                })
            })
            .collect()
    }
}

/// Relationship nature between two identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Nature {
    ChildOf,
    ParentOf,
    PeerOf,
    CanPrecede,
    /// Any other nature (CanFollow, Requires, ...); ignored by the graph
    Other(String),
}

impl From<&str> for Nature {
    fn from(value: &str) -> Self {
        match value {
            "ChildOf" => Nature::ChildOf,
            "ParentOf" => Nature::ParentOf,
            "PeerOf" => Nature::PeerOf,
            "CanPrecede" => Nature::CanPrecede,
            other => Nature::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nature::ChildOf => write!(f, "ChildOf"),
            Nature::ParentOf => write!(f, "ParentOf"),
            Nature::PeerOf => write!(f, "PeerOf"),
            Nature::CanPrecede => write!(f, "CanPrecede"),
            Nature::Other(other) => write!(f, "{}", other),
        }
    }
}

/// `(nature, target)` pair attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub nature: Nature,
    pub target: String,
}

/// Collection stage artifact: `{"Weaknesses": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeaknessDocument {
    #[serde(rename = "Weaknesses", default, deserialize_with = "deserialize_records")]
    pub weaknesses: Vec<WeaknessRecord>,
}

impl WeaknessDocument {
    pub fn new(weaknesses: Vec<WeaknessRecord>) -> Self {
        Self { weaknesses }
    }

    pub fn len(&self) -> usize {
        self.weaknesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weaknesses.is_empty()
    }
}

/// Null or scalar entries in `Weaknesses` are dropped instead of failing the document
fn deserialize_records<'de, D>(deserializer: D) -> std::result::Result<Vec<WeaknessRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.into_iter().filter_map(WeaknessRecord::from_value).collect())
}

/// Render an identifier field (`"79"` or `79`) as a string
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalise a list-or-object section into a list of objects
pub fn one_or_many(value: Option<&Value>) -> Vec<&Map<String, Value>> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(map)) => vec![map],
        _ => Vec::new(),
    }
}

/// Non-empty string value
pub fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> WeaknessRecord {
        WeaknessRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_id_accepts_string_and_number() {
        assert_eq!(record(json!({"ID": "79"})).id().as_deref(), Some("79"));
        assert_eq!(record(json!({"ID": 89})).id().as_deref(), Some("89"));
        assert_eq!(record(json!({"ID": ""})).id(), None);
        assert_eq!(record(json!({"Name": "x"})).id(), None);
    }

    #[test]
    fn test_non_objects_are_not_records() {
        assert!(WeaknessRecord::from_value(json!(null)).is_none());
        assert!(WeaknessRecord::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_prohibited_usage_is_case_insensitive() {
        assert!(record(json!({"MappingNotes": {"Usage": "Prohibited"}})).is_prohibited());
        assert!(record(json!({"MappingNotes": {"Usage": "PROHIBITED"}})).is_prohibited());
        assert!(!record(json!({"MappingNotes": {"Usage": "Allowed"}})).is_prohibited());
        assert!(!record(json!({"ID": "1"})).is_prohibited());
    }

    #[test]
    fn test_section_accepts_object_or_list() {
        let single = record(json!({"PotentialMitigations": {"Description": "a"}}));
        assert_eq!(single.section("PotentialMitigations").len(), 1);

        let many = record(json!({"PotentialMitigations": [{"Description": "a"}, null, {"Description": "b"}]}));
        assert_eq!(many.section("PotentialMitigations").len(), 2);

        assert!(single.section("Missing").is_empty());
    }

    #[test]
    fn test_relationships_skip_incomplete_entries() {
        let r = record(json!({
            "ID": "79",
            "RelatedWeaknesses": [
                {"Nature": "ChildOf", "CweID": "74"},
                {"Nature": "CanFollow", "CweID": "20"},
                {"Nature": "PeerOf"},
                {"CweID": "1"}
            ]
        }));

        let rels = r.relationships();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0], Relationship { nature: Nature::ChildOf, target: "74".into() });
        assert_eq!(rels[1].nature, Nature::Other("CanFollow".into()));
    }

    #[test]
    fn test_document_drops_non_object_entries() {
        let doc: WeaknessDocument =
            serde_json::from_value(json!({"Weaknesses": [{"ID": "1"}, null, 3]})).unwrap();
        assert_eq!(doc.len(), 1);

        let empty: WeaknessDocument = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_document_serializes_under_weaknesses_key() {
        let doc = WeaknessDocument::new(vec![record(json!({"ID": "79"}))]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"Weaknesses": [{"ID": "79"}]}));
    }
}
