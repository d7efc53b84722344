//! Graph assembly
//!
//! Records are folded into entries one at a time. Every mutation is
//! monotone (scalars fill once, sets only grow), so the result does not
//! depend on record order for sets and feeding the same record twice is a
//! no-op.

use crate::entry::GraphEntry;
use crate::fields;
use cwe_common::record::{Nature, WeaknessRecord};
use std::collections::HashMap;
use tracing::debug;

/// Which set of an entry an edge lands in
#[derive(Debug, Clone, Copy)]
enum Edge {
    Parent,
    Child,
    Related,
}

/// Counts reported after assembly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Records that contributed to the graph
    pub processed: usize,
    /// Records skipped (prohibited or without identifier)
    pub skipped: usize,
    /// Distinct entries, including stubs
    pub entries: usize,
}

/// Accumulates entries keyed by weakness identifier
#[derive(Debug, Default)]
pub struct GraphAssembler {
    entries: HashMap<String, GraphEntry>,
    processed: usize,
    skipped: usize,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the graph
    ///
    /// Returns false when the record was skipped.
    pub fn ingest(&mut self, record: &WeaknessRecord) -> bool {
        let Some(id) = record.id() else {
            debug!("Skipping record without identifier");
            self.skipped += 1;
            return false;
        };

        if record.is_prohibited() {
            debug!(cwe = %id, "Skipping prohibited record");
            self.skipped += 1;
            return false;
        }

        let detail = fields::detail(record);
        let mitigation = fields::mitigation(record);
        let scopes = fields::scopes(record);
        let languages = fields::languages(record);

        let entry = self.entry_mut(&id);
        if let Some(name) = record.name() {
            entry.fill_name(name);
        }
        if let Some(description) = record.description() {
            entry.fill_description(description);
        }
        entry.fill_detail(&detail);
        entry.merge_mitigation(&mitigation);
        entry.scopes.extend(scopes);
        entry.languages.extend(languages);

        for rel in record.relationships() {
            match rel.nature {
                Nature::ChildOf => self.link(&id, Edge::Parent, &rel.target, Edge::Child),
                Nature::ParentOf => self.link(&id, Edge::Child, &rel.target, Edge::Parent),
                Nature::PeerOf | Nature::CanPrecede => {
                    self.link(&id, Edge::Related, &rel.target, Edge::Related)
                }
                Nature::Other(ref nature) => {
                    debug!(cwe = %id, target = %rel.target, nature = %nature, "Ignoring relationship");
                }
            }
        }

        self.processed += 1;
        true
    }

    pub fn ingest_all<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a WeaknessRecord>,
    {
        for record in records {
            self.ingest(record);
        }
    }

    pub fn get(&self, id: &str) -> Option<&GraphEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> &HashMap<String, GraphEntry> {
        &self.entries
    }

    pub fn stats(&self) -> AssemblyStats {
        AssemblyStats {
            processed: self.processed,
            skipped: self.skipped,
            entries: self.entries.len(),
        }
    }

    pub fn into_entries(self) -> HashMap<String, GraphEntry> {
        self.entries
    }

    /// Record `from → to` in `from`'s `near` set and the mirror in `to`'s `far` set
    fn link(&mut self, from: &str, near: Edge, to: &str, far: Edge) {
        edge_set(self.entry_mut(from), near).insert(to.to_string());
        edge_set(self.entry_mut(to), far).insert(from.to_string());
    }

    fn entry_mut(&mut self, id: &str) -> &mut GraphEntry {
        self.entries
            .entry(id.to_string())
            .or_insert_with(|| GraphEntry::new(id))
    }
}

fn edge_set(entry: &mut GraphEntry, edge: Edge) -> &mut std::collections::BTreeSet<String> {
    match edge {
        Edge::Parent => &mut entry.parent,
        Edge::Child => &mut entry.children,
        Edge::Related => &mut entry.related,
    }
}

/// Assemble a full record stream into entries keyed by identifier
pub fn assemble<'a, I>(records: I) -> HashMap<String, GraphEntry>
where
    I: IntoIterator<Item = &'a WeaknessRecord>,
{
    let mut assembler = GraphAssembler::new();
    assembler.ingest_all(records);
    assembler.into_entries()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> WeaknessRecord {
        WeaknessRecord::from_value(value).unwrap()
    }

    fn ids(set: &std::collections::BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_child_of_creates_stub_with_mirrored_edge() {
        let graph = assemble(&[record(json!({
            "ID": "79",
            "Name": "XSS",
            "RelatedWeaknesses": [{"Nature": "ChildOf", "CweID": "707"}]
        }))]);

        assert_eq!(graph.len(), 2);
        assert_eq!(ids(&graph["79"].parent), vec!["707"]);
        let stub = &graph["707"];
        assert!(stub.is_stub());
        assert_eq!(ids(&stub.children), vec!["79"]);
    }

    #[test]
    fn test_peer_and_precede_are_related_both_ways() {
        let graph = assemble(&[record(json!({
            "ID": "20",
            "RelatedWeaknesses": [
                {"Nature": "PeerOf", "CweID": "1"},
                {"Nature": "CanPrecede", "CweID": "2"}
            ]
        }))]);

        assert_eq!(ids(&graph["20"].related), vec!["1", "2"]);
        assert_eq!(ids(&graph["1"].related), vec!["20"]);
        assert_eq!(ids(&graph["2"].related), vec!["20"]);
    }

    #[test]
    fn test_other_natures_create_nothing() {
        let graph = assemble(&[record(json!({
            "ID": "20",
            "RelatedWeaknesses": [{"Nature": "CanFollow", "CweID": "9"}]
        }))]);

        assert_eq!(graph.len(), 1);
        assert!(graph["20"].related.is_empty());
    }

    #[test]
    fn test_prohibited_record_contributes_nothing() {
        let mut assembler = GraphAssembler::new();
        assembler.ingest(&record(json!({
            "ID": "1000",
            "Name": "Prohibited",
            "MappingNotes": {"Usage": "Prohibited"},
            "RelatedWeaknesses": [{"Nature": "ParentOf", "CweID": "5"}]
        })));

        assert!(assembler.entries().is_empty());
        assert_eq!(assembler.stats().skipped, 1);
    }

    #[test]
    fn test_prohibited_id_still_stubbed_when_referenced() {
        let graph = assemble(&[
            record(json!({
                "ID": "1000",
                "Name": "Prohibited",
                "MappingNotes": {"Usage": "prohibited"}
            })),
            record(json!({
                "ID": "5",
                "RelatedWeaknesses": [{"Nature": "ChildOf", "CweID": "1000"}]
            })),
        ]);

        let stub = &graph["1000"];
        assert!(stub.name.is_none());
        assert_eq!(ids(&stub.children), vec!["5"]);
    }

    #[test]
    fn test_first_writer_wins_for_scalars() {
        let graph = assemble(&[
            record(json!({"ID": "79", "Description": ""})),
            record(json!({"ID": "79", "Name": "First", "Description": "Real"})),
            record(json!({"ID": "79", "Name": "Second", "Description": "Other"})),
        ]);

        assert_eq!(graph["79"].name.as_deref(), Some("First"));
        assert_eq!(graph["79"].description.as_deref(), Some("Real"));
    }

    #[test]
    fn test_ingesting_twice_is_idempotent() {
        let r = record(json!({
            "ID": "89",
            "Name": "SQL Injection",
            "CommonConsequences": [{"Scope": ["Confidentiality"], "Note": "Data read"}],
            "PotentialMitigations": [{"Description": "Use prepared statements"}],
            "ApplicablePlatforms": [{"Type": "Language", "Name": "SQL"}],
            "RelatedWeaknesses": [{"Nature": "ChildOf", "CweID": "943"}]
        }));

        let once = assemble(std::iter::once(&r));
        let twice = assemble([&r, &r]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_records_without_id_are_skipped() {
        let mut assembler = GraphAssembler::new();
        assert!(!assembler.ingest(&record(json!({"Name": "anonymous"}))));
        assert!(assembler.ingest(&record(json!({"ID": 7}))));

        let stats = assembler.stats();
        assert_eq!(stats, AssemblyStats { processed: 1, skipped: 1, entries: 1 });
        assert!(assembler.get("7").is_some());
    }
}
