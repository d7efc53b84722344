//! Graph artifact read/write tests

use cwe_graph::output::load_document;
use cwe_graph::{assemble, write_graph, GraphEntry, GraphError, WriteMode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

fn write_input(dir: &Path, value: &Value) -> std::path::PathBuf {
    let path = dir.join("weaknesses.json");
    std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

fn read_entries(path: &Path) -> Vec<GraphEntry> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn single(id: &str, name: &str) -> HashMap<String, GraphEntry> {
    let mut entry = GraphEntry::new(id);
    entry.fill_name(name);
    HashMap::from([(id.to_string(), entry)])
}

#[test]
fn test_load_missing_input_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_document(&temp_dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, GraphError::InputNotFound(_)));
}

#[test]
fn test_load_rejects_non_document_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_input(temp_dir.path(), &json!([1, 2, 3]));
    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput { .. }));
}

#[test]
fn test_pipeline_writes_sorted_linked_entries() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        &json!({"Weaknesses": [
            {
                "ID": "89",
                "Name": "SQL Injection",
                "RelatedWeaknesses": [{"Nature": "ChildOf", "CweID": "943"}]
            },
            {
                "ID": "79",
                "Name": "XSS",
                "RelatedWeaknesses": [{"Nature": "ChildOf", "CweID": "74"}]
            }
        ]}),
    );
    let output = temp_dir.path().join("out").join("cwes.json");

    let document = load_document(&input).unwrap();
    let graph = assemble(&document.weaknesses);
    let summary = write_graph(&graph, &output, WriteMode::Merge, false).unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.existing, 0);

    let written = read_entries(&output);
    let ids: Vec<&str> = written.iter().map(|e| e.cwe.as_str()).collect();
    assert_eq!(ids, vec!["74", "79", "89", "943"]);
    assert!(written[0].children.contains("79"));
}

#[test]
fn test_merge_keeps_old_entries_and_new_wins() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("cwes.json");

    let mut first = single("1", "Old one");
    first.extend(single("2", "Old two"));
    write_graph(&first, &output, WriteMode::Merge, false).unwrap();

    let summary = write_graph(&single("2", "New two"), &output, WriteMode::Merge, true).unwrap();
    assert_eq!(summary.existing, 2);
    assert_eq!(summary.replaced, 1);
    assert_eq!(summary.total, 2);

    let written = read_entries(&output);
    assert_eq!(written[0].name.as_deref(), Some("Old one"));
    assert_eq!(written[1].name.as_deref(), Some("New two"));
}

#[test]
fn test_overwrite_discards_existing_entries() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("cwes.json");

    write_graph(&single("1", "Old"), &output, WriteMode::Overwrite, false).unwrap();
    let summary = write_graph(&single("2", "New"), &output, WriteMode::Overwrite, false).unwrap();

    assert_eq!(summary.existing, 0);
    let written = read_entries(&output);
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].cwe, "2");
}

#[test]
fn test_unreadable_existing_file_is_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("cwes.json");
    std::fs::write(&output, "not json at all").unwrap();

    let summary = write_graph(&single("7", "Seven"), &output, WriteMode::Merge, false).unwrap();

    assert_eq!(summary.existing, 0);
    assert_eq!(read_entries(&output).len(), 1);
}

#[test]
fn test_malformed_existing_entries_are_skipped_individually() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("cwes.json");
    write_graph(&single("1", "One"), &output, WriteMode::Overwrite, false).unwrap();

    let mut items: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    items.push(json!({"cwe": 5}));
    items.push(json!("garbage"));
    std::fs::write(&output, serde_json::to_string(&items).unwrap()).unwrap();

    let summary = write_graph(&single("2", "Two"), &output, WriteMode::Merge, false).unwrap();
    assert_eq!(summary.existing, 1);
    assert_eq!(summary.total, 2);

    let written = read_entries(&output);
    assert_eq!(written[0].cwe, "1");
    assert_eq!(written[0].name.as_deref(), Some("One"));
    assert_eq!(written[1].cwe, "2");
}
