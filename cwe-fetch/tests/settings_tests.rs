//! Settings resolution from config files and a full harvest-to-disk run

mod common;

use common::{fast_retry, record, spawn, MockApi};
use cwe_common::config::{load_config, CONFIG_ENV_VAR};
use cwe_common::output::write_json_atomic;
use cwe_common::WeaknessDocument;
use cwe_fetch::pacing::PacingConfig;
use cwe_fetch::{CliOverrides, FetchSettings, Harvester, Scope};
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
#[serial]
fn test_settings_from_env_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("harvest.toml");
    std::fs::write(
        &path,
        r#"
[api]
base_url = "http://127.0.0.1:9/api/v1"
view = "1000"

[collector]
max_workers = 6
batch_size = 10
max_retries = 1
"#,
    )
    .unwrap();
    std::env::set_var(CONFIG_ENV_VAR, &path);

    let toml = load_config(None).unwrap();
    let settings = FetchSettings::resolve(
        &CliOverrides {
            batch_size: Some(3),
            ..CliOverrides::default()
        },
        &toml,
    );

    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(settings.base_url, "http://127.0.0.1:9/api/v1");
    assert_eq!(settings.view, "1000");
    assert_eq!(settings.workers, 6);
    assert_eq!(settings.batch_size, 3);
    assert_eq!(settings.max_retries, 1);
}

#[test]
#[serial]
fn test_cli_overrides_beat_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("harvest.toml");
    std::fs::write(&path, "[api]\nview = \"1000\"\n[collector]\nmax_workers = 6\n").unwrap();

    let toml = load_config(Some(&path)).unwrap();
    let settings = FetchSettings::resolve(
        &CliOverrides {
            view: Some("699".into()),
            max_workers: Some(0),
            insecure: true,
            ..CliOverrides::default()
        },
        &toml,
    );

    assert_eq!(settings.view, "699");
    assert_eq!(settings.workers, 1);
    assert!(settings.insecure);
}

#[tokio::test]
async fn test_harvest_writes_document_and_graph() {
    let mut api = MockApi::default();
    api.weaknesses.insert("74".into(), record("74"));
    api.weaknesses.insert(
        "79".into(),
        json!({
            "ID": "79",
            "Name": "Cross-site Scripting",
            "RelatedWeaknesses": [{"Nature": "ChildOf", "CweID": "74"}]
        }),
    );
    api.view = vec!["74".into(), "79".into()];
    let base = spawn(Arc::new(api)).await;

    let settings = FetchSettings {
        base_url: base.clone(),
        fallback_url: format!("{}/snapshot.json", base),
        workers: 2,
        ..FetchSettings::default()
    };
    let harvester = Harvester::from_settings_with(&settings, fast_retry(), PacingConfig::immediate()).unwrap();
    harvester.probe().await.unwrap();
    let records = harvester.collect(&Scope::View("699".into())).await.unwrap();

    let dir = TempDir::new().unwrap();
    let raw_path = dir.path().join("raw.json");
    let document = WeaknessDocument::new(records);
    write_json_atomic(&document, &raw_path, true).unwrap();

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&raw_path).unwrap()).unwrap();
    assert_eq!(raw["Weaknesses"].as_array().unwrap().len(), 2);

    let graph_path = dir.path().join("cwes.json");
    let graph = cwe_graph::assemble(&document.weaknesses);
    cwe_graph::write_graph(&graph, &graph_path, cwe_graph::WriteMode::Merge, false).unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&graph_path).unwrap()).unwrap();
    let entries = written.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["cwe"], "74");
    assert_eq!(entries[0]["children"], json!(["79"]));
    assert_eq!(entries[1]["cwe"], "79");
    assert_eq!(entries[1]["parent"], json!(["74"]));
}
