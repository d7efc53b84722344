//! In-process stand-in for the CWE REST API

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use cwe_fetch::pacing::PacingConfig;
use cwe_fetch::retry::RetryPolicy;
use cwe_fetch::{FetchSettings, Harvester};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Default)]
pub struct MockApi {
    /// Weakness id → record
    pub weaknesses: BTreeMap<String, Value>,
    /// Category id → member ids
    pub categories: BTreeMap<String, Vec<String>>,
    pub view: Vec<String>,
    pub children: BTreeMap<String, Vec<String>>,
    pub parents: BTreeMap<String, Vec<String>>,
    /// Multi-id weakness requests answer 503
    pub fail_groups: bool,
    /// Type info omits categories
    pub hide_categories: bool,
    /// Type info answers with this status instead
    pub type_info_status: Option<u16>,
    /// `/cwe/weakness/all` returns an empty list
    pub all_empty: bool,
    /// Served at `/snapshot.json`
    pub snapshot: Option<Value>,
    /// Number of weakness requests to answer with 429 before serving
    pub rate_limited: AtomicUsize,
    /// Number of weakness requests to answer with 500 before serving
    pub failing: AtomicUsize,
    /// Multi-id weakness requests stall this long before answering
    pub slow_groups: Option<Duration>,
    pub hits: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn with_weaknesses(ids: &[&str]) -> Self {
        Self {
            weaknesses: ids.iter().map(|id| (id.to_string(), record(id))).collect(),
            ..Default::default()
        }
    }

    /// Requests received for an exact path (and query)
    pub fn hits(&self, target: &str) -> usize {
        self.hits.lock().iter().filter(|t| t.as_str() == target).count()
    }

    pub fn hits_starting_with(&self, prefix: &str) -> usize {
        self.hits.lock().iter().filter(|t| t.starts_with(prefix)).count()
    }

    /// Most identifiers carried by one `/cwe/weakness/{list}` request
    pub fn largest_weakness_list(&self) -> usize {
        self.hits
            .lock()
            .iter()
            .filter_map(|t| t.strip_prefix("/cwe/weakness/"))
            .filter(|ids| *ids != "all")
            .map(|ids| ids.split(',').count())
            .max()
            .unwrap_or(0)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn weakness_response(&self, ids: &str) -> Response {
        if Self::take(&self.rate_limited) {
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
        if Self::take(&self.failing) {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        if ids == "all" {
            let all: Vec<Value> = if self.all_empty {
                Vec::new()
            } else {
                self.weaknesses.values().cloned().collect()
            };
            return Json(json!({ "Weaknesses": all })).into_response();
        }

        let list: Vec<&str> = ids.split(',').collect();
        if list.len() > 1 && self.fail_groups {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }

        let mut records = Vec::new();
        for id in list {
            if self.categories.contains_key(id) {
                let body = format!("CWE-{} is a Category, use the category endpoint", id);
                return (StatusCode::NOT_FOUND, body).into_response();
            }
            match self.weaknesses.get(id) {
                Some(record) => records.push(record.clone()),
                None => return (StatusCode::NOT_FOUND, "Weakness not found").into_response(),
            }
        }
        Json(json!({ "Weaknesses": records })).into_response()
    }

    fn type_info(&self, ids: &str) -> Response {
        if let Some(code) = self.type_info_status {
            return StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
        let info: Vec<Value> = ids
            .split(',')
            .filter_map(|id| {
                if self.categories.contains_key(id) {
                    (!self.hide_categories).then(|| json!({"ID": id, "Type": "category"}))
                } else if self.weaknesses.contains_key(id) {
                    Some(json!({"ID": id, "Type": "weakness"}))
                } else {
                    None
                }
            })
            .collect();
        Json(Value::Array(info)).into_response()
    }

    fn category(&self, id: &str) -> Response {
        match self.categories.get(id) {
            Some(members) => {
                let relationships: Vec<Value> = members.iter().map(|m| json!({"CweID": m})).collect();
                Json(json!({"Categories": [{"ID": id, "Relationships": relationships}]})).into_response()
            }
            None => (StatusCode::NOT_FOUND, "Category not found").into_response(),
        }
    }
}

pub fn record(id: &str) -> Value {
    json!({
        "ID": id,
        "Name": format!("Weakness {}", id),
        "Description": format!("Description of CWE-{}", id),
    })
}

fn id_list(ids: Option<&Vec<String>>) -> Response {
    let items: Vec<Value> = ids.into_iter().flatten().map(|id| json!({"ID": id})).collect();
    Json(Value::Array(items)).into_response()
}

fn tree(root: &str, key: &str, ids: Option<&Vec<String>>) -> Value {
    let nodes: Vec<Value> = ids
        .into_iter()
        .flatten()
        .map(|id| json!({"Data": {"ID": id}}))
        .collect();
    json!({"Data": {"ID": root}, key: nodes})
}

async fn handle(State(api): State<Arc<MockApi>>, uri: Uri) -> Response {
    let target = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    api.hits.lock().push(target);

    let segments: Vec<&str> = uri.path().trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["snapshot.json"] => match &api.snapshot {
            Some(snapshot) => Json(snapshot.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        ["cwe", "version"] => Json(json!({
            "ContentVersion": "4.15",
            "ContentDate": "2024-07-16",
            "TotalWeaknesses": 964
        }))
        .into_response(),
        ["cwe", "view", _] => {
            let members: Vec<Value> = api.view.iter().map(|id| json!({"CweID": id})).collect();
            Json(json!({"Views": [{"Members": members}]})).into_response()
        }
        ["cwe", "category", id] => api.category(id),
        ["cwe", "weakness", ids] => {
            if let Some(stall) = api.slow_groups.filter(|_| ids.contains(',')) {
                tokio::time::sleep(stall).await;
            }
            api.weakness_response(ids)
        }
        ["cwe", id, "children"] => id_list(api.children.get(*id)),
        ["cwe", id, "parents"] => id_list(api.parents.get(*id)),
        ["cwe", id, "descendants"] => match api.children.get(*id) {
            Some(children) => Json(tree(id, "Children", Some(children))).into_response(),
            None => Json(json!({})).into_response(),
        },
        ["cwe", id, "ancestors"] => Json(json!([tree(id, "Parents", api.parents.get(*id))])).into_response(),
        ["cwe", ids] => api.type_info(ids),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `api` on an ephemeral port; returns the base URL
pub async fn spawn(api: Arc<MockApi>) -> String {
    let app = Router::new().fallback(handle).with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL on which nothing is listening
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn fast_retry() -> RetryPolicy {
    let ms = Duration::from_millis;
    RetryPolicy {
        max_retries: 1,
        connection_base: ms(1),
        timeout_base: ms(1),
        rate_limit_wait: ms(1),
        transport_attempts: 2,
        transport_base: ms(1),
        transport_cap: ms(5),
    }
}

pub fn settings(base_url: &str, fallback_url: &str) -> FetchSettings {
    FetchSettings {
        base_url: base_url.to_string(),
        view: "699".to_string(),
        fallback_url: fallback_url.to_string(),
        insecure: false,
        workers: 4,
        batch_size: 2,
        cache_capacity: 1000,
        max_retries: 1,
    }
}

pub fn harvester(base_url: &str, fallback_url: &str) -> Harvester {
    harvester_with(&settings(base_url, fallback_url), PacingConfig::immediate())
}

pub fn harvester_with(settings: &FetchSettings, pacing: PacingConfig) -> Harvester {
    Harvester::from_settings_with(settings, fast_retry(), pacing).unwrap()
}

/// Raw TCP endpoint that drops the first `resets` connections, then answers
/// every request with `200 {}`; returns the base URL and a connection counter
pub async fn resetting_server(resets: usize) -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen = counter.fetch_add(1, Ordering::SeqCst);
            if seen < resets {
                drop(socket);
                continue;
            }
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (format!("http://{}", addr), connections)
}

pub fn sorted_ids(records: &[cwe_common::WeaknessRecord]) -> Vec<String> {
    let mut ids: Vec<String> = records.iter().filter_map(|r| r.id()).collect();
    ids.sort();
    ids
}
