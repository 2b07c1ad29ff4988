// Общие фикстуры интеграционных тестов: in-memory нода с DB.* методами
// и её HTTP-обёртка на tiny_http.
#![allow(dead_code)]

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use QuiverDump::{ExportError, RpcCall};

pub fn unique_root(prefix: &str) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("qdump-{}-{}-{}-{}", prefix, pid, t, n))
}

/// Key `[prefix][u32 BE n]`.
pub fn key(prefix: u8, n: u32) -> Vec<u8> {
    let mut k = vec![prefix];
    k.extend_from_slice(&n.to_be_bytes());
    k
}

/// In-memory node implementing DB.OpenSnapshot / DB.GetIterator / DB.ReleaseSnapshot.
#[derive(Default)]
pub struct FakeNode {
    pub data: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Server-side clamp of the page size (echoed back as `limit`).
    pub max_page: Option<u64>,
    /// Fail the N-th GetIterator call (1-based) with a protocol error.
    pub fail_on_page: Option<usize>,
    /// Misbehave: serve every page from the start of the category.
    pub ignore_cursor: bool,

    pub calls: Vec<(String, Value)>,
    pub opened: u32,
    pub released: u32,
    pages_served: usize,
    active: Option<Value>,
}

impl FakeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, prefix: u8, n: u32) -> Self {
        for i in 0..n {
            self.data
                .insert(key(prefix, i), format!("v{}-{}", prefix, i).into_bytes());
        }
        self
    }

    pub fn insert(&mut self, k: &[u8], v: &[u8]) {
        self.data.insert(k.to_vec(), v.to_vec());
    }

    pub fn iterator_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|(m, _)| m == "DB.GetIterator")
            .count()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Ok(result) or Err(error payload) - as the JSON-RPC envelope carries them.
    pub fn handle(&mut self, method: &str, params: &[Value]) -> std::result::Result<Value, Value> {
        let arg = params.first().cloned().unwrap_or(Value::Null);
        self.calls.push((method.to_string(), arg.clone()));
        match method {
            "DB.OpenSnapshot" => {
                self.opened += 1;
                let snap = json!(format!("snap-{}", self.opened));
                self.active = Some(snap.clone());
                Ok(json!({ "snapshot": snap }))
            }
            "DB.ReleaseSnapshot" => {
                if self.active.as_ref() != Some(&arg["snapshot"]) {
                    return Err(json!("snapshot not found"));
                }
                self.released += 1;
                self.active = None;
                Ok(json!(true))
            }
            "DB.GetIterator" => self.iterate(&arg),
            other => Err(json!(format!("rpc: can't find method {}", other))),
        }
    }

    fn iterate(&mut self, arg: &Value) -> std::result::Result<Value, Value> {
        self.pages_served += 1;
        if self.fail_on_page == Some(self.pages_served) {
            return Err(json!("iterator failed"));
        }
        if self.active.as_ref() != Some(&arg["snapshot"]) {
            return Err(json!("snapshot not found"));
        }
        let prefix = arg["prefix"]
            .as_str()
            .and_then(|s| s.chars().next())
            .map(|c| c as u32 as u8)
            .ok_or_else(|| json!("bad prefix"))?;
        let opts = &arg["options"];
        let mut limit = opts["limit"].as_u64().ok_or_else(|| json!("bad limit"))?;
        if let Some(m) = self.max_page {
            limit = limit.min(m);
        }
        let cursor = match opts["cursor"].as_str() {
            Some(c) if !self.ignore_cursor => {
                Some(B64.decode(c).map_err(|e| json!(e.to_string()))?)
            }
            _ => None,
        };

        let start = match &cursor {
            Some(c) => Bound::Excluded(c.clone()),
            None => Bound::Included(vec![prefix]),
        };
        let items: Vec<Value> = self
            .data
            .range::<Vec<u8>, _>((start, Bound::Unbounded))
            .take_while(|(k, _)| k.first() == Some(&prefix))
            .take(limit.min(usize::MAX as u64) as usize)
            .map(|(k, v)| json!({"Key": B64.encode(k), "Value": B64.encode(v)}))
            .collect();
        Ok(json!({ "items": items, "limit": limit }))
    }
}

impl RpcCall for FakeNode {
    fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.handle(method, &params)
            .map_err(|e| ExportError::Protocol(e).into())
    }
}

/// What the HTTP fixture answers: status code and raw body.
pub type Reply = (u16, String);

/// tiny_http server on 127.0.0.1:<ephemeral>. Every request body is parsed
/// as JSON and recorded; the handler produces the reply.
pub struct HttpFixture {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Value>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HttpFixture {
    pub fn start<F>(mut handler: F) -> Result<Self>
    where
        F: FnMut(&Value) -> Reply + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|e| anyhow::anyhow!("bind fixture: {}", e))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow::anyhow!("fixture is not on an ip socket"))?;
        let url = format!("http://{}/jsonrpc", addr);

        let requests = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let (req_log, stop_flag) = (requests.clone(), stop.clone());

        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                let mut rq = match server.recv_timeout(Duration::from_millis(20)) {
                    Ok(Some(rq)) => rq,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                let mut body = String::new();
                let _ = rq.as_reader().read_to_string(&mut body);
                let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                req_log.lock().unwrap().push(parsed.clone());

                let (status, text) = handler(&parsed);
                let resp = tiny_http::Response::from_string(text).with_status_code(status);
                let _ = rq.respond(resp);
            }
        });

        Ok(Self {
            url,
            requests,
            stop,
            handle: Some(handle),
        })
    }

    /// JSON-RPC front for a FakeNode.
    pub fn serve_node(node: Arc<Mutex<FakeNode>>) -> Result<Self> {
        Self::start(move |req| {
            let method = req["method"].as_str().unwrap_or_default().to_string();
            let params = req["params"].as_array().cloned().unwrap_or_default();
            let id = req["id"].clone();
            let out = node.lock().unwrap().handle(&method, &params);
            let env = match out {
                Ok(result) => json!({"id": id, "result": result, "error": null}),
                Err(error) => json!({"id": id, "result": null, "error": error}),
            };
            (200, env.to_string())
        })
    }

    pub fn request_ids(&self) -> Vec<u64> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r["id"].as_u64())
            .collect()
    }
}

impl Drop for HttpFixture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
