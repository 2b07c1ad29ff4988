use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{RpcCall, RpcRequest, RpcResponse};
use crate::error::ExportError;
use crate::metrics::{record_rpc_protocol_error, record_rpc_request};

/// TCP connect timeout. Ответ сервера ждём без ограничения: страница может быть огромной.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking JSON-RPC client: one POST per call, no retry.
///
/// Only connecting is bounded (`CONNECT_TIMEOUT`); reading the response has
/// no timeout.
///
/// Request ids start at 1 and advance once per call, whether the call
/// succeeds or not.
pub struct JsonRpcClient {
    endpoint: Url,
    agent: ureq::Agent,
    next_id: u64,
}

impl JsonRpcClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Ok(Self {
            endpoint,
            agent,
            next_id: 1,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Id the next request will carry.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Send one request and decode the envelope.
    /// Fails on transport problems only; a protocol `error` is returned inside the response.
    pub fn call_raw(&mut self, method: &str, params: &[Value]) -> Result<RpcResponse> {
        let id = self.next_id;
        self.next_id += 1;

        let payload = serde_json::to_string(&RpcRequest { method, params, id })
            .context("encode json-rpc request")?;
        record_rpc_request();
        debug!("rpc: -> {} id={} ({} B)", method, id, payload.len());

        let resp = match self
            .agent
            .post(self.endpoint.as_str())
            .set("Content-Type", "application/json")
            .send_string(&payload)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(ExportError::Transport { status, body }.into());
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(ExportError::Connect(format!("{}: {}", self.endpoint, err)).into());
            }
        };

        // ureq пропускает любые 2xx; сервис отвечает ровно 200
        if resp.status() != 200 {
            let status = resp.status();
            let body = resp.into_string().unwrap_or_default();
            return Err(ExportError::Transport { status, body }.into());
        }

        // into_string() режет тело на 10 MiB, а страница может быть огромной
        let decoded: RpcResponse = serde_json::from_reader(resp.into_reader())
            .map_err(|e| ExportError::decode(format!("{} response id={}: {}", method, id, e)))?;
        debug!("rpc: <- {} id={}", method, id);
        Ok(decoded)
    }
}

impl RpcCall for JsonRpcClient {
    fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value> {
        let (result, error) = self.call_raw(method, &params)?.into_parts();
        if let Some(err) = error {
            record_rpc_protocol_error();
            return Err(ExportError::Protocol(err).into());
        }
        Ok(result)
    }
}

fn parse_endpoint(s: &str) -> Result<Url> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ExportError::config("json-rpc endpoint must be given").into());
    }
    let url = Url::parse(s)
        .map_err(|e| ExportError::config(format!("invalid json-rpc endpoint '{}': {}", s, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExportError::config(format!(
            "unsupported json-rpc endpoint scheme '{}' (expected http or https)",
            other
        ))
        .into()),
    }
}
