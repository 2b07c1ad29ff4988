//! rpc - JSON-RPC (v1, gorilla-style) поверх HTTP POST.
//!
//! Что здесь:
//! - RpcRequest / RpcResponse: конверт запроса `{method, params, id}` и ответа `{result, error, id}`;
//! - RpcCall: шов для протокольного слоя (remote.rs) - реальный клиент или фейк в тестах;
//! - JsonRpcClient (client.rs): single-shot, fail-fast клиент без ретраев, таймаут только на connect.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod client;

pub use client::JsonRpcClient;

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    pub params: &'a [Value],
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Value,
    /// `null` и отсутствие поля одинаково дают None.
    #[serde(default)]
    pub error: Option<Value>,
}

impl RpcResponse {
    /// Split into the `(result, error)` pair of the call contract.
    pub fn into_parts(self) -> (Value, Option<Value>) {
        (self.result, self.error.filter(|e| !e.is_null()))
    }
}

/// A JSON-RPC caller.
///
/// `call` returns the `result` member on success. A non-null `error` member
/// is surfaced as `ExportError::Protocol` carrying the error value verbatim.
pub trait RpcCall {
    fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value>;
}

impl<T: RpcCall + ?Sized> RpcCall for &mut T {
    fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value> {
        (**self).call(method, params)
    }
}
