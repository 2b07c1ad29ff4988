//! Error taxonomy for the exporter.
//!
//! Все ошибки пробрасываются через `anyhow::Error`; типизированный `ExportError`
//! лежит внутри и достаётся через `downcast_ref` (тесты, код выхода).
//!
//! Классы:
//! - Config       - неверные аргументы/окружение, до любой сетевой активности;
//! - Connect      - HTTP-запрос не дошёл до сервера;
//! - Transport    - ответ с не-2xx статусом;
//! - Protocol     - в JSON-RPC конверте ненулевой `error`;
//! - Precondition - ресурс уже существует (каталог архива и т.п.);
//! - Decode       - битый JSON/base64 в ответе или в архиве;
//! - Invariant    - нарушен порядок ключей/маршрутизация по префиксу.

use serde_json::Value;
use std::fmt;

#[derive(Debug)]
pub enum ExportError {
    Config(String),
    Connect(String),
    Transport { status: u16, body: String },
    Protocol(Value),
    Precondition(String),
    Decode(String),
    Invariant(String),
}

impl ExportError {
    pub fn config(msg: impl Into<String>) -> Self {
        ExportError::Config(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        ExportError::Precondition(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        ExportError::Decode(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        ExportError::Invariant(msg.into())
    }

    /// Short class name, used in logs and in the JSON summary.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Config(_) => "config",
            ExportError::Connect(_) => "connect",
            ExportError::Transport { .. } => "transport",
            ExportError::Protocol(_) => "protocol",
            ExportError::Precondition(_) => "precondition",
            ExportError::Decode(_) => "decode",
            ExportError::Invariant(_) => "invariant",
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Config(m) => write!(f, "configuration error: {}", m),
            ExportError::Connect(m) => write!(f, "connection failed: {}", m),
            ExportError::Transport { status, body } => {
                if body.is_empty() {
                    write!(f, "failed to get response: status={}", status)
                } else {
                    write!(f, "failed to get response: status={} body={}", status, body)
                }
            }
            ExportError::Protocol(v) => write!(f, "remote error: {}", v),
            ExportError::Precondition(m) => write!(f, "precondition failed: {}", m),
            ExportError::Decode(m) => write!(f, "decode error: {}", m),
            ExportError::Invariant(m) => write!(f, "invariant violated: {}", m),
        }
    }
}

impl std::error::Error for ExportError {}

/// Найти `ExportError` в цепочке anyhow (в том числе под `.context(..)`).
pub fn find_export_error(err: &anyhow::Error) -> Option<&ExportError> {
    err.chain().find_map(|e| e.downcast_ref::<ExportError>())
}
