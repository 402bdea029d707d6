//! Proxy configuration under test

use crate::models::config::ProtocolProfile;
use crate::types::{AppError, Protocol, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Local port assumed when a config does not declare one
pub const DEFAULT_LOCAL_PORT: u16 = 1080;

/// One configuration under test.
///
/// Read fresh from the config store at the start of every run and never
/// mutated afterwards. The server host and local port are resolved once,
/// through the protocol profile's field names, when the value is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfigRef {
    pub protocol: Protocol,
    pub path: PathBuf,
    values: Map<String, Value>,
    server_host: Option<String>,
    local_port: Option<u16>,
}

impl ProxyConfigRef {
    /// Resolve a parsed config document against a protocol profile
    pub fn resolve(
        protocol: Protocol,
        path: impl Into<PathBuf>,
        document: Value,
        profile: &ProtocolProfile,
    ) -> Result<Self> {
        let path = path.into();
        let values = match document {
            Value::Object(map) => map,
            other => {
                return Err(AppError::config(format!(
                    "{} is not a JSON object (found {})",
                    path.display(),
                    json_kind(&other)
                )))
            }
        };

        let server_host = values
            .get(&profile.host_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string);

        let local_port = values.get(&profile.local_port_field).and_then(port_value);

        Ok(Self {
            protocol,
            path,
            values,
            server_host,
            local_port,
        })
    }

    /// Declared server host, if present and non-blank
    pub fn server_host(&self) -> Option<&str> {
        self.server_host.as_deref()
    }

    /// Declared local port, if present and valid
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// Declared local port or the conventional default
    pub fn local_port_or_default(&self) -> u16 {
        self.local_port.unwrap_or(DEFAULT_LOCAL_PORT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw field lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// File name shown in reports and logs
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// Ports show up both as numbers and as strings in hand-edited configs
fn port_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }
    .filter(|port| *port != 0)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
