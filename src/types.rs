//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Proxy protocol kinds managed by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Shadowsocks,
    Trojan,
    /// Protocols the bot knows about but has no test procedure for (vmess, tor, ...)
    Other,
}

impl Protocol {
    /// Directory and service name used on the router
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Shadowsocks => "shadowsocks",
            Protocol::Trojan => "trojan",
            Protocol::Other => "other",
        }
    }

    /// Display name, as shown in the bot menus
    pub fn display_name(&self) -> &'static str {
        match self {
            Protocol::Shadowsocks => "Shadowsocks",
            Protocol::Trojan => "Trojan",
            Protocol::Other => "Other",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "shadowsocks" | "ss" => Ok(Protocol::Shadowsocks),
            "trojan" => Ok(Protocol::Trojan),
            "vmess" | "v2ray" | "tor" | "other" => Ok(Protocol::Other),
            other => Err(AppError::parse(format!("Unknown protocol: {}", other))),
        }
    }
}

/// Outcome classifier for a single probe measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Measurement taken and parsed
    Success,
    /// Tool reported success but its output could not be parsed
    Ambiguous,
    /// Target or proxy did not answer
    Unreachable,
    /// No test procedure exists for this protocol
    NotSupported,
    /// Not measured (too few samples, no host, probe skipped)
    NoData,
}

impl ProbeStatus {
    /// Status glyph shown in place of a value
    pub fn glyph(&self) -> &'static str {
        match self {
            ProbeStatus::Success => "✅",
            ProbeStatus::Ambiguous => "⚠️",
            ProbeStatus::Unreachable => "❌",
            ProbeStatus::NotSupported => "➖",
            ProbeStatus::NoData => "N/A",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeStatus::Success)
    }
}

/// How a protocol's scratch client gets its local SOCKS port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortPolicy {
    /// The fixed diagnostic port from the settings is passed to the client
    Scratch,
    /// The client binds the port declared in its own configuration
    Declared,
}

/// HTTP backend used for the proxied probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpBackend {
    /// curl through the command runner (what the router ships)
    Curl,
    /// reqwest with a socks5h proxy
    Native,
}

impl FromStr for HttpBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "curl" => Ok(HttpBackend::Curl),
            "native" | "reqwest" => Ok(HttpBackend::Native),
            other => Err(AppError::parse(format!("Unknown HTTP backend: {}", other))),
        }
    }
}
