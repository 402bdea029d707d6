//! Probe results and diagnostic reports

use crate::types::{ProbeStatus, Protocol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One measurement outcome.
///
/// Non-success results always carry a non-empty detail string; the
/// constructors substitute a generic one when given a blank detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Presentation string ("42 мс", "1.23 МБ/с" or a status glyph)
    pub value: String,
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeResult {
    pub fn success(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status: ProbeStatus::Success,
            detail: None,
        }
    }

    /// Tool succeeded but its output could not be parsed
    pub fn ambiguous(detail: impl Into<String>) -> Self {
        Self::failure(ProbeStatus::Ambiguous, detail.into(), "не удалось разобрать вывод")
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::failure(ProbeStatus::Unreachable, detail.into(), "нет ответа")
    }

    pub fn not_supported(detail: impl Into<String>) -> Self {
        Self::failure(ProbeStatus::NotSupported, detail.into(), "тест не поддерживается")
    }

    pub fn no_data(detail: impl Into<String>) -> Self {
        Self::failure(ProbeStatus::NoData, detail.into(), "нет данных")
    }

    fn failure(status: ProbeStatus, detail: String, fallback: &str) -> Self {
        let detail = if detail.trim().is_empty() {
            fallback.to_string()
        } else {
            detail
        };
        Self {
            value: status.glyph().to_string(),
            status,
            detail: Some(detail),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Numeric reading behind a success value, in the unit it is shown in
    /// (milliseconds, KiB/s or MiB/s)
    pub fn numeric_value(&self) -> Option<f64> {
        if !self.is_success() {
            return None;
        }
        self.value
            .split_whitespace()
            .next()
            .and_then(|number| number.parse::<f64>().ok())
    }

    /// Success readings of throughput converted back to bytes per second
    pub fn bytes_per_sec(&self) -> Option<f64> {
        let number = self.numeric_value()?;
        if self.value.ends_with("МБ/с") {
            Some(number * 1024.0 * 1024.0)
        } else if self.value.ends_with("КБ/с") {
            Some(number * 1024.0)
        } else {
            None
        }
    }

    /// Detail text, or an empty string for success results
    pub fn detail_or_empty(&self) -> &str {
        self.detail.as_deref().unwrap_or("")
    }
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// Latency with its jitter, as produced by the ping and proxied latency probes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyProbe {
    pub latency: ProbeResult,
    pub jitter: ProbeResult,
}

/// Direct ICMP probe result
pub type PingProbe = LatencyProbe;

impl LatencyProbe {
    pub fn new(latency: ProbeResult, jitter: ProbeResult) -> Self {
        Self { latency, jitter }
    }

    /// Same failure for latency, jitter marked as not measured
    pub fn failed(latency: ProbeResult) -> Self {
        let jitter = ProbeResult::no_data(
            latency
                .detail
                .clone()
                .unwrap_or_else(|| "задержка не измерена".to_string()),
        );
        Self { latency, jitter }
    }
}

/// Aggregate result for one configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub protocol: Protocol,
    /// Config file name
    pub config: String,
    /// Resolved server host, empty when the config declares none
    pub server: String,
    pub ping: ProbeResult,
    pub ping_jitter: ProbeResult,
    pub latency: ProbeResult,
    pub latency_jitter: ProbeResult,
    pub speed: ProbeResult,
    /// Free-text summary for the proxied part of the run
    pub details: String,
    /// Output drained from a client that exited during the settle window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_output: Option<String>,
    pub tested_at: DateTime<Utc>,
}

impl DiagnosticReport {
    /// True when every proxied probe measured something
    pub fn proxy_ok(&self) -> bool {
        self.latency.is_success() && self.speed.is_success()
    }
}

/// What `test_full_proxy` hands back to the dialog layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiagnosticOutcome {
    Report(Box<DiagnosticReport>),
    Error { error: String },
}

impl DiagnosticOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn report(&self) -> Option<&DiagnosticReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::Error { .. } => None,
        }
    }
}

impl From<DiagnosticReport> for DiagnosticOutcome {
    fn from(report: DiagnosticReport) -> Self {
        Self::Report(Box::new(report))
    }
}
