//! ping command construction and summary parsing

use crate::shell::shell_quote;
use crate::stats::normalize_decimal;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Round-trip summary printed by ping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingSummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// mdev (iputils) or stddev (BSD); busybox prints neither
    pub deviation_ms: Option<f64>,
}

/// `ping -c <count> -W <timeout> <host>`
pub fn ping_command(host: &str, count: u32, per_packet_timeout: Duration) -> String {
    format!(
        "ping -c {} -W {} {}",
        count,
        per_packet_timeout.as_secs().max(1),
        shell_quote(host)
    )
}

fn summary_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:rtt|round-trip)\s+min/avg/max(?:/(?:mdev|stddev))?\s*=\s*([\d.,]+)/([\d.,]+)/([\d.,]+)(?:/([\d.,]+))?\s*ms",
        )
        .ok()
    })
    .as_ref()
}

fn received_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s+(?:packets\s+)?received").ok())
        .as_ref()
}

/// Extract the round-trip summary; `None` when the output has none or it is malformed
pub fn parse_summary(output: &str) -> Option<PingSummary> {
    let captures = summary_regex()?.captures(output)?;
    let number = |index: usize| -> Option<f64> {
        captures
            .get(index)
            .and_then(|m| normalize_decimal(m.as_str()).parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
    };

    Some(PingSummary {
        min_ms: number(1)?,
        avg_ms: number(2)?,
        max_ms: number(3)?,
        deviation_ms: match captures.get(4) {
            Some(_) => Some(number(4)?),
            None => None,
        },
    })
}

/// Replies counted in the statistics line, if printed
pub fn received_count(output: &str) -> Option<u32> {
    received_regex()?
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
