//! Machine-readable output for scripts and the bot backend

use super::formatter::ReportFormatter;
use crate::{error::Result, models::DiagnosticOutcome};
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Default, Clone)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> Result<String> {
        Ok(if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        })
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_outcome(&self, outcome: &DiagnosticOutcome) -> Result<String> {
        self.render(&serde_json::to_value(outcome)?)
    }

    fn format_batch(&self, outcomes: &[(PathBuf, DiagnosticOutcome)]) -> Result<String> {
        let entries = outcomes
            .iter()
            .map(|(path, outcome)| {
                Ok(json!({
                    "path": path.display().to_string(),
                    "outcome": serde_json::to_value(outcome)?,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        self.render(&serde_json::Value::Array(entries))
    }

    fn format_ping(&self, host: &str, ping: &str) -> Result<String> {
        self.render(&json!({ "host": host, "ping": ping }))
    }

    fn format_status(&self, status: &str) -> Result<String> {
        let lines: Vec<&str> = status.lines().collect();
        self.render(&json!({ "services": lines }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::tests::sample_report;
    use serde_json::Value;

    #[test]
    fn test_report_fields() {
        let text = JsonFormatter::new(false)
            .format_outcome(&sample_report().into())
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["server"], "nl1.example.net");
        assert_eq!(value["latency"]["value"], "250 мс");
        assert_eq!(value["speed"]["status"], "success");
        assert!(value.get("client_output").is_none());
    }

    #[test]
    fn test_error_shape() {
        let text = JsonFormatter::new(false)
            .format_outcome(&DiagnosticOutcome::error("config missing"))
            .unwrap();
        assert_eq!(text, r#"{"error":"config missing"}"#);
    }

    #[test]
    fn test_batch_keeps_paths() {
        let outcomes = vec![
            (PathBuf::from("/opt/etc/shadowsocks/a.json"), sample_report().into()),
            (PathBuf::from("/opt/etc/shadowsocks/b.json"), DiagnosticOutcome::error("bad")),
        ];
        let text = JsonFormatter::new(true).format_batch(&outcomes).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["path"], "/opt/etc/shadowsocks/a.json");
        assert_eq!(value[1]["outcome"]["error"], "bad");
    }

    #[test]
    fn test_ping_and_status() {
        let formatter = JsonFormatter::new(false);
        assert_eq!(
            formatter.format_ping("8.8.8.8", "12 мс").unwrap(),
            r#"{"host":"8.8.8.8","ping":"12 мс"}"#
        );
        let status: Value = serde_json::from_str(&formatter.format_status("a\nb").unwrap()).unwrap();
        assert_eq!(status["services"][1], "b");
    }
}
