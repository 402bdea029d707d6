//! Core formatting trait and the plain bot-message rendering

use crate::{
    error::Result,
    models::{DiagnosticOutcome, DiagnosticReport},
    types::ProbeStatus,
};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Shown in the header when a config declares no server
pub const SERVER_NOT_SPECIFIED: &str = "сервер не указан";

/// Rendering of diagnostic results
pub trait ReportFormatter: Send + Sync {
    /// One `test_full_proxy` outcome
    fn format_outcome(&self, outcome: &DiagnosticOutcome) -> Result<String>;

    /// Outcomes of a batch run, in run order
    fn format_batch(&self, outcomes: &[(PathBuf, DiagnosticOutcome)]) -> Result<String> {
        let mut blocks = Vec::with_capacity(outcomes.len());
        for (_, outcome) in outcomes {
            blocks.push(self.format_outcome(outcome)?);
        }
        Ok(blocks.join("\n\n"))
    }

    /// Standalone direct ping line
    fn format_ping(&self, host: &str, ping: &str) -> Result<String>;

    /// Production service status block
    fn format_status(&self, status: &str) -> Result<String>;
}

/// Options shared by the text formatters
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Adds test time and captured client output
    pub verbose_mode: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
        }
    }
}

/// Header target: the server, or the file name when the config has none
pub(crate) fn report_target(report: &DiagnosticReport) -> &str {
    if !report.server.is_empty() {
        &report.server
    } else if !report.config.is_empty() {
        &report.config
    } else {
        SERVER_NOT_SPECIFIED
    }
}

/// The proxied part collapses to one glyph when latency was not measured
pub(crate) fn proxy_collapsed(report: &DiagnosticReport) -> bool {
    report.latency.status != ProbeStatus::Success
}

/// The Telegram message text of the bot
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    fn format_report(&self, report: &DiagnosticReport) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "🚦 Тест {}:", report_target(report));
        let _ = writeln!(output, "   Пинг: {} (джиттер {})", report.ping, report.ping_jitter);

        if proxy_collapsed(report) {
            let _ = write!(output, "   Прокси: {} ({})", report.latency, report.details);
        } else {
            let _ = write!(
                output,
                "   Прокси: Задержка: {} (джиттер {}) | Скорость: {}",
                report.latency, report.latency_jitter, report.speed
            );
        }

        if self.options.verbose_mode {
            let _ = write!(output, "\n   Проверено: {}", report.tested_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(client_output) = &report.client_output {
                let _ = write!(output, "\n   Вывод клиента: {}", client_output);
            }
        }
        output
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new(FormattingOptions {
            enable_color: false,
            verbose_mode: false,
        })
    }
}

impl ReportFormatter for PlainFormatter {
    fn format_outcome(&self, outcome: &DiagnosticOutcome) -> Result<String> {
        Ok(match outcome {
            DiagnosticOutcome::Report(report) => self.format_report(report),
            DiagnosticOutcome::Error { error } => format!("❌ {}", error),
        })
    }

    fn format_ping(&self, host: &str, ping: &str) -> Result<String> {
        Ok(format!("{}: {}", host, ping))
    }

    fn format_status(&self, status: &str) -> Result<String> {
        Ok(status.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{LatencyProbe, ProbeResult};
    use crate::types::Protocol;
    use chrono::Utc;

    pub(crate) fn sample_report() -> DiagnosticReport {
        DiagnosticReport {
            protocol: Protocol::Shadowsocks,
            config: "nl-1.json".to_string(),
            server: "nl1.example.net".to_string(),
            ping: ProbeResult::success("42 мс"),
            ping_jitter: ProbeResult::success("3 мс"),
            latency: ProbeResult::success("250 мс"),
            latency_jitter: ProbeResult::success("12 мс"),
            speed: ProbeResult::success("1.50 МБ/с"),
            details: "OK".to_string(),
            client_output: None,
            tested_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_report_message() {
        let text = PlainFormatter::default()
            .format_outcome(&sample_report().into())
            .unwrap();
        assert_eq!(
            text,
            "🚦 Тест nl1.example.net:\n   Пинг: 42 мс (джиттер 3 мс)\n   Прокси: Задержка: 250 мс (джиттер 12 мс) | Скорость: 1.50 МБ/с"
        );
    }

    #[test]
    fn test_failed_proxy_collapses() {
        let mut report = sample_report();
        let failed = LatencyProbe::failed(ProbeResult::unreachable("прокси не отвечает"));
        report.latency = failed.latency;
        report.latency_jitter = failed.jitter;
        report.speed = ProbeResult::unreachable("не измерялась");
        report.details = "задержка: прокси не отвечает".to_string();

        let text = PlainFormatter::default().format_outcome(&report.into()).unwrap();
        assert!(text.ends_with("   Прокси: ❌ (задержка: прокси не отвечает)"));
        assert!(!text.contains("Скорость"));
    }

    #[test]
    fn test_missing_server_uses_file_name() {
        let mut report = sample_report();
        report.server.clear();
        let text = PlainFormatter::default().format_outcome(&report.into()).unwrap();
        assert!(text.starts_with("🚦 Тест nl-1.json:"));
    }

    #[test]
    fn test_error_outcome() {
        let outcome = DiagnosticOutcome::error("Не удалось прочитать конфигурацию");
        let text = PlainFormatter::default().format_outcome(&outcome).unwrap();
        assert_eq!(text, "❌ Не удалось прочитать конфигурацию");
    }

    #[test]
    fn test_verbose_includes_client_output() {
        let mut report = sample_report();
        report.latency = ProbeResult::unreachable("клиент не запустился");
        report.details = "клиент не запустился".to_string();
        report.client_output = Some("bind: Address in use".to_string());

        let formatter = PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: true,
        });
        let text = formatter.format_outcome(&report.into()).unwrap();
        assert!(text.contains("Проверено: "));
        assert!(text.contains("Вывод клиента: bind: Address in use"));
    }

    #[test]
    fn test_batch_joins_blocks() {
        let outcomes = vec![
            (PathBuf::from("a.json"), sample_report().into()),
            (PathBuf::from("b.json"), DiagnosticOutcome::error("broken")),
        ];
        let text = PlainFormatter::default().format_batch(&outcomes).unwrap();
        assert_eq!(text.matches("🚦 Тест").count(), 1);
        assert!(text.ends_with("\n\n❌ broken"));
    }
}
