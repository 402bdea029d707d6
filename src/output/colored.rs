//! Colored terminal rendering of diagnostic reports

use super::formatter::{proxy_collapsed, report_target, FormattingOptions, ReportFormatter};
use crate::{
    error::Result,
    models::{DiagnosticOutcome, DiagnosticReport, ProbeResult},
    services::ServiceStatus,
    types::ProbeStatus,
};
use colored::*;
use std::fmt::Write as _;

/// Latency classification for color coding
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceLevel {
    Excellent, // < 100ms
    Good,      // 100-300ms
    Fair,      // 300-700ms
    Poor,      // 700-1500ms
    VeryPoor,  // > 1500ms
}

impl PerformanceLevel {
    /// Thresholds are for proxied time to first byte, which includes the tunnel
    pub fn from_latency_ms(time_ms: f64) -> Self {
        if time_ms < 100.0 {
            Self::Excellent
        } else if time_ms < 300.0 {
            Self::Good
        } else if time_ms < 700.0 {
            Self::Fair
        } else if time_ms < 1500.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            muted: Color::BrightBlack,
        }
    }
}

pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self { options, color_scheme }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn status_color(&self, status: ProbeStatus) -> Color {
        match status {
            ProbeStatus::Success => self.color_scheme.success,
            ProbeStatus::Ambiguous => self.color_scheme.warning,
            ProbeStatus::Unreachable => self.color_scheme.error,
            ProbeStatus::NotSupported | ProbeStatus::NoData => self.color_scheme.muted,
        }
    }

    fn value(&self, result: &ProbeResult) -> ColoredString {
        self.colorize(&result.value, self.status_color(result.status))
    }

    /// Latencies are graded; other successes are plain green
    fn latency_value(&self, result: &ProbeResult) -> ColoredString {
        match (result.status, result.numeric_value()) {
            (ProbeStatus::Success, Some(ms)) => {
                self.colorize(&result.value, PerformanceLevel::from_latency_ms(ms).color())
            }
            _ => self.value(result),
        }
    }

    fn format_report(&self, report: &DiagnosticReport) -> String {
        let mut output = String::new();
        let header = format!("Тест {}:", report_target(report));
        let header = if self.options.enable_color {
            header.as_str().bold().color(self.color_scheme.header)
        } else {
            header.as_str().normal()
        };
        let _ = writeln!(output, "🚦 {}", header);
        let _ = writeln!(
            output,
            "   Пинг: {} (джиттер {})",
            self.value(&report.ping),
            self.value(&report.ping_jitter)
        );

        if proxy_collapsed(report) {
            let _ = write!(
                output,
                "   Прокси: {} ({})",
                self.value(&report.latency),
                self.colorize(&report.details, self.color_scheme.muted)
            );
        } else {
            let _ = write!(
                output,
                "   Прокси: Задержка: {} (джиттер {}) | Скорость: {}",
                self.latency_value(&report.latency),
                self.value(&report.latency_jitter),
                self.value(&report.speed)
            );
            if !report.speed.is_success() {
                let _ = write!(
                    output,
                    " {}",
                    self.colorize(&format!("({})", report.speed.detail_or_empty()), self.color_scheme.muted)
                );
            }
        }

        if self.options.verbose_mode {
            let tested_at = report.tested_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
            let _ = write!(output, "\n   Проверено: {}", self.colorize(&tested_at, self.color_scheme.muted));
            if let Some(client_output) = &report.client_output {
                let _ = write!(
                    output,
                    "\n   Вывод клиента: {}",
                    self.colorize(client_output, self.color_scheme.warning)
                );
            }
        }
        output
    }
}

impl ReportFormatter for ColoredFormatter {
    fn format_outcome(&self, outcome: &DiagnosticOutcome) -> Result<String> {
        Ok(match outcome {
            DiagnosticOutcome::Report(report) => self.format_report(report),
            DiagnosticOutcome::Error { error } => {
                format!("❌ {}", self.colorize(error, self.color_scheme.error))
            }
        })
    }

    fn format_ping(&self, host: &str, ping: &str) -> Result<String> {
        let color = if ping.ends_with("мс") {
            self.color_scheme.success
        } else {
            self.color_scheme.error
        };
        Ok(format!("{}: {}", self.bold(host), self.colorize(ping, color)))
    }

    fn format_status(&self, status: &str) -> Result<String> {
        let lines: Vec<String> = status
            .lines()
            .map(|line| {
                let color = if line.starts_with(ServiceStatus::Running.icon()) {
                    self.color_scheme.success
                } else if line.starts_with(ServiceStatus::Stopped.icon()) {
                    self.color_scheme.error
                } else {
                    self.color_scheme.warning
                };
                self.colorize(line, color).to_string()
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::tests::sample_report;
    use crate::output::PlainFormatter;

    fn uncolored() -> ColoredFormatter {
        ColoredFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: false,
        })
    }

    #[test]
    fn test_performance_levels() {
        assert_eq!(PerformanceLevel::from_latency_ms(40.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_latency_ms(250.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_latency_ms(699.0), PerformanceLevel::Fair);
        assert_eq!(PerformanceLevel::from_latency_ms(1000.0), PerformanceLevel::Poor);
        assert_eq!(PerformanceLevel::from_latency_ms(4000.0), PerformanceLevel::VeryPoor);
    }

    #[test]
    fn test_colorless_matches_plain_layout() {
        let outcome: DiagnosticOutcome = sample_report().into();
        let colored = uncolored().format_outcome(&outcome).unwrap();
        let plain = PlainFormatter::default().format_outcome(&outcome).unwrap();
        assert_eq!(colored, plain);
    }

    #[test]
    fn test_speed_failure_shows_detail() {
        let mut report = sample_report();
        report.speed = ProbeResult::unreachable("все источники недоступны");
        let text = uncolored().format_outcome(&report.into()).unwrap();
        assert!(text.ends_with("Скорость: ❌ (все источники недоступны)"));
    }

    #[test]
    fn test_status_lines_pass_through() {
        let status = "✅ Shadowsocks: Запущен\n❌ Trojan: Остановлен";
        assert_eq!(uncolored().format_status(status).unwrap(), status);
    }
}
