//! Network probe engine
//!
//! Direct ICMP probe, proxied latency/jitter and proxied throughput. Every
//! failure is folded into a `ProbeResult`; nothing here returns an error.

pub mod ping;
pub mod transport;

pub use ping::{parse_summary, PingSummary};
pub use transport::{CurlTransport, NativeTransport, ProxyTransport};

use crate::logging::DiagnosticLogger;
use crate::models::{LatencyProbe, PingProbe, ProbeResult, Settings};
use crate::shell::CommandRunner;
use crate::stats::{format_latency_ms, format_throughput, JitterSample};
use crate::types::AppError;
use std::sync::Arc;
use std::time::Duration;

pub const HOST_NOT_SPECIFIED: &str = "хост не указан";
pub const HOST_UNREACHABLE: &str = "Хост недоступен";
pub const PROXY_NOT_RESPONDING: &str = "прокси не отвечает";
pub const ALL_SOURCES_FAILED: &str = "все источники недоступны";

/// Extra time granted on top of a tool's own timeout before the task is abandoned
const TOOL_GRACE: Duration = Duration::from_secs(5);

pub struct ProbeEngine {
    settings: Arc<Settings>,
    runner: Arc<dyn CommandRunner>,
    transport: Arc<dyn ProxyTransport>,
    logger: Arc<DiagnosticLogger>,
}

impl ProbeEngine {
    pub fn new(
        settings: Arc<Settings>,
        runner: Arc<dyn CommandRunner>,
        transport: Arc<dyn ProxyTransport>,
        logger: Arc<DiagnosticLogger>,
    ) -> Self {
        Self {
            settings,
            runner,
            transport,
            logger,
        }
    }

    /// Engine with the transport picked from `settings.http_backend`
    pub fn from_settings(
        settings: Arc<Settings>,
        runner: Arc<dyn CommandRunner>,
        logger: Arc<DiagnosticLogger>,
    ) -> Self {
        let transport = transport::for_backend(settings.http_backend, runner.clone());
        Self::new(settings, runner, transport, logger)
    }

    /// ICMP reachability, latency and jitter of `host`
    pub async fn direct_ping(&self, host: Option<&str>) -> PingProbe {
        let host = match host.map(str::trim).filter(|h| !h.is_empty()) {
            Some(host) => host,
            None => {
                return LatencyProbe::new(
                    ProbeResult::no_data(HOST_NOT_SPECIFIED),
                    ProbeResult::no_data(HOST_NOT_SPECIFIED),
                )
            }
        };

        let probe = &self.settings.probe;
        let command = ping::ping_command(host, probe.ping_count, probe.ping_timeout());
        // worst case: every packet waits its full timeout
        let budget = probe
            .ping_timeout()
            .checked_mul(probe.ping_count)
            .unwrap_or(Duration::MAX)
            .saturating_add(TOOL_GRACE);

        let output = match tokio::time::timeout(budget, self.runner.run(&command)).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                self.logger.sample_dropped("ping", host, &error).await;
                return LatencyProbe::failed(ProbeResult::ambiguous(format!("ping не выполнен: {}", error)));
            }
            Err(_) => return LatencyProbe::failed(ProbeResult::unreachable(HOST_UNREACHABLE)),
        };

        let text = output.combined();
        if !output.success() || ping::received_count(&text) == Some(0) {
            return LatencyProbe::failed(ProbeResult::unreachable(HOST_UNREACHABLE));
        }

        match ping::parse_summary(&text) {
            Some(summary) => {
                let jitter = match summary.deviation_ms {
                    Some(deviation) => ProbeResult::success(format_latency_ms(deviation)),
                    None => ProbeResult::no_data("ping не сообщает отклонение"),
                };
                LatencyProbe::new(ProbeResult::success(format_latency_ms(summary.avg_ms)), jitter)
            }
            None => LatencyProbe::failed(ProbeResult::ambiguous("не удалось разобрать вывод ping")),
        }
    }

    /// Presentation string of the direct latency, for list views
    pub async fn get_direct_ping(&self, host: Option<&str>) -> String {
        self.direct_ping(host).await.latency.value
    }

    /// Mean TTFB and sample jitter through `127.0.0.1:<port>`
    pub async fn proxied_latency(&self, port: u16) -> LatencyProbe {
        let probe = &self.settings.probe;
        let url = probe.latency_url.as_str();
        let timeout = probe.latency_timeout();

        let mut sample = JitterSample::new();
        for _ in 0..probe.latency_samples {
            let attempt = tokio::time::timeout(
                timeout.saturating_add(TOOL_GRACE),
                self.transport.time_to_first_byte(port, url, timeout),
            )
            .await;

            let reading = match attempt {
                Ok(Ok(ms)) => ms,
                Ok(Err(error)) => {
                    self.logger.sample_dropped("latency", url, &error).await;
                    continue;
                }
                Err(elapsed) => {
                    self.logger.sample_dropped("latency", url, &AppError::from(elapsed)).await;
                    continue;
                }
            };

            if !sample.push(reading) {
                let error = AppError::parse(format!("non-positive reading {}", reading));
                self.logger.sample_dropped("latency", url, &error).await;
            }
        }

        match (sample.mean(), sample.sample_stdev()) {
            (None, _) => LatencyProbe::failed(ProbeResult::unreachable(PROXY_NOT_RESPONDING)),
            (Some(mean), None) => LatencyProbe::new(
                ProbeResult::success(format_latency_ms(mean)),
                ProbeResult::no_data("недостаточно замеров для джиттера"),
            ),
            (Some(mean), Some(stdev)) => LatencyProbe::new(
                ProbeResult::success(format_latency_ms(mean)),
                ProbeResult::success(format_latency_ms(stdev)),
            ),
        }
    }

    /// First positive download speed from the ordered fallback list
    pub async fn proxied_speed(&self, port: u16) -> ProbeResult {
        let probe = &self.settings.probe;
        let timeout = probe.speed_timeout();

        for url in &probe.speed_urls {
            let attempt =
                tokio::time::timeout(
                    timeout.saturating_add(TOOL_GRACE),
                    self.transport.download_speed(port, url, timeout),
                )
                    .await;

            let error = match attempt {
                Ok(Ok(bytes_per_sec)) if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 => {
                    return ProbeResult::success(format_throughput(bytes_per_sec));
                }
                Ok(Ok(bytes_per_sec)) => AppError::parse(format!("non-positive speed {}", bytes_per_sec)),
                Ok(Err(error)) => error,
                Err(elapsed) => AppError::from(elapsed),
            };
            self.logger.sample_dropped("speed", url, &error).await;
        }

        ProbeResult::unreachable(ALL_SOURCES_FAILED)
    }
}
