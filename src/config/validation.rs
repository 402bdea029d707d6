//! Non-fatal configuration checks

use crate::{error::Result, models::Settings};

/// Configuration validator with advisory rules on top of `Settings::validate`
pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard validation first, then the advisory checks
    pub fn validate_comprehensive(settings: &Settings) -> Result<Vec<ValidationWarning>> {
        settings.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_probe_settings(settings));
        warnings.extend(Self::validate_speed_sources(&settings.probe.speed_urls));
        warnings.extend(Self::validate_parallelism(settings));
        Ok(warnings)
    }

    fn validate_probe_settings(settings: &Settings) -> Vec<ValidationWarning> {
        let probe = &settings.probe;
        let mut warnings = Vec::new();

        if probe.ping_count > 10 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Ping count {} makes every diagnostic take at least {}s",
                    probe.ping_count, probe.ping_count
                ),
            ));
        }

        if probe.latency_samples < crate::stats::MIN_JITTER_SAMPLES as u32 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "{} latency sample(s) can never yield a jitter value; use at least {}",
                    probe.latency_samples,
                    crate::stats::MIN_JITTER_SAMPLES
                ),
            ));
        }

        if probe.speed_timeout_secs < 20 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Speed timeout of {}s may cut off downloads over slow proxies",
                    probe.speed_timeout_secs
                ),
            ));
        }

        if settings.supervisor.settle_delay_ms < 500 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Settle delay of {}ms may not catch clients that fail to bind",
                    settings.supervisor.settle_delay_ms
                ),
            ));
        }

        warnings
    }

    fn validate_speed_sources(urls: &[String]) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        if urls.len() == 1 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Only one speed test source configured; there is no fallback".to_string(),
            ));
        }
        for url in urls {
            if let Ok(parsed) = url::Url::parse(url) {
                if matches!(parsed.host(), Some(url::Host::Ipv4(ip)) if ip.is_private() || ip.is_loopback()) {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Warning,
                        format!("Speed source '{}' targets a private network and bypasses the proxy path", url),
                    ));
                }
            }
        }
        warnings
    }

    fn validate_parallelism(settings: &Settings) -> Vec<ValidationWarning> {
        let cpu_count = num_cpus::get();
        if settings.max_parallel > cpu_count * 2 {
            vec![ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Parallel limit {} exceeds twice the CPU count ({})",
                    settings.max_parallel, cpu_count
                ),
            )]
        } else {
            Vec::new()
        }
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// ANSI color code for terminal output
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "\x1b[36m",
            Self::Warning => "\x1b[33m",
            Self::Error => "\x1b[31m",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    pub fn format(&self, use_color: bool) -> String {
        if use_color {
            format!("{}[{}]\x1b[0m {}", self.level.color(), self.level.as_str(), self.message)
        } else {
            format!("[{}] {}", self.level.as_str(), self.message)
        }
    }
}

/// Validate settings and return the advisory warnings
pub fn validate_config(settings: &Settings) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(settings)
}
