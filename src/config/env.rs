//! Environment variable handling and .env file loading

use crate::error::{AppError, Result};
use crate::models::Settings;
use crate::types::HttpBackend;
use std::path::{Path, PathBuf};

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load `path`, or `./.env` when no path is given.
    ///
    /// Returns the file that was loaded. A missing `./.env` is not an error;
    /// a missing explicit file is.
    pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
        match path {
            Some(path) => {
                dotenv::from_path(path).map_err(|e| {
                    AppError::config(format!("Failed to load env file {}: {}", path.display(), e))
                })?;
                Ok(Some(path.to_path_buf()))
            }
            None if Path::new(".env").exists() => {
                dotenv::from_filename(".env")
                    .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;
                Ok(Some(PathBuf::from(".env")))
            }
            None => Ok(None),
        }
    }

    /// Merge the process environment into `settings`
    pub fn merge_from_env(settings: &mut Settings) -> Result<()> {
        Self::merge_from(settings, |key| std::env::var(key).ok())
    }

    /// Merge variables from `lookup` into `settings`. Unset or blank
    /// variables keep the current value.
    pub fn merge_from<F>(settings: &mut Settings, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Result<Option<String>> {
            match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(value) => {
                    Self::validate_env_var(key, &value)?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        };

        if let Some(v) = get("KDW_PING_COUNT")? {
            settings.probe.ping_count = v.parse()?;
        }
        if let Some(v) = get("KDW_PING_TIMEOUT")? {
            settings.probe.ping_timeout_secs = v.parse()?;
        }
        if let Some(v) = get("KDW_LATENCY_SAMPLES")? {
            settings.probe.latency_samples = v.parse()?;
        }
        if let Some(v) = get("KDW_LATENCY_TIMEOUT")? {
            settings.probe.latency_timeout_secs = v.parse()?;
        }
        if let Some(v) = get("KDW_LATENCY_URL")? {
            settings.probe.latency_url = v;
        }
        if let Some(v) = get("KDW_SPEED_URLS")? {
            settings.probe.speed_urls = split_list(&v);
        }
        if let Some(v) = get("KDW_SPEED_TIMEOUT")? {
            settings.probe.speed_timeout_secs = v.parse()?;
        }
        if let Some(v) = get("KDW_SETTLE_DELAY_MS")? {
            settings.supervisor.settle_delay_ms = v.parse()?;
        }
        if let Some(v) = get("KDW_SCRATCH_PORT")? {
            settings.supervisor.scratch_port = v.parse()?;
        }
        if let Some(v) = get("KDW_CONFIG_ROOT")? {
            settings.config_root = PathBuf::from(v);
        }
        if let Some(v) = get("KDW_INIT_DIR")? {
            settings.init_dir = PathBuf::from(v);
        }
        if let Some(v) = get("KDW_HTTP_BACKEND")? {
            settings.http_backend = v.parse()?;
        }
        if let Some(v) = get("KDW_MAX_PARALLEL")? {
            settings.max_parallel = v.parse()?;
        }
        if let Some(v) = get("KDW_ENABLE_COLOR")? {
            settings.enable_color = parse_bool(&v)?;
        }

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "KDW_PING_COUNT" => {
                let count: u32 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if count == 0 || count > 100 {
                    return Err(AppError::config(format!("{} must be between 1 and 100, got: {}", key, count)));
                }
            }
            "KDW_PING_TIMEOUT" | "KDW_LATENCY_TIMEOUT" | "KDW_SPEED_TIMEOUT" => {
                let secs: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                let max = crate::defaults::MAX_PROBE_TIMEOUT_SECS;
                if secs == 0 || secs > max {
                    return Err(AppError::config(format!("{} must be between 1 and {}, got: {}", key, max, secs)));
                }
            }
            "KDW_LATENCY_SAMPLES" | "KDW_MAX_PARALLEL" => {
                let n: usize = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if n == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "KDW_SETTLE_DELAY_MS" => {
                value
                    .parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "KDW_SCRATCH_PORT" => {
                let port: u16 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if port == 0 {
                    return Err(AppError::config(format!("{} cannot be 0", key)));
                }
            }
            "KDW_LATENCY_URL" | "KDW_SPEED_URLS" => {
                for url in split_list(value) {
                    url::Url::parse(&url)
                        .map_err(|e| AppError::config(format!("Invalid {} entry '{}': {}", key, url, e)))?;
                }
            }
            "KDW_HTTP_BACKEND" => {
                value
                    .parse::<HttpBackend>()
                    .map_err(|e| AppError::config(format!("Invalid {} value: {}", key, e)))?;
            }
            "KDW_ENABLE_COLOR" => {
                parse_bool(value)?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Supported variables with a description and an example value
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("KDW_PING_COUNT", "ICMP echo requests per direct ping (1-100)", "5"),
            ("KDW_PING_TIMEOUT", "Per-packet ping timeout in seconds", "2"),
            ("KDW_LATENCY_SAMPLES", "Proxied latency samples", "3"),
            ("KDW_LATENCY_TIMEOUT", "Per-sample latency timeout in seconds", "10"),
            ("KDW_LATENCY_URL", "Time-to-first-byte target", "https://www.google.com"),
            ("KDW_SPEED_URLS", "Comma-separated throughput fallback list", "http://speedtest.tele2.net/1MB.zip"),
            ("KDW_SPEED_TIMEOUT", "Per-source download timeout in seconds", "30"),
            ("KDW_SETTLE_DELAY_MS", "Wait after spawning the scratch client", "2000"),
            ("KDW_SCRATCH_PORT", "Local SOCKS port of the scratch client", "1090"),
            ("KDW_CONFIG_ROOT", "Parent of the per-protocol config directories", "/opt/etc"),
            ("KDW_INIT_DIR", "init.d script directory", "/opt/etc/init.d"),
            ("KDW_HTTP_BACKEND", "curl or native", "curl"),
            ("KDW_MAX_PARALLEL", "Concurrent diagnostics in a batch", "4"),
            ("KDW_ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Problems with the variables currently set, as warning lines
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(key, _, _)| {
                let value = std::env::var(key).ok()?;
                Self::validate_env_var(key, value.trim())
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!("Invalid boolean value '{}'", value))),
    }
}
