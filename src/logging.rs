//! Structured logging for the proxy diagnostics
//!
//! Provides:
//! - Leveled structured entries with correlation ids per diagnostic run
//! - Console and JSON renderings
//! - `DiagnosticLogger` with one method per lifecycle event of a run
//!
//! Everything is written to stderr so that report output on stdout stays
//! machine-readable.

use crate::error::{AppError, Result};
use crate::models::{ProbeResult, Settings};
use crate::types::Protocol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    /// Nothing is written at this level
    Off = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Off => "OFF",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Off => "",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }

    /// Level implied by the verbosity flags
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "OFF" | "NONE" => Ok(LogLevel::Off),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// One structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Id shared by every entry of one diagnostic run
    pub correlation_id: Option<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    context_fields: BTreeMap<String, serde_json::Value>,
}

/// Logger with multiple output formats
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            include_location: false,
            format: LogFormat::Console,
            name: name.into(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Logger configured from the verbosity and color settings
    pub fn with_settings(name: impl Into<String>, settings: &Settings) -> Self {
        Self {
            min_level: LogLevel::from_flags(settings.verbose, settings.debug),
            use_color: settings.enable_color,
            include_location: settings.debug,
            format: if settings.debug { LogFormat::Json } else { LogFormat::Console },
            name: name.into(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Logger that writes nothing
    pub fn silent(name: impl Into<String>) -> Self {
        let mut logger = Self::new(name);
        logger.min_level = LogLevel::Off;
        logger
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add a field to every subsequent entry
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key.to_string(), json_value);
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        {
            let context = self.context.read().await;
            if let Some(session_id) = &context.session_id {
                entry
                    .fields
                    .insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
            }
            for (key, value) in &context.context_fields {
                entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let output = self.render(&entry);
        let _ = writeln!(io::stderr(), "{}", output);
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), entry.level.as_str(), LogLevel::reset_code())
        } else {
            format!("{:>5}", entry.level.as_str())
        };

        let mut output = format!("{} {} [{}] {}", timestamp, level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        serde_json::to_string(entry).unwrap_or_else(|_| {
            serde_json::json!({"error": "unserializable log entry", "message": entry.message}).to_string()
        })
    }
}

/// Builder for log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: BTreeMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Status, value and detail of a probe result
    pub fn probe(self, result: &ProbeResult) -> Self {
        let detail = result.detail.clone();
        self.field("status", result.status)
            .field("value", &result.value)
            .field("detail", detail)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Lifecycle events of diagnostic runs
pub struct DiagnosticLogger {
    logger: Logger,
}

impl DiagnosticLogger {
    pub fn new(settings: &Settings) -> Self {
        Self {
            logger: Logger::with_settings("DIAG", settings),
        }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn silent() -> Self {
        Self {
            logger: Logger::silent("DIAG"),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Open a run and return its correlation id
    pub async fn run_started(&self, protocol: Protocol, path: &Path) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.logger
            .info(&format!("Diagnostic started for {} config {}", protocol, path.display()))
            .correlation_id(&correlation_id)
            .field("protocol", protocol)
            .field("config", path.display().to_string())
            .log()
            .await;
        correlation_id
    }

    pub async fn run_finished(&self, correlation_id: &str, server: &str, proxy_ok: bool, elapsed_ms: u128) {
        let level = if proxy_ok { LogLevel::Info } else { LogLevel::Warn };
        self.logger
            .log(level, &format!("Diagnostic finished for {} (proxy ok: {})", server, proxy_ok))
            .correlation_id(correlation_id)
            .field("server", server)
            .field("proxy_ok", proxy_ok)
            .field("elapsed_ms", elapsed_ms as u64)
            .log()
            .await;
    }

    pub async fn config_unreadable(&self, correlation_id: &str, path: &Path, error: &AppError) {
        self.logger
            .error(&format!("Cannot read config {}: {}", path.display(), error))
            .correlation_id(correlation_id)
            .field("config", path.display().to_string())
            .error_info(error)
            .log()
            .await;
    }

    /// A finished probe: debug on success, warning otherwise
    pub async fn probe_result(&self, correlation_id: Option<&str>, probe: &str, result: &ProbeResult) {
        let level = if result.is_success() { LogLevel::Debug } else { LogLevel::Warn };
        let mut builder = self
            .logger
            .log(level, &format!("{} probe: {}", probe, result.value))
            .field("probe", probe)
            .probe(result);
        if let Some(id) = correlation_id {
            builder = builder.correlation_id(id);
        }
        builder.log().await;
    }

    /// A single dropped reading (timeout, transport error, bad figure)
    pub async fn sample_dropped(&self, probe: &str, url: &str, error: &AppError) {
        self.logger
            .debug(&format!("{} sample from {} dropped: {}", probe, url, error))
            .field("probe", probe)
            .field("url", url)
            .error_info(error)
            .log()
            .await;
    }

    pub async fn client_spawned(&self, program: &str, port: u16, pid: Option<u32>) {
        self.logger
            .info(&format!("Scratch client {} started on port {}", program, port))
            .field("program", program)
            .field("port", port)
            .field("pid", pid)
            .log()
            .await;
    }

    pub async fn client_start_failed(&self, program: &str, exit_code: Option<i32>, output: &str) {
        self.logger
            .warn(&format!("Scratch client {} did not start", program))
            .field("program", program)
            .field("exit_code", exit_code)
            .field("output", output)
            .log()
            .await;
    }

    pub async fn client_terminated(&self, program: &str, port: u16, result: &Result<()>) {
        match result {
            Ok(()) => {
                self.logger
                    .debug(&format!("Scratch client {} on port {} terminated", program, port))
                    .field("program", program)
                    .field("port", port)
                    .log()
                    .await
            }
            Err(error) => {
                self.logger
                    .error(&format!("Teardown of {} on port {} failed: {}", program, port, error))
                    .field("program", program)
                    .field("port", port)
                    .error_info(error)
                    .log()
                    .await
            }
        }
    }

    pub async fn service_stopped(&self, protocol: Protocol, result: &Result<String>) {
        self.service_event("stop", protocol, result).await;
    }

    pub async fn service_restarted(&self, protocol: Protocol, result: &Result<String>) {
        self.service_event("start", protocol, result).await;
    }

    async fn service_event(&self, action: &str, protocol: Protocol, result: &Result<String>) {
        match result {
            Ok(output) => {
                self.logger
                    .info(&format!("Production {} service {}: ok", protocol, action))
                    .field("protocol", protocol)
                    .field("action", action)
                    .field("output", output)
                    .log()
                    .await
            }
            Err(error) => {
                self.logger
                    .error(&format!("Production {} service {} failed: {}", protocol, action, error))
                    .field("protocol", protocol)
                    .field("action", action)
                    .error_info(error)
                    .log()
                    .await
            }
        }
    }
}

/// Creates loggers sharing one session id
pub struct LoggerFactory {
    settings: Settings,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_settings(name, &self.settings);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_diagnostic_logger(&self) -> DiagnosticLogger {
        DiagnosticLogger::from_logger(self.create_logger("DIAG").await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Convenience macros for logging with location information
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn entry() -> LogEntry {
        let mut fields = BTreeMap::new();
        fields.insert("port".to_string(), serde_json::json!(1090));
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message: "Scratch client started".to_string(),
            logger: "DIAG".to_string(),
            correlation_id: Some("0123456789abcdef".to_string()),
            fields,
            location: None,
        }
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("off").unwrap(), LogLevel::Off);
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Warn);
        assert_eq!(LogLevel::from_flags(true, false), LogLevel::Info);
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Debug);
    }

    #[test]
    fn test_logger_with_settings() {
        let settings = Settings {
            debug: true,
            enable_color: false,
            ..Default::default()
        };
        let logger = Logger::with_settings("TEST", &settings);
        assert_eq!(logger.min_level, LogLevel::Debug);
        assert_eq!(logger.format, LogFormat::Json);
        assert!(logger.include_location);
        assert!(!logger.use_color);
    }

    #[test]
    fn test_would_log() {
        let mut logger = Logger::new("TEST");
        logger.min_level = LogLevel::Warn;
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Error));

        let silent = Logger::silent("TEST");
        assert!(!silent.would_log(LogLevel::Error));
        assert!(!silent.would_log(LogLevel::Off));
    }

    #[test]
    fn test_log_formats() {
        let mut logger = Logger::new("TEST");
        logger.use_color = false;

        let console = logger.format_console(&entry());
        assert!(console.contains(" INFO [DIAG] Scratch client started"));
        assert!(console.contains("[01234567]"));
        assert!(console.contains("port=1090"));

        let json: serde_json::Value = serde_json::from_str(&logger.format_json(&entry())).unwrap();
        assert_eq!(json["fields"]["port"], 1090);
    }

    #[tokio::test]
    async fn test_context_fields() {
        let logger = Logger::new("TEST");
        logger.set_session_id("session-1".to_string()).await;
        logger.add_context_field("router", "kn-1810").await;

        let context = logger.context.read().await;
        assert_eq!(context.session_id.as_deref(), Some("session-1"));
        assert!(context.context_fields.contains_key("router"));
    }

    #[tokio::test]
    async fn test_diagnostic_logger_events() {
        let diag = DiagnosticLogger::silent();
        let id = diag.run_started(Protocol::Trojan, Path::new("/opt/etc/trojan/a.json")).await;
        assert_eq!(id.len(), 36);

        diag.probe_result(Some(&id), "ping", &ProbeResult::unreachable("Хост недоступен")).await;
        diag.sample_dropped("latency", "https://www.google.com", &AppError::timeout("10s")).await;
        diag.client_spawned("trojan", 1080, Some(4242)).await;
        diag.client_start_failed("trojan", Some(1), "bind: address in use").await;
        diag.client_terminated("trojan", 1080, &Ok(())).await;
        diag.service_stopped(Protocol::Trojan, &Ok("stopped".to_string())).await;
        diag.service_restarted(Protocol::Trojan, &Err(AppError::service("exit 1"))).await;
        diag.run_finished(&id, "de.example.net", false, 12_000).await;
    }

    #[tokio::test]
    async fn test_logger_factory() {
        let factory = LoggerFactory::new(Settings::default());
        let logger = factory.create_logger("TEST").await;
        assert_eq!(logger.name(), "TEST");
        assert!(!factory.session_id().is_empty());

        let diag = factory.create_diagnostic_logger().await;
        assert_eq!(diag.logger().name(), "DIAG");
    }
}
