//! KDW proxy diagnostics
//!
//! Health checks and benchmarks for the Shadowsocks and Trojan client
//! configurations managed by the KDW router bot: direct ping and jitter,
//! proxied latency and jitter, and proxied download throughput measured
//! through a short-lived scratch client process.

pub mod app;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod services;
pub mod shell;
pub mod stats;
pub mod store;
pub mod supervisor;
pub mod types;

// Re-export commonly used types
pub use diagnostics::{ProxyDiagnostics, ResourceLocks};
pub use error::{AppError, Result};
pub use models::{DiagnosticOutcome, DiagnosticReport, ProbeResult, ProxyConfigRef, Settings};
pub use output::{ColoredFormatter, JsonFormatter, PlainFormatter, ReportFormatter};
pub use probe::ProbeEngine;
pub use supervisor::{ClientLaunch, ClientRun, ProcessSupervisor};
pub use types::{HttpBackend, PortPolicy, ProbeStatus, Protocol};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_PING_COUNT: u32 = 5;
    pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_LATENCY_SAMPLES: u32 = 3;
    pub const DEFAULT_LATENCY_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_LATENCY_URL: &str = "https://www.google.com";
    pub const DEFAULT_SPEED_URLS: &[&str] = &[
        "http://speedtest.tele2.net/1MB.zip",
        "https://proof.ovh.net/files/1Mb.dat",
        "http://ipv4.download.thinkbroadband.com/1MB.zip",
    ];
    pub const DEFAULT_SPEED_TIMEOUT: Duration = Duration::from_secs(30);
    /// Upper bound for every per-probe timeout, in seconds
    pub const MAX_PROBE_TIMEOUT_SECS: u64 = 300;
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
    pub const DEFAULT_SCRATCH_PORT: u16 = 1090;
    pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_CONFIG_ROOT: &str = "/opt/etc";
    pub const DEFAULT_INIT_DIR: &str = "/opt/etc/init.d";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
