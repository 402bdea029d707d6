//! Settings data model and validation

use crate::types::{AppError, HttpBackend, PortPolicy, Protocol, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main application settings.
///
/// Built once at startup and shared read-only (behind an `Arc`) by the
/// orchestrator, the supervisor and the probe engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Probe counts, targets and timeouts
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Scratch client lifecycle
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Parent directory of the per-protocol config directories
    #[serde(default = "default_config_root")]
    pub config_root: PathBuf,

    /// Directory holding the init.d service scripts
    #[serde(default = "default_init_dir")]
    pub init_dir: PathBuf,

    /// How proxied probes are executed
    #[serde(default = "default_http_backend")]
    pub http_backend: HttpBackend,

    /// Upper bound on concurrently running diagnostics in a batch
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Per-protocol client and service definitions
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<Protocol, ProtocolProfile>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,
}

/// Network probe parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// ICMP echo requests per direct ping
    pub ping_count: u32,
    /// Per-packet ping timeout in seconds
    pub ping_timeout_secs: u64,
    /// Proxied TTFB samples per latency probe
    pub latency_samples: u32,
    /// Timeout of each proxied latency request in seconds
    pub latency_timeout_secs: u64,
    /// Target of the proxied latency requests
    pub latency_url: String,
    /// Ordered fallback list of download test files
    pub speed_urls: Vec<String>,
    /// Timeout of each download attempt in seconds
    pub speed_timeout_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ping_count: crate::defaults::DEFAULT_PING_COUNT,
            ping_timeout_secs: crate::defaults::DEFAULT_PING_TIMEOUT.as_secs(),
            latency_samples: crate::defaults::DEFAULT_LATENCY_SAMPLES,
            latency_timeout_secs: crate::defaults::DEFAULT_LATENCY_TIMEOUT.as_secs(),
            latency_url: crate::defaults::DEFAULT_LATENCY_URL.to_string(),
            speed_urls: crate::defaults::DEFAULT_SPEED_URLS.iter().map(|s| s.to_string()).collect(),
            speed_timeout_secs: crate::defaults::DEFAULT_SPEED_TIMEOUT.as_secs(),
        }
    }
}

impl ProbeSettings {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn latency_timeout(&self) -> Duration {
        Duration::from_secs(self.latency_timeout_secs)
    }

    pub fn speed_timeout(&self) -> Duration {
        Duration::from_secs(self.speed_timeout_secs)
    }
}

/// Scratch client process parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// Fixed wait between spawn and the first probe, in milliseconds
    pub settle_delay_ms: u64,
    /// Local port handed to `PortPolicy::Scratch` clients
    pub scratch_port: u16,
    /// Upper bound on waiting for a signalled client to exit, in milliseconds
    pub teardown_timeout_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: crate::defaults::DEFAULT_SETTLE_DELAY.as_millis() as u64,
            scratch_port: crate::defaults::DEFAULT_SCRATCH_PORT,
            teardown_timeout_ms: crate::defaults::DEFAULT_TEARDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SupervisorSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}

/// How one protocol is tested and controlled on the router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolProfile {
    /// Config field holding the server host
    pub host_field: String,
    /// Config field holding the declared local port (`PortPolicy::Declared`)
    pub local_port_field: String,
    /// Scratch client binary; `None` means no test procedure exists
    pub client_program: Option<String>,
    /// Client arguments; `{config}` and `{port}` are substituted
    pub client_args: Vec<String>,
    pub port_policy: PortPolicy,
    /// init.d script name fallback (e.g. `S22trojan`)
    pub service_script: String,
    /// Stop the live service around the test when it is running
    pub stop_live_service: bool,
}

impl ProtocolProfile {
    /// Whether the protocol has a scratch-client test procedure
    pub fn is_testable(&self) -> bool {
        self.client_program.is_some()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe: ProbeSettings::default(),
            supervisor: SupervisorSettings::default(),
            config_root: default_config_root(),
            init_dir: default_init_dir(),
            http_backend: default_http_backend(),
            max_parallel: default_max_parallel(),
            profiles: default_profiles(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Settings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile for a protocol, falling back to the untestable `Other` profile
    pub fn profile(&self, protocol: Protocol) -> ProtocolProfile {
        self.profiles
            .get(&protocol)
            .or_else(|| self.profiles.get(&Protocol::Other))
            .cloned()
            .unwrap_or_else(other_profile)
    }

    /// Directory holding the JSON configs of a protocol
    pub fn config_dir(&self, protocol: Protocol) -> PathBuf {
        self.config_root.join(protocol.as_str())
    }

    /// Validate the settings and return the first error
    pub fn validate(&self) -> Result<()> {
        let probe = &self.probe;

        if probe.ping_count == 0 {
            return Err(AppError::config("Ping count must be greater than 0"));
        }
        if probe.ping_count > 100 {
            return Err(AppError::config("Ping count cannot exceed 100"));
        }
        if probe.ping_timeout_secs == 0 {
            return Err(AppError::config("Ping timeout must be greater than 0"));
        }
        if probe.latency_samples == 0 {
            return Err(AppError::config("Latency sample count must be greater than 0"));
        }
        if probe.latency_timeout_secs == 0 || probe.speed_timeout_secs == 0 {
            return Err(AppError::config("Probe timeouts must be greater than 0"));
        }
        let max_timeout = crate::defaults::MAX_PROBE_TIMEOUT_SECS;
        for (name, secs) in [
            ("Ping", probe.ping_timeout_secs),
            ("Latency", probe.latency_timeout_secs),
            ("Speed", probe.speed_timeout_secs),
        ] {
            if secs > max_timeout {
                return Err(AppError::config(format!(
                    "{} timeout cannot exceed {}s, got: {}s",
                    name, max_timeout, secs
                )));
            }
        }

        validate_http_url(&probe.latency_url)?;

        if probe.speed_urls.is_empty() {
            return Err(AppError::config("At least one speed test URL is required"));
        }
        for url in &probe.speed_urls {
            validate_http_url(url)?;
        }

        if self.supervisor.scratch_port == 0 {
            return Err(AppError::config("Scratch port cannot be 0"));
        }
        if self.max_parallel == 0 {
            return Err(AppError::config("Parallel diagnostics limit must be greater than 0"));
        }

        for (protocol, profile) in &self.profiles {
            if profile.is_testable() && profile.host_field.is_empty() {
                return Err(AppError::config(format!("Profile '{}' has no host field", protocol)));
            }
            if profile.port_policy == PortPolicy::Declared
                && profile.is_testable()
                && profile.local_port_field.is_empty()
            {
                return Err(AppError::config(format!(
                    "Profile '{}' pins its port but names no local port field",
                    protocol
                )));
            }
        }

        Ok(())
    }
}

fn validate_http_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(AppError::config("Probe URL cannot be empty"));
    }
    let parsed = url::Url::parse(url)
        .map_err(|e| AppError::config(format!("Invalid probe URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::config(format!("Unsupported URL scheme '{}' in {}", scheme, url))),
    }
}

fn default_config_root() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_CONFIG_ROOT)
}

fn default_init_dir() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_INIT_DIR)
}

fn default_http_backend() -> HttpBackend {
    HttpBackend::Curl
}

fn default_max_parallel() -> usize {
    num_cpus::get().max(1)
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

fn other_profile() -> ProtocolProfile {
    ProtocolProfile {
        host_field: "server".to_string(),
        local_port_field: String::new(),
        client_program: None,
        client_args: Vec::new(),
        port_policy: PortPolicy::Scratch,
        service_script: String::new(),
        stop_live_service: false,
    }
}

fn default_profiles() -> BTreeMap<Protocol, ProtocolProfile> {
    let mut profiles = BTreeMap::new();

    profiles.insert(
        Protocol::Shadowsocks,
        ProtocolProfile {
            host_field: "server".to_string(),
            local_port_field: "local_port".to_string(),
            client_program: Some("ss-local".to_string()),
            client_args: vec![
                "-c".to_string(),
                "{config}".to_string(),
                "-l".to_string(),
                "{port}".to_string(),
            ],
            port_policy: PortPolicy::Scratch,
            service_script: "S22shadowsocks".to_string(),
            stop_live_service: false,
        },
    );

    // trojan binds the local_port from its own config, the same one the
    // production instance uses
    profiles.insert(
        Protocol::Trojan,
        ProtocolProfile {
            host_field: "remote_addr".to_string(),
            local_port_field: "local_port".to_string(),
            client_program: Some("trojan".to_string()),
            client_args: vec!["-c".to_string(), "{config}".to_string()],
            port_policy: PortPolicy::Declared,
            service_script: "S22trojan".to_string(),
            stop_live_service: true,
        },
    );

    profiles.insert(Protocol::Other, other_profile());

    profiles
}
