//! Settings assembly from defaults, env file, environment and CLI arguments

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Settings,
};

/// Combines the settings sources in priority order:
/// defaults < env file < environment < command line
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete settings
    pub fn parse(&self) -> Result<Settings> {
        EnvManager::load_env_file(self.cli.env_file.as_deref())?;
        self.parse_with(|key| std::env::var(key).ok())
    }

    /// Like [`parse`](Self::parse) with an explicit variable source and no env file
    pub fn parse_with<F>(&self, lookup: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        EnvManager::merge_from(&mut settings, lookup)?;
        self.apply_cli_overrides(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_cli_overrides(&self, settings: &mut Settings) {
        if let Some(count) = self.cli.ping_count {
            settings.probe.ping_count = count;
        }
        if let Some(port) = self.cli.scratch_port {
            settings.supervisor.scratch_port = port;
        }
        if let Some(backend) = self.cli.backend {
            settings.http_backend = backend;
        }
        if let Some(ref root) = self.cli.config_root {
            settings.config_root = root.clone();
        }

        if self.cli.no_color || self.cli.json {
            settings.enable_color = false;
        }

        // CLI-only
        settings.verbose = self.cli.verbose;
        settings.debug = self.cli.debug;
    }
}

/// Convenience function to load complete settings from CLI arguments
pub fn load_config(cli: Cli) -> Result<Settings> {
    ConfigParser::new(cli).parse()
}

/// Settings summary for debug output
pub fn display_config_summary(settings: &Settings) -> String {
    let probe = &settings.probe;
    let mut summary = Vec::new();

    summary.push(format!("Config root: {}", settings.config_root.display()));
    summary.push(format!("Init dir: {}", settings.init_dir.display()));
    summary.push(format!(
        "Ping: {} packets, {}s timeout",
        probe.ping_count, probe.ping_timeout_secs
    ));
    summary.push(format!(
        "Latency: {} samples of {}, {}s timeout",
        probe.latency_samples, probe.latency_url, probe.latency_timeout_secs
    ));
    summary.push(format!(
        "Speed sources: {} ({}s timeout)",
        probe.speed_urls.join(", "),
        probe.speed_timeout_secs
    ));
    summary.push(format!(
        "Scratch port: {}, settle delay: {}ms",
        settings.supervisor.scratch_port, settings.supervisor.settle_delay_ms
    ));
    summary.push(format!("HTTP backend: {:?}", settings.http_backend));
    summary.push(format!("Max parallel: {}", settings.max_parallel));
    summary.push(format!("Color Output: {}", settings.enable_color));

    summary.join("\n")
}
