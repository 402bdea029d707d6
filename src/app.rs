//! Command dispatch

use crate::{
    cli::{Cli, Command},
    config::{display_config_summary, load_config, validate_config},
    diagnostics::ProxyDiagnostics,
    error::Result,
    log_debug, log_info,
    logging::LoggerFactory,
    output::{OutputFormatterFactory, ReportFormatter},
    services::InitScriptController,
    shell::ShellRunner,
};
use std::sync::Arc;

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected command and return the process exit code.
    ///
    /// Results go to stdout, everything else to stderr. A diagnostic that
    /// ends in an error outcome exits with 1.
    pub async fn run(self) -> Result<i32> {
        let settings = load_config(self.cli.clone())?;
        let warnings = validate_config(&settings)?;

        if settings.debug {
            eprintln!("{} v{} ({})", crate::PKG_NAME, crate::VERSION, crate::GIT_COMMIT);
            eprintln!("{}", display_config_summary(&settings));
        }
        for warning in &warnings {
            eprintln!("{}", warning.format(settings.enable_color));
        }

        let use_color = settings.enable_color && self.cli.use_colors();
        let formatter = OutputFormatterFactory::create_formatter(self.cli.json, use_color, settings.verbose);
        let factory = LoggerFactory::new(settings.clone());
        let logger = Arc::new(factory.create_diagnostic_logger().await);
        let settings = Arc::new(settings);
        log_debug!(logger.logger(), "Running {:?} in session {}", self.cli.command, factory.session_id());

        let code = match &self.cli.command {
            Command::Test { protocol, config } => {
                let diagnostics = ProxyDiagnostics::from_settings(settings, logger.clone());
                let outcome = diagnostics.test_full_proxy(*protocol, config).await;
                println!("{}", formatter.format_outcome(&outcome)?);
                if outcome.is_error() { 1 } else { 0 }
            }
            Command::TestAll { protocol } => {
                let diagnostics = ProxyDiagnostics::from_settings(settings, logger.clone());
                let outcomes = diagnostics.test_all(*protocol).await?;
                if outcomes.is_empty() && !self.cli.json {
                    println!("Нет конфигураций {} для проверки.", protocol.display_name());
                } else {
                    println!("{}", formatter.format_batch(&outcomes)?);
                }
                let failed = outcomes.iter().any(|(_, outcome)| outcome.is_error());
                if failed { 1 } else { 0 }
            }
            Command::Ping { host } => {
                let diagnostics = ProxyDiagnostics::from_settings(settings, logger.clone());
                let ping = diagnostics.get_direct_ping(host).await;
                println!("{}", formatter.format_ping(host, &ping)?);
                0
            }
            Command::Status => {
                let controller = InitScriptController::new(Arc::new(ShellRunner::default()), &settings);
                let report = controller.status_report().await;
                println!("{}", formatter.format_status(&report)?);
                0
            }
        };

        log_info!(logger.logger(), "Session {} finished with exit code {}", factory.session_id(), code);
        Ok(code)
    }
}
