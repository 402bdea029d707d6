//! Scratch proxy client supervision
//!
//! `ProcessSupervisor::launch_and_probe` starts a local client for one
//! configuration, waits the settle delay, checks for an early exit and runs
//! the probes against its SOCKS port. The process is owned by a
//! `ScratchProcess` guard: teardown (signal, then wait) happens exactly once
//! on every path, including a panicking probe and a caller that drops the
//! future mid-run.

pub mod process;

pub use process::{ClientProcess, LaunchCommand, ProcessLauncher, ProcessState, TokioLauncher};

use crate::logging::DiagnosticLogger;
use crate::models::{ProtocolProfile, ProxyConfigRef, Settings};
use crate::types::{PortPolicy, Protocol, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to start one scratch client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLaunch {
    pub protocol: Protocol,
    pub command: LaunchCommand,
    /// Local SOCKS port the client binds
    pub port: u16,
}

impl ClientLaunch {
    /// Launch for a configuration; `None` when the protocol has no client
    pub fn build(profile: &ProtocolProfile, config: &ProxyConfigRef, scratch_port: u16) -> Option<Self> {
        let program = profile.client_program.clone()?;
        let port = match profile.port_policy {
            PortPolicy::Scratch => scratch_port,
            PortPolicy::Declared => config.local_port_or_default(),
        };

        let config_path = config.path().to_string_lossy();
        let port_text = port.to_string();
        let args = profile
            .client_args
            .iter()
            .map(|arg| arg.replace("{config}", &config_path).replace("{port}", &port_text))
            .collect();

        Some(Self {
            protocol: config.protocol,
            command: LaunchCommand { program, args },
            port,
        })
    }
}

/// Outcome of `launch_and_probe`
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRun<T> {
    /// Client survived the settle delay; probe output
    Started(T),
    /// Client failed to spawn or exited during the settle delay
    StartFailed {
        output: String,
        exit_code: Option<i32>,
    },
}

/// Owns a running scratch client until it has been torn down
pub struct ScratchProcess {
    process: Option<Box<dyn ClientProcess>>,
    program: String,
    port: u16,
    timeout: Duration,
    logger: Arc<DiagnosticLogger>,
}

impl ScratchProcess {
    fn new(
        process: Box<dyn ClientProcess>,
        launch: &ClientLaunch,
        timeout: Duration,
        logger: Arc<DiagnosticLogger>,
    ) -> Self {
        Self {
            process: Some(process),
            program: launch.command.program.clone(),
            port: launch.port,
            timeout,
            logger,
        }
    }

    fn state(&mut self) -> Result<ProcessState> {
        match self.process.as_mut() {
            Some(process) => process.try_wait(),
            None => Ok(ProcessState::Exited(None)),
        }
    }

    async fn drain_output(&mut self) -> String {
        match self.process.as_mut() {
            Some(process) => process.drain_output().await,
            None => String::new(),
        }
    }

    /// Terminate on a detached task and wait for it; the task finishes even
    /// when this future is dropped while waiting
    async fn teardown(&mut self) {
        if let Some(process) = self.process.take() {
            let task = tokio::spawn(terminate(
                process,
                self.program.clone(),
                self.port,
                self.timeout,
                self.logger.clone(),
            ));
            let _ = task.await;
        }
    }
}

impl Drop for ScratchProcess {
    fn drop(&mut self) {
        if let Some(process) = self.process.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(terminate(
                    process,
                    self.program.clone(),
                    self.port,
                    self.timeout,
                    self.logger.clone(),
                ));
            }
            // Without a runtime the child's kill_on_drop is the last resort
        }
    }
}

async fn terminate(
    mut process: Box<dyn ClientProcess>,
    program: String,
    port: u16,
    timeout: Duration,
    logger: Arc<DiagnosticLogger>,
) {
    let result = process.terminate(timeout).await;
    logger.client_terminated(&program, port, &result).await;
}

pub struct ProcessSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    settings: Arc<Settings>,
    logger: Arc<DiagnosticLogger>,
}

impl ProcessSupervisor {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, settings: Arc<Settings>, logger: Arc<DiagnosticLogger>) -> Self {
        Self {
            launcher,
            settings,
            logger,
        }
    }

    /// Launch for a configuration using this supervisor's scratch port
    pub fn launch_for(&self, profile: &ProtocolProfile, config: &ProxyConfigRef) -> Option<ClientLaunch> {
        ClientLaunch::build(profile, config, self.settings.supervisor.scratch_port)
    }

    /// Start the client, probe it through `probe(port)`, tear it down.
    ///
    /// A spawn failure or an exit during the settle delay is reported as
    /// `ClientRun::StartFailed` and `probe` is never called. A panic in
    /// `probe` is resumed after teardown.
    pub async fn launch_and_probe<T, F, Fut>(&self, launch: &ClientLaunch, probe: F) -> ClientRun<T>
    where
        F: FnOnce(u16) -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let program = launch.command.program.as_str();

        let process = match self.launcher.spawn(&launch.command).await {
            Ok(process) => process,
            Err(error) => {
                let output = error.to_string();
                self.logger.client_start_failed(program, None, &output).await;
                return ClientRun::StartFailed {
                    output,
                    exit_code: None,
                };
            }
        };
        let pid = process.id();

        let mut guard = ScratchProcess::new(
            process,
            launch,
            self.settings.supervisor.teardown_timeout(),
            self.logger.clone(),
        );
        self.logger.client_spawned(program, launch.port, pid).await;

        tokio::time::sleep(self.settings.supervisor.settle_delay()).await;

        let exit = match guard.state() {
            Ok(ProcessState::Running) => None,
            Ok(ProcessState::Exited(code)) => Some((guard.drain_output().await, code)),
            Err(error) => Some((error.to_string(), None)),
        };
        if let Some((output, exit_code)) = exit {
            guard.teardown().await;
            self.logger.client_start_failed(program, exit_code, &output).await;
            return ClientRun::StartFailed { output, exit_code };
        }

        let outcome = AssertUnwindSafe(probe(launch.port)).catch_unwind().await;
        guard.teardown().await;

        match outcome {
            Ok(value) => ClientRun::Started(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
