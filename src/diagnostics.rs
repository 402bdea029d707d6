//! Diagnostic orchestrator
//!
//! One `test_full_proxy` call walks a configuration through
//! config read -> direct ping -> [service bracket] -> scratch client test ->
//! report, strictly forward. Only an unreadable configuration ends a run
//! early; every other failure becomes a field of the report.

use crate::logging::DiagnosticLogger;
use crate::models::{
    DiagnosticOutcome, DiagnosticReport, LatencyProbe, ProbeResult, ProtocolProfile, ProxyConfigRef,
    Settings,
};
use crate::probe::ProbeEngine;
use crate::services::{InitScriptController, ServiceController};
use crate::shell::{CommandRunner, ShellRunner};
use crate::store::{ConfigStore, JsonConfigStore};
use crate::supervisor::{ClientLaunch, ClientRun, ProcessSupervisor, TokioLauncher};
use crate::types::{ProbeStatus, Protocol, Result};
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::sync::{
    Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, Semaphore,
};

pub const CLIENT_NOT_STARTED: &str = "клиент не запустился";
const RUN_ABANDONED: &str = "диагностика прервана";

/// Exclusion regions shared by concurrent diagnostic runs.
///
/// A per-port mutex keeps two scratch clients off the same local port. A
/// per-protocol read/write lock is taken exclusively by runs that may stop
/// the production service and shared by all others. The protocol lock is
/// always taken before the port lock.
#[derive(Default)]
pub struct ResourceLocks {
    protocols: Mutex<HashMap<Protocol, Arc<RwLock<()>>>>,
    ports: Mutex<HashMap<u16, Arc<AsyncMutex<()>>>>,
}

/// Held protocol region
pub enum ProtocolGuard {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn protocol_lock(&self, protocol: Protocol) -> Arc<RwLock<()>> {
        let mut map = self.protocols.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(protocol).or_default().clone()
    }

    fn port_lock(&self, port: u16) -> Arc<AsyncMutex<()>> {
        let mut map = self.ports.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(port).or_default().clone()
    }

    pub async fn protocol(&self, protocol: Protocol, exclusive: bool) -> ProtocolGuard {
        let lock = self.protocol_lock(protocol);
        if exclusive {
            ProtocolGuard::Exclusive(lock.write_owned().await)
        } else {
            ProtocolGuard::Shared(lock.read_owned().await)
        }
    }

    pub async fn port(&self, port: u16) -> OwnedMutexGuard<()> {
        self.port_lock(port).lock_owned().await
    }
}

/// Stops the production service on entry and starts it again exactly once
struct ServiceBracket {
    services: Arc<dyn ServiceController>,
    protocol: Protocol,
    logger: Arc<DiagnosticLogger>,
    armed: bool,
}

impl ServiceBracket {
    async fn enter(services: Arc<dyn ServiceController>, protocol: Protocol, logger: Arc<DiagnosticLogger>) -> Self {
        let stopped = services.stop(protocol).await;
        logger.service_stopped(protocol, &stopped).await;
        // armed even when stop failed: start on a running service is harmless
        Self {
            services,
            protocol,
            logger,
            armed: true,
        }
    }

    async fn exit(mut self) {
        if self.armed {
            self.armed = false;
            restart(self.services.clone(), self.protocol, self.logger.clone()).await;
        }
    }
}

impl Drop for ServiceBracket {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(restart(self.services.clone(), self.protocol, self.logger.clone()));
            }
        }
    }
}

async fn restart(services: Arc<dyn ServiceController>, protocol: Protocol, logger: Arc<DiagnosticLogger>) {
    let started = services.start(protocol).await;
    logger.service_restarted(protocol, &started).await;
}

/// Client-dependent part of a report
struct ClientOutcome {
    latency: LatencyProbe,
    speed: ProbeResult,
    details: String,
    client_output: Option<String>,
}

impl ClientOutcome {
    fn not_supported(protocol: Protocol) -> Self {
        let detail = format!("для протокола {} нет процедуры теста", protocol.display_name());
        Self {
            latency: LatencyProbe::new(ProbeResult::not_supported(&detail), ProbeResult::not_supported(&detail)),
            speed: ProbeResult::not_supported(&detail),
            details: detail,
            client_output: None,
        }
    }

    fn start_failed(output: String) -> Self {
        Self {
            latency: LatencyProbe::new(
                ProbeResult::unreachable(CLIENT_NOT_STARTED),
                ProbeResult::no_data(CLIENT_NOT_STARTED),
            ),
            speed: ProbeResult::unreachable(CLIENT_NOT_STARTED),
            details: CLIENT_NOT_STARTED.to_string(),
            client_output: Some(output).filter(|o| !o.trim().is_empty()),
        }
    }

    fn measured(latency: LatencyProbe, speed: ProbeResult) -> Self {
        let failures: Vec<String> = [("задержка", &latency.latency), ("скорость", &speed)]
            .into_iter()
            .filter(|(_, result)| !result.is_success())
            .map(|(name, result)| format!("{}: {}", name, result.detail_or_empty()))
            .collect();
        let details = if failures.is_empty() {
            "OK".to_string()
        } else {
            failures.join("; ")
        };
        Self {
            latency,
            speed,
            details,
            client_output: None,
        }
    }
}

/// Latency first; throughput only when the proxy answered at all
async fn proxied_suite(engine: Arc<ProbeEngine>, port: u16) -> (LatencyProbe, ProbeResult) {
    let latency = engine.proxied_latency(port).await;
    let speed = if latency.latency.status == ProbeStatus::Unreachable {
        ProbeResult::unreachable(format!(
            "не измерялась: задержка {} ({})",
            latency.latency.value,
            latency.latency.detail_or_empty()
        ))
    } else {
        engine.proxied_speed(port).await
    };
    (latency, speed)
}

pub struct ProxyDiagnostics {
    settings: Arc<Settings>,
    store: Arc<dyn ConfigStore>,
    services: Arc<dyn ServiceController>,
    engine: Arc<ProbeEngine>,
    supervisor: Arc<ProcessSupervisor>,
    locks: Arc<ResourceLocks>,
    logger: Arc<DiagnosticLogger>,
}

impl ProxyDiagnostics {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<dyn ConfigStore>,
        services: Arc<dyn ServiceController>,
        engine: Arc<ProbeEngine>,
        supervisor: Arc<ProcessSupervisor>,
        logger: Arc<DiagnosticLogger>,
    ) -> Self {
        Self {
            settings,
            store,
            services,
            engine,
            supervisor,
            locks: Arc::new(ResourceLocks::new()),
            logger,
        }
    }

    /// Router wiring: `sh`, init.d scripts, JSON files and real processes
    pub fn from_settings(settings: Arc<Settings>, logger: Arc<DiagnosticLogger>) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::default());
        let store = Arc::new(JsonConfigStore::new(settings.config_root.clone()));
        let services = Arc::new(InitScriptController::new(runner.clone(), &settings));
        let engine = Arc::new(ProbeEngine::from_settings(settings.clone(), runner, logger.clone()));
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::new(TokioLauncher::new()),
            settings.clone(),
            logger.clone(),
        ));
        Self::new(settings, store, services, engine, supervisor, logger)
    }

    /// Share exclusion regions with another orchestrator in the same process
    pub fn with_locks(mut self, locks: Arc<ResourceLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Standalone direct ping, for list views
    pub async fn get_direct_ping(&self, host: &str) -> String {
        self.engine.get_direct_ping(Some(host)).await
    }

    /// Full diagnostic of one configuration
    pub async fn test_full_proxy(&self, protocol: Protocol, path: &Path) -> DiagnosticOutcome {
        let started = Instant::now();
        let correlation_id = self.logger.run_started(protocol, path).await;
        let profile = self.settings.profile(protocol);

        let config = match self.resolve_config(protocol, path, &profile).await {
            Ok(config) => config,
            Err(error) => {
                self.logger.config_unreadable(&correlation_id, path, &error).await;
                return DiagnosticOutcome::error(format!(
                    "Не удалось прочитать конфигурацию {}: {}",
                    path.display(),
                    error
                ));
            }
        };

        let ping = self.engine.direct_ping(config.server_host()).await;
        self.logger.probe_result(Some(&correlation_id), "ping", &ping.latency).await;

        let client = self.client_test(&profile, &config).await;
        self.logger.probe_result(Some(&correlation_id), "latency", &client.latency.latency).await;
        self.logger.probe_result(Some(&correlation_id), "speed", &client.speed).await;

        let report = DiagnosticReport {
            protocol,
            config: config.display_name(),
            server: config.server_host().unwrap_or_default().to_string(),
            ping: ping.latency,
            ping_jitter: ping.jitter,
            latency: client.latency.latency,
            latency_jitter: client.latency.jitter,
            speed: client.speed,
            details: client.details,
            client_output: client.client_output,
            tested_at: Utc::now(),
        };

        self.logger
            .run_finished(&correlation_id, &report.server, report.proxy_ok(), started.elapsed().as_millis())
            .await;
        report.into()
    }

    /// Diagnose several configurations; results in input order
    pub async fn test_many(&self, protocol: Protocol, paths: &[PathBuf]) -> Vec<DiagnosticOutcome> {
        let limiter = Arc::new(Semaphore::new(self.settings.max_parallel.max(1)));
        let runs = paths.iter().map(|path| {
            let limiter = limiter.clone();
            async move {
                let _permit = limiter.acquire_owned().await.ok();
                self.test_full_proxy(protocol, path).await
            }
        });
        join_all(runs).await
    }

    /// Diagnose every configuration of a protocol found in the store
    pub async fn test_all(&self, protocol: Protocol) -> Result<Vec<(PathBuf, DiagnosticOutcome)>> {
        let paths = self.store.list(protocol).await?;
        let outcomes = self.test_many(protocol, &paths).await;
        Ok(paths.into_iter().zip(outcomes).collect())
    }

    async fn resolve_config(&self, protocol: Protocol, path: &Path, profile: &ProtocolProfile) -> Result<ProxyConfigRef> {
        let document = self.store.read_config(protocol, path).await?;
        let located = self.store.locate(protocol, path);
        ProxyConfigRef::resolve(protocol, located, document, profile)
    }

    async fn client_test(&self, profile: &ProtocolProfile, config: &ProxyConfigRef) -> ClientOutcome {
        let protocol = config.protocol;
        let launch = match self.supervisor.launch_for(profile, config) {
            Some(launch) => launch,
            None => return ClientOutcome::not_supported(protocol),
        };

        // The locked section runs on its own task: a cancelled caller cannot
        // release the locks or restart the service before teardown finishes.
        // Dropping `_caller_alive` only cuts the probes short.
        let (_caller_alive, caller_gone) = oneshot::channel();
        let section = tokio::spawn(locked_client_test(
            self.locks.clone(),
            self.services.clone(),
            self.supervisor.clone(),
            self.engine.clone(),
            self.logger.clone(),
            launch,
            profile.stop_live_service,
            caller_gone,
        ));

        match section.await {
            Ok(Ok(ClientRun::Started(Some((latency, speed))))) => ClientOutcome::measured(latency, speed),
            Ok(Ok(ClientRun::Started(None))) => ClientOutcome::start_failed(RUN_ABANDONED.to_string()),
            Ok(Ok(ClientRun::StartFailed { output, .. })) => ClientOutcome::start_failed(output),
            Ok(Err(panic)) => std::panic::resume_unwind(panic),
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => ClientOutcome::start_failed(error.to_string()),
        }
    }
}

/// `None` when the caller went away before the probes finished
type SectionResult = std::thread::Result<ClientRun<Option<(LatencyProbe, ProbeResult)>>>;

/// Locks, service bracket, client run and restart, in that order.
///
/// Locks are released only after the client is gone and the production
/// service has been started again. A probe panic is returned, not raised,
/// so the bracket still exits first.
#[allow(clippy::too_many_arguments)]
async fn locked_client_test(
    locks: Arc<ResourceLocks>,
    services: Arc<dyn ServiceController>,
    supervisor: Arc<ProcessSupervisor>,
    engine: Arc<ProbeEngine>,
    logger: Arc<DiagnosticLogger>,
    launch: ClientLaunch,
    stop_live_service: bool,
    mut caller_gone: oneshot::Receiver<()>,
) -> SectionResult {
    let protocol = launch.protocol;
    let _protocol_guard = locks.protocol(protocol, stop_live_service).await;
    let _port_guard = locks.port(launch.port).await;

    // abandoned while queued behind another run: leave the service alone
    if matches!(caller_gone.try_recv(), Err(TryRecvError::Closed)) {
        return Ok(ClientRun::Started(None));
    }

    let bracket = if stop_live_service && services.is_running(protocol).await {
        Some(ServiceBracket::enter(services, protocol, logger).await)
    } else {
        None
    };

    let probe = move |port| async move {
        tokio::select! {
            suite = proxied_suite(engine, port) => Some(suite),
            _ = caller_gone => None,
        }
    };
    let outcome = AssertUnwindSafe(supervisor.launch_and_probe(&launch, probe))
        .catch_unwind()
        .await;

    if let Some(bracket) = bracket {
        bracket.exit().await;
    }
    outcome
}
