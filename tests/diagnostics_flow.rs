//! End-to-end diagnostic flows with every external collaborator mocked

use async_trait::async_trait;
use kdw_diagnostics::{
    diagnostics::ProxyDiagnostics,
    error::{AppError, Result},
    logging::DiagnosticLogger,
    models::Settings,
    probe::{ProbeEngine, ProxyTransport},
    services::{ServiceController, ServiceStatus},
    shell::{CommandOutput, CommandRunner},
    store::ConfigStore,
    supervisor::{ClientProcess, LaunchCommand, ProcessLauncher, ProcessState, ProcessSupervisor},
    DiagnosticOutcome, ProbeStatus, Protocol,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PING_OK: &str = "PING nl1.example.net (203.0.113.7) 56(84) bytes of data.

--- nl1.example.net ping statistics ---
5 packets transmitted, 5 received, 0% packet loss, time 4005ms
rtt min/avg/max/mdev = 40.123/42.456/45.789/2.345 ms";

/// Shared, ordered record of side effects across all mocks
#[derive(Default)]
struct Journal(Mutex<Vec<String>>);

impl Journal {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

struct PingRunner {
    journal: Arc<Journal>,
}

#[async_trait]
impl CommandRunner for PingRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.journal.push(format!("ping:{}", command));
        Ok(CommandOutput::new(0, PING_OK, ""))
    }
}

#[derive(Default)]
struct MemoryStore {
    configs: BTreeMap<PathBuf, Value>,
}

impl MemoryStore {
    fn with(mut self, path: &str, document: Value) -> Self {
        self.configs.insert(PathBuf::from(path), document);
        self
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn read_config(&self, _protocol: Protocol, path: &Path) -> Result<Value> {
        self.configs
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::io(format!("{} not found", path.display())))
    }

    async fn list(&self, _protocol: Protocol) -> Result<Vec<PathBuf>> {
        Ok(self.configs.keys().cloned().collect())
    }
}

struct RecordingServices {
    running: bool,
    journal: Arc<Journal>,
}

#[async_trait]
impl ServiceController for RecordingServices {
    async fn status(&self, protocol: Protocol) -> ServiceStatus {
        self.journal.push(format!("status:{}", protocol));
        if self.running {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        }
    }

    async fn start(&self, protocol: Protocol) -> Result<String> {
        self.journal.push(format!("start:{}", protocol));
        Ok("Starting... done.".to_string())
    }

    async fn stop(&self, protocol: Protocol) -> Result<String> {
        self.journal.push(format!("stop:{}", protocol));
        Ok("Stopping... done.".to_string())
    }
}

#[derive(Clone, Copy)]
enum Spawn {
    Runs,
    ExitsEarly(i32),
    Fails,
}

struct ScriptedLauncher {
    behaviour: Spawn,
    terminate_delay: Option<Duration>,
    journal: Arc<Journal>,
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn ClientProcess>> {
        if let Spawn::Fails = self.behaviour {
            return Err(AppError::process(format!("failed to spawn {}: not found", command.program)));
        }
        self.journal.push(format!("spawn:{}", command));
        Ok(Box::new(ScriptedProcess {
            exit: match self.behaviour {
                Spawn::ExitsEarly(code) => Some(code),
                _ => None,
            },
            terminate_delay: self.terminate_delay,
            journal: self.journal.clone(),
        }))
    }
}

struct ScriptedProcess {
    exit: Option<i32>,
    terminate_delay: Option<Duration>,
    journal: Arc<Journal>,
}

#[async_trait]
impl ClientProcess for ScriptedProcess {
    fn id(&self) -> Option<u32> {
        Some(31337)
    }

    fn try_wait(&mut self) -> Result<ProcessState> {
        Ok(match self.exit {
            Some(code) => ProcessState::Exited(Some(code)),
            None => ProcessState::Running,
        })
    }

    async fn drain_output(&mut self) -> String {
        "Error: bind: Address already in use".to_string()
    }

    /// Recorded once the client has actually exited
    async fn terminate(&mut self, _timeout: Duration) -> Result<()> {
        if let Some(delay) = self.terminate_delay {
            tokio::time::sleep(delay).await;
        }
        self.journal.push("terminate");
        Ok(())
    }
}

/// Queued readings; exhausted queues answer with a network error
#[derive(Default)]
struct ScriptedTransport {
    latency: Mutex<VecDeque<Result<f64>>>,
    speed: Mutex<VecDeque<Result<f64>>>,
    latency_calls: AtomicUsize,
    speed_calls: AtomicUsize,
    panic_on_latency: bool,
    latency_delay: Option<Duration>,
}

impl ScriptedTransport {
    fn healthy() -> Self {
        Self {
            latency: Mutex::new(VecDeque::from(vec![Ok(100.0), Ok(120.0), Ok(140.0)])),
            speed: Mutex::new(VecDeque::from(vec![Ok(2_097_152.0)])),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ProxyTransport for ScriptedTransport {
    async fn time_to_first_byte(&self, _port: u16, _url: &str, _timeout: Duration) -> Result<f64> {
        self.latency_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_latency {
            panic!("transport bug");
        }
        if let Some(delay) = self.latency_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.latency.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(AppError::network("connection refused")))
    }

    async fn download_speed(&self, _port: u16, _url: &str, _timeout: Duration) -> Result<f64> {
        self.speed_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.speed.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(AppError::network("connection reset")))
    }
}

struct Harness {
    diagnostics: ProxyDiagnostics,
    journal: Arc<Journal>,
    transport: Arc<ScriptedTransport>,
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.supervisor.settle_delay_ms = 10;
    settings.supervisor.teardown_timeout_ms = 100;
    settings.max_parallel = 4;
    settings
}

fn ss_config(host: &str) -> Value {
    json!({ "server": host, "server_port": 8388, "password": "secret", "method": "chacha20-ietf-poly1305" })
}

fn trojan_config(host: &str) -> Value {
    json!({ "run_type": "client", "remote_addr": host, "remote_port": 443, "local_port": 1081 })
}

fn harness(store: MemoryStore, spawn: Spawn, running: bool, transport: ScriptedTransport) -> Harness {
    harness_with_slow_exit(store, spawn, running, transport, None)
}

fn harness_with_slow_exit(
    store: MemoryStore,
    spawn: Spawn,
    running: bool,
    transport: ScriptedTransport,
    terminate_delay: Option<Duration>,
) -> Harness {
    let settings = Arc::new(settings());
    let journal = Arc::new(Journal::default());
    let logger = Arc::new(DiagnosticLogger::silent());
    let transport = Arc::new(transport);

    let engine = Arc::new(ProbeEngine::new(
        settings.clone(),
        Arc::new(PingRunner { journal: journal.clone() }),
        transport.clone(),
        logger.clone(),
    ));
    let supervisor = Arc::new(ProcessSupervisor::new(
        Arc::new(ScriptedLauncher {
            behaviour: spawn,
            terminate_delay,
            journal: journal.clone(),
        }),
        settings.clone(),
        logger.clone(),
    ));
    let services = Arc::new(RecordingServices {
        running,
        journal: journal.clone(),
    });

    Harness {
        diagnostics: ProxyDiagnostics::new(settings, Arc::new(store), services, engine, supervisor, logger),
        journal,
        transport,
    }
}

fn report(outcome: &DiagnosticOutcome) -> &kdw_diagnostics::DiagnosticReport {
    outcome.report().expect("expected a report")
}

#[tokio::test]
async fn test_healthy_shadowsocks_config() {
    let h = harness(
        MemoryStore::default().with("nl-1.json", ss_config("nl1.example.net")),
        Spawn::Runs,
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert_eq!(report.server, "nl1.example.net");
    assert_eq!(report.ping.value, "42 мс");
    assert_eq!(report.ping_jitter.value, "2 мс");
    assert_eq!(report.latency.value, "120 мс");
    assert_eq!(report.latency_jitter.value, "20 мс");
    assert_eq!(report.speed.value, "2.00 МБ/с");
    assert!(report.proxy_ok());

    let events = h.journal.events();
    assert!(events[0].starts_with("ping:ping -c 5"));
    assert_eq!(events[1], "spawn:ss-local -c nl-1.json -l 1090");
    assert_eq!(events[2], "terminate");
    // shadowsocks never touches the production service
    assert_eq!(h.journal.count("status:"), 0);
    assert_eq!(h.journal.count("stop:"), 0);
}

#[tokio::test]
async fn test_unreadable_config_runs_nothing() {
    let h = harness(MemoryStore::default(), Spawn::Runs, true, ScriptedTransport::healthy());

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("missing.json")).await;

    assert!(outcome.is_error());
    let value = serde_json::to_value(&outcome).unwrap();
    assert!(value["error"].as_str().unwrap().contains("missing.json"));
    assert!(h.journal.events().is_empty());
    assert_eq!(h.transport.latency_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_object_config_is_an_error() {
    let h = harness(
        MemoryStore::default().with("list.json", json!(["not", "a", "config"])),
        Spawn::Runs,
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("list.json")).await;
    assert!(outcome.is_error());
    assert_eq!(h.journal.count("spawn:"), 0);
}

#[tokio::test]
async fn test_client_exits_during_settle() {
    let h = harness(
        MemoryStore::default().with("nl-1.json", ss_config("nl1.example.net")),
        Spawn::ExitsEarly(1),
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert_eq!(report.ping.value, "42 мс");
    assert_eq!(report.latency.value, "❌");
    assert_eq!(report.latency_jitter.value, "N/A");
    assert_eq!(report.speed.value, "❌");
    assert_eq!(report.details, "клиент не запустился");
    assert_eq!(report.client_output.as_deref(), Some("Error: bind: Address already in use"));
    assert_eq!(h.transport.latency_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.transport.speed_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_spawn_failure_is_a_start_failure() {
    let h = harness(
        MemoryStore::default().with("nl-1.json", ss_config("nl1.example.net")),
        Spawn::Fails,
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert_eq!(report.latency.status, ProbeStatus::Unreachable);
    assert_eq!(report.details, "клиент не запустился");
    assert!(report.client_output.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_dead_proxy_skips_throughput() {
    let h = harness(
        MemoryStore::default().with("nl-1.json", ss_config("nl1.example.net")),
        Spawn::Runs,
        true,
        ScriptedTransport::default(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert_eq!(report.latency.value, "❌");
    assert_eq!(report.latency_jitter.status, ProbeStatus::NoData);
    assert_eq!(report.speed.status, ProbeStatus::Unreachable);
    assert!(report.speed.detail_or_empty().contains("прокси не отвечает"));
    assert!(report.details.contains("прокси не отвечает"));
    assert_eq!(h.transport.latency_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.transport.speed_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.journal.count("terminate"), 1);
}

#[tokio::test]
async fn test_single_latency_sample_has_no_jitter() {
    let transport = ScriptedTransport {
        latency: Mutex::new(VecDeque::from(vec![Ok(180.0)])),
        speed: Mutex::new(VecDeque::from(vec![Ok(512_000.0)])),
        ..ScriptedTransport::default()
    };
    let h = harness(
        MemoryStore::default().with("nl-1.json", ss_config("nl1.example.net")),
        Spawn::Runs,
        true,
        transport,
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert_eq!(report.latency.value, "180 мс");
    assert_eq!(report.latency_jitter.value, "N/A");
    assert_eq!(report.speed.value, "500.00 КБ/с");
}

#[tokio::test]
async fn test_speed_falls_back_to_next_source() {
    let transport = ScriptedTransport {
        latency: Mutex::new(VecDeque::from(vec![Ok(100.0), Ok(100.0), Ok(100.0)])),
        speed: Mutex::new(VecDeque::from(vec![
            Err(AppError::timeout("first source timed out")),
            Ok(1_048_576.0),
        ])),
        ..ScriptedTransport::default()
    };
    let h = harness(
        MemoryStore::default().with("nl-1.json", ss_config("nl1.example.net")),
        Spawn::Runs,
        true,
        transport,
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert_eq!(report.speed.value, "1.00 МБ/с");
    assert_eq!(report.latency_jitter.value, "0 мс");
    assert_eq!(h.transport.speed_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_all_speed_sources_failing() {
    let transport = ScriptedTransport {
        latency: Mutex::new(VecDeque::from(vec![Ok(100.0), Ok(110.0), Ok(120.0)])),
        ..ScriptedTransport::default()
    };
    let h = harness(
        MemoryStore::default().with("nl-1.json", ss_config("nl1.example.net")),
        Spawn::Runs,
        true,
        transport,
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert!(report.latency.is_success());
    assert_eq!(report.speed.value, "❌");
    assert_eq!(report.details, "скорость: все источники недоступны");
    assert_eq!(h.transport.speed_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unsupported_protocol_still_pings() {
    let h = harness(
        MemoryStore::default().with("vmess.json", json!({ "server": "vm.example.net" })),
        Spawn::Runs,
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Other, Path::new("vmess.json")).await;
    let report = report(&outcome);

    assert_eq!(report.ping.value, "42 мс");
    assert_eq!(report.latency.status, ProbeStatus::NotSupported);
    assert_eq!(report.speed.status, ProbeStatus::NotSupported);
    assert_eq!(h.journal.count("spawn:"), 0);
    assert_eq!(h.transport.latency_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_host_skips_ping() {
    let h = harness(
        MemoryStore::default().with("nl-1.json", json!({ "server": "  ", "server_port": 8388 })),
        Spawn::Runs,
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Shadowsocks, Path::new("nl-1.json")).await;
    let report = report(&outcome);

    assert_eq!(report.server, "");
    assert_eq!(report.ping.value, "N/A");
    assert_eq!(report.ping_jitter.value, "N/A");
    assert_eq!(h.journal.count("ping:"), 0);
    // the proxied test does not need the host
    assert!(report.latency.is_success());
}

#[tokio::test]
async fn test_trojan_brackets_running_service() {
    let h = harness(
        MemoryStore::default().with("tr.json", trojan_config("tr.example.net")),
        Spawn::Runs,
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Trojan, Path::new("tr.json")).await;
    assert!(report(&outcome).proxy_ok());

    let events: Vec<String> = h
        .journal
        .events()
        .into_iter()
        .filter(|e| !e.starts_with("ping:"))
        .collect();
    assert_eq!(
        events,
        vec![
            "status:trojan".to_string(),
            "stop:trojan".to_string(),
            "spawn:trojan -c tr.json".to_string(),
            "terminate".to_string(),
            "start:trojan".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_trojan_stopped_service_is_left_alone() {
    let h = harness(
        MemoryStore::default().with("tr.json", trojan_config("tr.example.net")),
        Spawn::Runs,
        false,
        ScriptedTransport::healthy(),
    );

    h.diagnostics.test_full_proxy(Protocol::Trojan, Path::new("tr.json")).await;

    assert_eq!(h.journal.count("stop:"), 0);
    assert_eq!(h.journal.count("start:"), 0);
    assert_eq!(h.journal.count("terminate"), 1);
}

#[tokio::test]
async fn test_trojan_restarted_after_start_failure() {
    let h = harness(
        MemoryStore::default().with("tr.json", trojan_config("tr.example.net")),
        Spawn::ExitsEarly(2),
        true,
        ScriptedTransport::healthy(),
    );

    let outcome = h.diagnostics.test_full_proxy(Protocol::Trojan, Path::new("tr.json")).await;
    assert_eq!(report(&outcome).details, "клиент не запустился");
    assert_eq!(h.journal.count("stop:"), 1);
    assert_eq!(h.journal.count("start:"), 1);
}

#[tokio::test]
async fn test_panicking_probe_restarts_service_once() {
    let transport = ScriptedTransport {
        panic_on_latency: true,
        ..ScriptedTransport::default()
    };
    let h = Arc::new(harness(
        MemoryStore::default().with("tr.json", trojan_config("tr.example.net")),
        Spawn::Runs,
        true,
        transport,
    ));

    let task = {
        let h = h.clone();
        tokio::spawn(async move { h.diagnostics.test_full_proxy(Protocol::Trojan, Path::new("tr.json")).await })
    };
    let result = task.await;

    assert!(result.unwrap_err().is_panic());
    assert_eq!(h.journal.count("terminate"), 1);
    assert_eq!(h.journal.count("start:"), 1);
    let events = h.journal.events();
    let terminate = events.iter().position(|e| e == "terminate").unwrap();
    let start = events.iter().position(|e| e == "start:trojan").unwrap();
    assert!(terminate < start);
}

#[tokio::test]
async fn test_cancelled_run_still_cleans_up() {
    let transport = ScriptedTransport {
        latency_delay: Some(Duration::from_secs(30)),
        ..ScriptedTransport::default()
    };
    let h = harness(
        MemoryStore::default().with("tr.json", trojan_config("tr.example.net")),
        Spawn::Runs,
        true,
        transport,
    );

    let run = h.diagnostics.test_full_proxy(Protocol::Trojan, Path::new("tr.json"));
    let cancelled = tokio::time::timeout(Duration::from_millis(200), run).await;
    assert!(cancelled.is_err());

    for _ in 0..100 {
        if h.journal.count("terminate") == 1 && h.journal.count("start:") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.journal.count("terminate"), 1);
    assert_eq!(h.journal.count("start:"), 1);
}

#[tokio::test]
async fn test_cancelled_run_finishes_cleanup_before_next_run() {
    let transport = ScriptedTransport {
        latency_delay: Some(Duration::from_millis(300)),
        ..ScriptedTransport::healthy()
    };
    let h = harness_with_slow_exit(
        MemoryStore::default().with("tr.json", trojan_config("tr.example.net")),
        Spawn::Runs,
        true,
        transport,
        Some(Duration::from_millis(200)),
    );

    let run = h.diagnostics.test_full_proxy(Protocol::Trojan, Path::new("tr.json"));
    assert!(tokio::time::timeout(Duration::from_millis(100), run).await.is_err());

    // same port, same service, started right after the cancel
    let second = h.diagnostics.test_full_proxy(Protocol::Trojan, Path::new("tr.json")).await;
    assert!(second.report().is_some());

    let events: Vec<String> = h
        .journal
        .events()
        .into_iter()
        .filter(|e| !e.starts_with("ping:") && !e.starts_with("status:"))
        .collect();
    assert_eq!(
        events,
        vec![
            "stop:trojan".to_string(),
            "spawn:trojan -c tr.json".to_string(),
            "terminate".to_string(),
            "start:trojan".to_string(),
            "stop:trojan".to_string(),
            "spawn:trojan -c tr.json".to_string(),
            "terminate".to_string(),
            "start:trojan".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_many_keeps_input_order() {
    let h = harness(
        MemoryStore::default()
            .with("a.json", ss_config("a.example.net"))
            .with("c.json", ss_config("c.example.net")),
        Spawn::Runs,
        true,
        ScriptedTransport::default(),
    );

    let paths = vec![PathBuf::from("c.json"), PathBuf::from("missing.json"), PathBuf::from("a.json")];
    let outcomes = h.diagnostics.test_many(Protocol::Shadowsocks, &paths).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(report(&outcomes[0]).server, "c.example.net");
    assert!(outcomes[1].is_error());
    assert_eq!(report(&outcomes[2]).server, "a.example.net");
}

#[tokio::test]
async fn test_scratch_port_is_never_shared() {
    let h = harness(
        MemoryStore::default()
            .with("a.json", ss_config("a.example.net"))
            .with("b.json", ss_config("b.example.net"))
            .with("c.json", ss_config("c.example.net")),
        Spawn::Runs,
        true,
        ScriptedTransport::default(),
    );

    let outcomes = h.diagnostics.test_all(Protocol::Shadowsocks).await.unwrap();
    let paths: Vec<_> = outcomes.iter().map(|(path, _)| path.clone()).collect();
    assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("b.json"), PathBuf::from("c.json")]);

    // every spawn on port 1090 is torn down before the next one
    let lifecycle: Vec<String> = h
        .journal
        .events()
        .into_iter()
        .filter(|e| e.starts_with("spawn:") || e == "terminate")
        .collect();
    assert_eq!(lifecycle.len(), 6);
    for pair in lifecycle.chunks(2) {
        assert!(pair[0].starts_with("spawn:"));
        assert_eq!(pair[1], "terminate");
    }
}

#[tokio::test]
async fn test_bracketed_runs_do_not_overlap() {
    let h = harness(
        MemoryStore::default()
            .with("tr-1.json", trojan_config("one.example.net"))
            .with("tr-2.json", trojan_config("two.example.net")),
        Spawn::Runs,
        true,
        ScriptedTransport::default(),
    );

    let outcomes = h.diagnostics.test_all(Protocol::Trojan).await.unwrap();
    assert_eq!(outcomes.len(), 2);

    let bracket: Vec<String> = h
        .journal
        .events()
        .into_iter()
        .filter(|e| !e.starts_with("ping:") && !e.starts_with("status:"))
        .collect();
    assert_eq!(bracket.len(), 8);
    for run in bracket.chunks(4) {
        assert_eq!(run[0], "stop:trojan");
        assert!(run[1].starts_with("spawn:trojan"));
        assert_eq!(run[2], "terminate");
        assert_eq!(run[3], "start:trojan");
    }
}

#[tokio::test]
async fn test_direct_ping_string() {
    let h = harness(MemoryStore::default(), Spawn::Runs, true, ScriptedTransport::default());
    assert_eq!(h.diagnostics.get_direct_ping("nl1.example.net").await, "42 мс");
    assert_eq!(h.diagnostics.get_direct_ping("").await, "N/A");
}
