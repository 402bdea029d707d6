//! Production service control through init.d scripts

use crate::models::Settings;
use crate::shell::{shell_quote, CommandRunner};
use crate::types::{AppError, Protocol, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Services the bot knows about and their stock init script names
pub const KNOWN_SERVICES: &[(&str, &str)] = &[
    ("shadowsocks", "S22shadowsocks"),
    ("trojan", "S22trojan"),
    ("vmess", "S24v2ray"),
    ("tor", "S35tor"),
];

/// State reported by a service's `status` action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped,
    /// Script answered, but with neither "running" nor "stopped"
    Unclear,
    /// Script missing or the status command failed
    NotFound,
}

impl ServiceStatus {
    /// Classify the output of a successful `status` call
    pub fn from_output(output: &str) -> Self {
        let output = output.to_lowercase();
        // "not running" has to win over "running"
        if output.contains("not running") || output.contains("stopped") {
            ServiceStatus::Stopped
        } else if output.contains("running") {
            ServiceStatus::Running
        } else {
            ServiceStatus::Unclear
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "✅",
            ServiceStatus::Stopped => "❌",
            ServiceStatus::Unclear => "🤔",
            ServiceStatus::NotFound => "❓",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "Запущен",
            ServiceStatus::Stopped => "Остановлен",
            ServiceStatus::Unclear => "Неясный статус",
            ServiceStatus::NotFound => "не найден",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running)
    }
}

/// Lifecycle control of the long-running production proxy services
#[async_trait]
pub trait ServiceController: Send + Sync {
    async fn status(&self, protocol: Protocol) -> ServiceStatus;

    /// Script output on success
    async fn start(&self, protocol: Protocol) -> Result<String>;

    async fn stop(&self, protocol: Protocol) -> Result<String>;

    async fn restart(&self, protocol: Protocol) -> Result<String> {
        self.stop(protocol).await?;
        self.start(protocol).await
    }

    async fn is_running(&self, protocol: Protocol) -> bool {
        self.status(protocol).await.is_running()
    }
}

#[derive(Debug, Clone)]
struct ServiceEntry {
    name: String,
    default_script: String,
}

/// init.d controller: `<init_dir>/<script> status|start|stop|restart`
pub struct InitScriptController {
    runner: Arc<dyn CommandRunner>,
    init_dir: PathBuf,
    services: Vec<ServiceEntry>,
}

impl InitScriptController {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        let services = KNOWN_SERVICES
            .iter()
            .map(|(name, script)| {
                let profile_script = name
                    .parse::<Protocol>()
                    .ok()
                    .filter(|protocol| *protocol != Protocol::Other)
                    .map(|protocol| settings.profile(protocol).service_script)
                    .filter(|script| !script.is_empty());
                ServiceEntry {
                    name: name.to_string(),
                    default_script: profile_script.unwrap_or_else(|| script.to_string()),
                }
            })
            .collect();

        Self {
            runner,
            init_dir: settings.init_dir.clone(),
            services,
        }
    }

    fn entry(&self, protocol: Protocol) -> Result<&ServiceEntry> {
        self.services
            .iter()
            .find(|entry| protocol != Protocol::Other && entry.name == protocol.as_str())
            .ok_or_else(|| AppError::service(format!("Служба '{}' не найдена.", protocol)))
    }

    /// Installed `S<NN><name>` script, or the stock name when none is found
    async fn script_path(&self, entry: &ServiceEntry) -> PathBuf {
        let pattern = format!(r"^S\d{{2}}{}$", regex::escape(&entry.name));
        if let Ok(re) = Regex::new(&pattern) {
            if let Ok(mut dir) = tokio::fs::read_dir(&self.init_dir).await {
                let mut matches = Vec::new();
                while let Ok(Some(item)) = dir.next_entry().await {
                    let file_name = item.file_name().to_string_lossy().into_owned();
                    if re.is_match(&file_name) {
                        matches.push(item.path());
                    }
                }
                matches.sort();
                if let Some(found) = matches.into_iter().next() {
                    return found;
                }
            }
        }
        self.init_dir.join(&entry.default_script)
    }

    async fn run_action(&self, entry: &ServiceEntry, action: &str) -> Result<String> {
        let script = self.script_path(entry).await;
        let command = format!("{} {}", shell_quote(&script.to_string_lossy()), action);
        let output = self.runner.run(&command).await?;
        if output.success() {
            Ok(output.combined())
        } else {
            Err(AppError::service(format!(
                "{} {} failed ({:?}): {}",
                entry.name,
                action,
                output.exit_code,
                output.combined()
            )))
        }
    }

    async fn status_of(&self, entry: &ServiceEntry) -> ServiceStatus {
        match self.run_action(entry, "status").await {
            Ok(output) => ServiceStatus::from_output(&output),
            Err(_) => ServiceStatus::NotFound,
        }
    }

    /// One status line per known service, as shown in the bot's status menu
    pub async fn status_report(&self) -> String {
        if self.services.is_empty() {
            return "Не найдено ни одной службы для проверки.".to_string();
        }

        let mut lines = Vec::with_capacity(self.services.len());
        for entry in &self.services {
            let status = self.status_of(entry).await;
            lines.push(format!("{} {}: {}", status.icon(), capitalize(&entry.name), status.text()));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl ServiceController for InitScriptController {
    async fn status(&self, protocol: Protocol) -> ServiceStatus {
        match self.entry(protocol) {
            Ok(entry) => self.status_of(entry).await,
            Err(_) => ServiceStatus::NotFound,
        }
    }

    async fn start(&self, protocol: Protocol) -> Result<String> {
        let entry = self.entry(protocol)?;
        self.run_action(entry, "start").await
    }

    async fn stop(&self, protocol: Protocol) -> Result<String> {
        let entry = self.entry(protocol)?;
        self.run_action(entry, "stop").await
    }

    async fn restart(&self, protocol: Protocol) -> Result<String> {
        let entry = self.entry(protocol)?;
        self.run_action(entry, "restart").await
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
