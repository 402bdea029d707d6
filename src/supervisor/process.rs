//! Scratch client process spawning

use crate::types::{AppError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Most client output kept for a start-failure report
const OUTPUT_LIMIT: usize = 16 * 1024;

/// How long draining waits for the pipes to close
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Program and arguments of a client launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl std::fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exit code, `None` when killed by a signal
    Exited(Option<i32>),
}

/// A spawned client process
#[async_trait]
pub trait ClientProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Non-blocking exit check
    fn try_wait(&mut self) -> Result<ProcessState>;

    /// stdout and stderr collected so far, once the process has exited
    async fn drain_output(&mut self) -> String;

    /// Signal the process and wait for it to exit
    async fn terminate(&mut self, timeout: Duration) -> Result<()>;
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn ClientProcess>>;
}

/// tokio-backed launcher
#[derive(Debug, Default, Clone)]
pub struct TokioLauncher;

impl TokioLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for TokioLauncher {
    async fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn ClientProcess>> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::process(format!("failed to spawn {}: {}", command.program, e)))?;

        // Pipes are read continuously so a chatty client never blocks on a full pipe
        let output = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(collect(stdout, output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(collect(stderr, output.clone()));
        }

        Ok(Box::new(TokioProcess {
            child,
            output,
            readers,
        }))
    }
}

fn collect<R>(mut pipe: R, sink: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut sink) = sink.lock() {
                        sink.extend_from_slice(&buf[..n]);
                        if sink.len() > OUTPUT_LIMIT {
                            let excess = sink.len() - OUTPUT_LIMIT;
                            sink.drain(..excess);
                        }
                    }
                }
            }
        }
    })
}

pub struct TokioProcess {
    child: Child,
    output: Arc<Mutex<Vec<u8>>>,
    readers: Vec<JoinHandle<()>>,
}

#[async_trait]
impl ClientProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_wait(&mut self) -> Result<ProcessState> {
        match self.child.try_wait()? {
            Some(status) => Ok(ProcessState::Exited(status.code())),
            None => Ok(ProcessState::Running),
        }
    }

    async fn drain_output(&mut self) -> String {
        for reader in self.readers.drain(..) {
            // A grandchild holding the pipe open must not stall the report
            let _ = tokio::time::timeout(DRAIN_TIMEOUT, reader).await;
        }
        match self.output.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Err(_) => String::new(),
        }
    }

    async fn terminate(&mut self, timeout: Duration) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        self.child
            .start_kill()
            .map_err(|e| AppError::process(format!("failed to signal client: {}", e)))?;

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::process(format!("failed to wait for client: {}", e))),
            Err(_) => Err(AppError::timeout(format!("client did not exit within {:?}", timeout))),
        }
    }
}
