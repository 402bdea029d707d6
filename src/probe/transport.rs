//! HTTP-over-SOCKS transports for the proxied probes

use crate::shell::{shell_quote, CommandRunner};
use crate::stats::parse_positive;
use crate::types::{AppError, HttpBackend, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// curl exit status for "operation timed out"
const CURL_TIMEOUT_EXIT: i32 = 28;

/// One request through the local SOCKS endpoint on `127.0.0.1:<port>`
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Time to first byte of `url`, in milliseconds
    async fn time_to_first_byte(&self, port: u16, url: &str, timeout: Duration) -> Result<f64>;

    /// Average download speed of `url`, in bytes per second
    async fn download_speed(&self, port: u16, url: &str, timeout: Duration) -> Result<f64>;
}

/// Transport for the configured backend
pub fn for_backend(backend: HttpBackend, runner: Arc<dyn CommandRunner>) -> Arc<dyn ProxyTransport> {
    match backend {
        HttpBackend::Curl => Arc::new(CurlTransport::new(runner)),
        HttpBackend::Native => Arc::new(NativeTransport::new()),
    }
}

/// curl through the command runner; what the router firmware ships
pub struct CurlTransport {
    runner: Arc<dyn CommandRunner>,
}

impl CurlTransport {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// `curl -s -o /dev/null --socks5-hostname 127.0.0.1:<port> -m <secs> -w '<format>' <url>`
    pub fn command(port: u16, url: &str, timeout: Duration, write_out: &str) -> String {
        format!(
            "curl -s -o /dev/null --socks5-hostname 127.0.0.1:{} -m {} -w '{}' {}",
            port,
            timeout.as_secs().max(1),
            write_out,
            shell_quote(url)
        )
    }

    /// Run curl and parse its single `-w` figure
    async fn measure(&self, port: u16, url: &str, timeout: Duration, write_out: &str) -> Result<f64> {
        let command = Self::command(port, url, timeout, write_out);
        let output = self.runner.run(&command).await?;

        match output.exit_code {
            Some(0) => {}
            Some(CURL_TIMEOUT_EXIT) => {
                return Err(AppError::timeout(format!("{} timed out after {:?}", url, timeout)));
            }
            code => {
                return Err(AppError::network(format!(
                    "curl exited with {:?} for {}: {}",
                    code,
                    url,
                    output.stderr.trim()
                )));
            }
        }

        parse_positive(&output.stdout).ok_or_else(|| {
            AppError::parse(format!("curl reported '{}' for {}", output.stdout.trim(), url))
        })
    }
}

#[async_trait]
impl ProxyTransport for CurlTransport {
    async fn time_to_first_byte(&self, port: u16, url: &str, timeout: Duration) -> Result<f64> {
        let seconds = self.measure(port, url, timeout, "%{time_starttransfer}").await?;
        Ok(seconds * 1000.0)
    }

    async fn download_speed(&self, port: u16, url: &str, timeout: Duration) -> Result<f64> {
        self.measure(port, url, timeout, "%{speed_download}").await
    }
}

/// reqwest with a `socks5h` proxy, for hosts without curl
#[derive(Debug, Default, Clone)]
pub struct NativeTransport;

impl NativeTransport {
    pub fn new() -> Self {
        Self
    }

    fn client(port: u16, timeout: Duration) -> Result<reqwest::Client> {
        let proxy = reqwest::Proxy::all(format!("socks5h://127.0.0.1:{}", port))?;
        Ok(reqwest::Client::builder()
            .proxy(proxy)
            .timeout(timeout)
            .user_agent(concat!("kdw-diag/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}

#[async_trait]
impl ProxyTransport for NativeTransport {
    async fn time_to_first_byte(&self, port: u16, url: &str, timeout: Duration) -> Result<f64> {
        let client = Self::client(port, timeout)?;
        let start = Instant::now();
        // send() resolves once the status line and headers have arrived
        let _response = client.get(url).send().await?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    async fn download_speed(&self, port: u16, url: &str, timeout: Duration) -> Result<f64> {
        let client = Self::client(port, timeout)?;
        let start = Instant::now();
        let response = client.get(url).send().await?.error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut total: u64 = 0;
        while let Some(chunk) = stream.next().await {
            total += chunk?.len() as u64;
        }

        let elapsed = start.elapsed().as_secs_f64();
        if total == 0 || elapsed <= 0.0 {
            return Err(AppError::network(format!("{} returned no data", url)));
        }
        Ok(total as f64 / elapsed)
    }
}
