//! Command-line interface

use crate::types::{HttpBackend, Protocol};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// KDW proxy diagnostics: direct ping, proxied latency and throughput of a proxy config
#[derive(Parser, Debug, Clone)]
#[command(name = "kdw-diag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output (JSON log lines on stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Environment file to load instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// ICMP echo requests per direct ping
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub ping_count: Option<u32>,

    /// Local SOCKS port for the scratch client
    #[arg(long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub scratch_port: Option<u16>,

    /// HTTP backend for proxied probes (curl, native)
    #[arg(long, global = true, value_parser = parse_backend)]
    pub backend: Option<HttpBackend>,

    /// Parent directory of the per-protocol config directories
    #[arg(long, global = true, value_name = "DIR")]
    pub config_root: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Full diagnostic of one proxy configuration
    Test {
        /// shadowsocks, trojan, vmess, tor
        #[arg(short, long, value_parser = parse_protocol)]
        protocol: Protocol,

        /// Config file, relative to the protocol directory or absolute
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Diagnose every configuration of a protocol
    TestAll {
        #[arg(short, long, value_parser = parse_protocol)]
        protocol: Protocol,
    },

    /// Direct ping of a host
    Ping {
        /// Host name or address
        host: String,
    },

    /// Status of the production proxy services
    Status,
}

impl Cli {
    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        !self.no_color && !self.json && supports_color()
    }
}

fn parse_protocol(s: &str) -> Result<Protocol, String> {
    s.parse::<Protocol>().map_err(|e| e.to_string())
}

fn parse_backend(s: &str) -> Result<HttpBackend, String> {
    s.parse::<HttpBackend>().map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    true
}
