//! Data models for the proxy diagnostics

pub mod config;
pub mod proxy;
pub mod report;

// Re-export main model types
pub use config::{ProbeSettings, ProtocolProfile, Settings, SupervisorSettings};
pub use proxy::ProxyConfigRef;
pub use report::{DiagnosticOutcome, DiagnosticReport, LatencyProbe, PingProbe, ProbeResult};
