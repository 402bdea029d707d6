//! Proxy configuration store

use crate::error::ErrorContext;
use crate::types::{AppError, Protocol, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Read access to the per-protocol JSON configurations
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Parsed document of one configuration
    async fn read_config(&self, protocol: Protocol, path: &Path) -> Result<Value>;

    /// Every configuration of a protocol, sorted by path
    async fn list(&self, protocol: Protocol) -> Result<Vec<PathBuf>>;

    /// Path a client process should be given for `path`
    fn locate(&self, _protocol: Protocol, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// `<root>/<protocol>/*.json` on the router's filesystem
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    root: PathBuf,
}

impl JsonConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn protocol_dir(&self, protocol: Protocol) -> PathBuf {
        self.root.join(protocol.as_str())
    }

    /// Relative paths are taken relative to the protocol directory
    pub fn resolve(&self, protocol: Protocol, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.protocol_dir(protocol).join(path)
        }
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn read_config(&self, protocol: Protocol, path: &Path) -> Result<Value> {
        let full_path = self.resolve(protocol, path);
        let raw = tokio::fs::read_to_string(&full_path)
            .await
            .with_context(|| format!("reading {}", full_path.display()))?;

        if raw.trim().is_empty() {
            return Err(AppError::config(format!("{} is empty", full_path.display())));
        }

        serde_json::from_str::<Value>(&raw).with_context(|| format!("parsing {}", full_path.display()))
    }

    async fn list(&self, protocol: Protocol) -> Result<Vec<PathBuf>> {
        let dir = self.protocol_dir(protocol);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::io(format!("listing {}: {}", dir.display(), e)));
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path.extension().map(|ext| ext == "json").unwrap_or(false);
            if is_json && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn locate(&self, protocol: Protocol, path: &Path) -> PathBuf {
        self.resolve(protocol, path)
    }
}
