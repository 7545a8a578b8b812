//! Audit sinks for storing audit events

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use super::event::{AuditEvent, AuditSeverity};
use crate::error::Result;

/// Trait for audit sinks
#[async_trait]
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    /// Persist one event
    async fn write(&self, event: &AuditEvent) -> Result<()>;

    /// Flush any buffered events
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory audit sink for testing
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, event: &AuditEvent) -> Result<()> {
        self.events.write().push(event.clone());
        Ok(())
    }
}

/// Append-only JSON-lines audit file
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    /// Create a new file sink, creating parent directories if needed
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all events back from the file
    pub async fn read_all(&self) -> Result<Vec<AuditEvent>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn write(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Sink that writes each event as a structured log line under the
/// `warden::audit` target
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn write(&self, event: &AuditEvent) -> Result<()> {
        let outcome = serde_json::to_string(&event.outcome)?;
        let severity = match event.severity {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::High => "high",
        };
        info!(
            target: "warden::audit",
            audit_id = %event.id,
            correlation_id = %event.correlation_id,
            actor = %event.actor.id,
            action = event.action.as_str(),
            resource = %event.resource.id,
            principal = event.principal_masked.as_deref().unwrap_or("-"),
            outcome = %outcome,
            severity = severity,
            "audit"
        );
        Ok(())
    }
}
