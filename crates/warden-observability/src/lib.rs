//! Warden Observability
//!
//! Audit trail, Prometheus metrics, and tracing setup for the provisioning
//! core.
//!
//! ## Features
//!
//! - **Audit**: One masked, structured record per attempt, drained by a
//!   background task into memory, JSON-lines file, or tracing sinks
//! - **Metrics**: Request, breaker, rate-limit, and audit counters
//! - **Tracing**: `tracing-subscriber` setup with env-filter and JSON output

#![deny(unsafe_code)]

pub mod audit;
pub mod error;
pub mod metrics;
pub mod telemetry;

pub use audit::{
    mask_principal, AuditAction, AuditActor, AuditConfig, AuditEmitter, AuditEvent, AuditOutcome,
    AuditResource, AuditSeverity, AuditSink, AuditSinkConfig, EmitOutcome, FileAuditSink,
    MemoryAuditSink, ResourceKind, RetentionClass, TracingAuditSink,
};
pub use error::{ObservabilityError, Result};
pub use metrics::{export_metrics, WardenMetrics};
pub use telemetry::{init_tracing, TracingConfig};
