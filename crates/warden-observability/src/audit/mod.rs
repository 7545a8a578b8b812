//! Audit trail for provisioning attempts and queries

pub mod emitter;
pub mod event;
pub mod mask;
pub mod sink;

pub use emitter::{AuditConfig, AuditEmitter, AuditSinkConfig, EmitOutcome, EmitterStats};
pub use event::{
    ActorType, AuditAction, AuditActor, AuditEvent, AuditEventBuilder, AuditOutcome,
    AuditResource, AuditSeverity, ResourceKind, RetentionClass,
};
pub use mask::mask_principal;
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink, TracingAuditSink};
