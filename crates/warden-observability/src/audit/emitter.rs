//! Non-blocking audit emitter
//!
//! Callers enqueue events synchronously; a background task drains the queue
//! into the configured sinks. The queue is bounded. When it is full a
//! best-effort event is dropped on arrival, while a mandatory event evicts
//! the oldest best-effort event, or the oldest mandatory one if there is
//! none. Every drop is counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::event::AuditEvent;
use super::sink::{AuditSink, FileAuditSink, TracingAuditSink};
use crate::error::Result;
use crate::metrics::WardenMetrics;

/// Audit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Bounded queue capacity
    pub queue_capacity: usize,

    /// Sinks to write to
    pub sinks: Vec<AuditSinkConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            sinks: vec![AuditSinkConfig::Tracing],
        }
    }
}

/// Audit sink backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditSinkConfig {
    /// Structured log lines
    Tracing,
    /// JSON-lines file
    File {
        /// Path to audit log file
        path: String,
    },
}

impl AuditConfig {
    /// Create the sinks named by this configuration.
    pub async fn build_sinks(&self) -> Result<Vec<Arc<dyn AuditSink>>> {
        let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            match sink {
                AuditSinkConfig::Tracing => sinks.push(Arc::new(TracingAuditSink)),
                AuditSinkConfig::File { path } => {
                    sinks.push(Arc::new(FileAuditSink::new(path).await?));
                }
            }
        }
        Ok(sinks)
    }
}

/// What happened to an event handed to [`AuditEmitter::emit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Queued,
    /// Queued after evicting an older event
    QueuedWithEviction,
    /// Not queued
    Dropped,
}

/// Counters for the emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitterStats {
    pub written: u64,
    pub dropped: u64,
    pub sink_failures: u64,
    pub queued: usize,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
    sinks: Vec<Arc<dyn AuditSink>>,
    metrics: Option<Arc<WardenMetrics>>,
    wake: Notify,
    idle: Notify,
    in_flight: AtomicUsize,
    /// Read and written only while holding `queue`
    closed: AtomicBool,
    written: AtomicU64,
    dropped: AtomicU64,
    sink_failures: AtomicU64,
}

impl Shared {
    fn is_idle(&self) -> bool {
        let queue = self.queue.lock();
        queue.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.audit_dropped_total.inc();
        }
    }
}

/// Bounded, drop-oldest audit queue drained by a background task
#[derive(Debug)]
pub struct AuditEmitter {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditEmitter {
    /// Start the emitter. Must be called from within a tokio runtime.
    pub fn spawn(
        capacity: usize,
        sinks: Vec<Arc<dyn AuditSink>>,
        metrics: Option<Arc<WardenMetrics>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
            sinks,
            metrics,
            wake: Notify::new(),
            idle: Notify::new(),
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        });

        let worker = tokio::spawn(Self::run(shared.clone()));

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue an event. Never blocks and never fails the caller.
    pub fn emit(&self, event: AuditEvent) -> EmitOutcome {
        let shared = &self.shared;

        let outcome = {
            let mut queue = shared.queue.lock();
            if shared.closed.load(Ordering::SeqCst) {
                drop(queue);
                shared.record_drop();
                warn!(audit_id = %event.id, "Audit event emitted after shutdown; dropped");
                return EmitOutcome::Dropped;
            }
            if queue.len() < shared.capacity {
                queue.push_back(event);
                EmitOutcome::Queued
            } else if !event.mandatory {
                drop(queue);
                shared.record_drop();
                warn!(
                    audit_id = %event.id,
                    action = event.action.as_str(),
                    "Audit queue full; best-effort event dropped"
                );
                return EmitOutcome::Dropped;
            } else {
                let evicted = match queue.iter().position(|queued| !queued.mandatory) {
                    Some(index) => queue.remove(index),
                    None => queue.pop_front(),
                };
                queue.push_back(event);
                drop(queue);

                shared.record_drop();
                if let Some(evicted) = evicted {
                    warn!(
                        audit_id = %evicted.id,
                        mandatory = evicted.mandatory,
                        "Audit queue full; evicted oldest event"
                    );
                }
                EmitOutcome::QueuedWithEviction
            }
        };

        shared.wake.notify_one();
        outcome
    }

    /// Wait until every queued event has been handed to the sinks, then
    /// flush the sinks.
    pub async fn flush(&self) {
        loop {
            let idle = self.shared.idle.notified();
            if self.shared.is_idle() {
                break;
            }
            if self.worker.lock().as_ref().map_or(true, |w| w.is_finished()) {
                break;
            }
            idle.await;
        }
        for sink in &self.shared.sinks {
            if let Err(err) = sink.flush().await {
                warn!(sink = sink.name(), error = %err, "Audit sink flush failed");
            }
        }
    }

    /// Drain the queue and stop the worker.
    pub async fn shutdown(&self) {
        {
            let _queue = self.shared.queue.lock();
            self.shared.closed.store(true, Ordering::SeqCst);
        }
        self.shared.wake.notify_one();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "Audit worker terminated abnormally");
            }
        }
        for sink in &self.shared.sinks {
            if let Err(err) = sink.flush().await {
                warn!(sink = sink.name(), error = %err, "Audit sink flush failed");
            }
        }
    }

    pub fn stats(&self) -> EmitterStats {
        EmitterStats {
            written: self.shared.written.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            sink_failures: self.shared.sink_failures.load(Ordering::Relaxed),
            queued: self.shared.queue.lock().len(),
        }
    }

    async fn run(shared: Arc<Shared>) {
        loop {
            let (batch, closed) = {
                let mut queue = shared.queue.lock();
                let batch: Vec<AuditEvent> = queue.drain(..).collect();
                shared.in_flight.store(batch.len(), Ordering::SeqCst);
                (batch, shared.closed.load(Ordering::SeqCst))
            };

            if batch.is_empty() {
                shared.idle.notify_waiters();
                if closed {
                    debug!("Audit worker stopped");
                    break;
                }
                shared.wake.notified().await;
                continue;
            }

            for event in batch {
                Self::deliver(&shared, &event).await;
                shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    async fn deliver(shared: &Shared, event: &AuditEvent) {
        for sink in &shared.sinks {
            if let Err(err) = sink.write(event).await {
                shared.sink_failures.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &shared.metrics {
                    metrics.audit_sink_failures_total.inc();
                }
                warn!(
                    sink = sink.name(),
                    audit_id = %event.id,
                    error = %err,
                    "Audit sink write failed"
                );
            }
        }
        shared.written.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &shared.metrics {
            metrics.audit_events_total.inc();
        }
    }
}
