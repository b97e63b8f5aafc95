//! Non-blocking diagnostics for the request path
//!
//! Producers hand a [`Diagnostic`] to a bounded channel and move on; a single
//! background consumer owns the three append-only sinks (errors, warnings,
//! info) and writes every record exactly once. Nothing else touches the
//! files, so the write path needs no locking.
//!
//! ```rust,ignore
//! let diagnostics = Diagnostics::start_new(settings)?;
//! diagnostics.error_f(format!("Error forwarding request: {err}")).await;
//! ```
//!
//! When the channel is full, submission waits for the consumer to catch up
//! rather than dropping the record.

pub mod consumer;
pub mod record;
pub mod sink;

pub use record::{Diagnostic, DiagnosticKind};
pub use sink::LogFormat;

use crate::diagnostics::consumer::{DiagnosticsConsumer, Envelope};
use crate::diagnostics::sink::SinkSet;
use nutype::nutype;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Default bound of the diagnostics channel
pub const DEFAULT_CAPACITY: usize = 100;

/// Default directory holding the sinks
pub const DEFAULT_LOG_DIR: &str = "logger";

/// Number of records the channel holds before producers wait
#[nutype(
    derive(Clone, Copy, Debug, Display, PartialEq, Eq, TryFrom, AsRef),
    validate(predicate = |capacity: &usize| *capacity > 0),
)]
pub struct QueueCapacity(usize);

impl Default for QueueCapacity {
    fn default() -> Self {
        Self::try_new(DEFAULT_CAPACITY).expect("default capacity is non-zero")
    }
}

/// Where and how the sinks are written
#[derive(Clone, Debug)]
pub struct DiagnosticsSettings {
    pub log_dir: PathBuf,
    pub format: LogFormat,
    pub capacity: QueueCapacity,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            format: LogFormat::default(),
            capacity: QueueCapacity::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DiagnosticsError {
    #[error("Could not open log file: {}: {source}", .path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) written: AtomicU64,
    pub(crate) skipped: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) consumer_starts: AtomicU64,
}

/// Snapshot of the diagnostics counters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticsStats {
    /// Records accepted by the channel
    pub submitted: u64,
    /// Records written to a sink
    pub written: u64,
    /// Error records without a payload, accepted and ignored
    pub skipped: u64,
    /// Records whose sink write failed
    pub failed: u64,
    /// Consumers spawned over the lifetime of the handle
    pub consumer_starts: u64,
}

enum ConsumerState {
    Uninitialized(mpsc::Receiver<Envelope>),
    Running,
}

struct Shared {
    settings: DiagnosticsSettings,
    state: Mutex<ConsumerState>,
    stats: Arc<StatsCounters>,
}

/// Cloneable producer handle; all clones feed the same consumer
#[derive(Clone)]
pub struct Diagnostics {
    sender: mpsc::Sender<Envelope>,
    shared: Arc<Shared>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("settings", &self.shared.settings)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Diagnostics {
    /// Create the channel; nothing is drained until [`Diagnostics::start`]
    pub fn new(settings: DiagnosticsSettings) -> Self {
        let (sender, receiver) = mpsc::channel(*settings.capacity.as_ref());
        Self {
            sender,
            shared: Arc::new(Shared {
                settings,
                state: Mutex::new(ConsumerState::Uninitialized(receiver)),
                stats: Arc::new(StatsCounters::default()),
            }),
        }
    }

    /// Create the channel and start the consumer in one step
    pub fn start_new(settings: DiagnosticsSettings) -> Result<Self, DiagnosticsError> {
        let diagnostics = Self::new(settings);
        diagnostics.start()?;
        Ok(diagnostics)
    }

    /// Open the sinks and spawn the consumer
    ///
    /// Only the first successful call does anything; later and concurrent
    /// calls return `Ok(())`. If a sink cannot be opened the handle stays
    /// uninitialized and the error is returned. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self) -> Result<(), DiagnosticsError> {
        let mut state = self.shared.state.lock();
        let receiver = match std::mem::replace(&mut *state, ConsumerState::Running) {
            ConsumerState::Running => return Ok(()),
            ConsumerState::Uninitialized(receiver) => receiver,
        };

        let sinks = match SinkSet::open(&self.shared.settings.log_dir) {
            Ok(sinks) => sinks,
            Err(e) => {
                *state = ConsumerState::Uninitialized(receiver);
                return Err(e);
            }
        };

        let consumer = DiagnosticsConsumer::new(
            receiver,
            sinks,
            self.shared.settings.format,
            Arc::clone(&self.shared.stats),
        );
        tokio::spawn(consumer.run());
        self.shared
            .stats
            .consumer_starts
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.shared.state.lock(), ConsumerState::Running)
    }

    pub fn settings(&self) -> &DiagnosticsSettings {
        &self.shared.settings
    }

    pub fn stats(&self) -> DiagnosticsStats {
        let stats = &self.shared.stats;
        DiagnosticsStats {
            submitted: stats.submitted.load(Ordering::Relaxed),
            written: stats.written.load(Ordering::Relaxed),
            skipped: stats.skipped.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            consumer_starts: stats.consumer_starts.load(Ordering::Relaxed),
        }
    }

    /// Enqueue one record, waiting while the channel is full
    pub async fn submit(&self, diagnostic: Diagnostic) {
        match self.sender.send(Envelope::Record(diagnostic)).await {
            Ok(()) => {
                self.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => warn!("Diagnostics consumer is gone; record discarded"),
        }
    }

    /// Enqueue from a context that cannot await, such as `Drop`
    ///
    /// If the channel is full the record is handed to a spawned task that
    /// waits for room, so it is delayed but never lost.
    pub fn submit_detached(&self, diagnostic: Diagnostic) {
        match self.sender.try_send(Envelope::Record(diagnostic)) {
            Ok(()) => {
                self.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                let this = self.clone();
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move { this.send_envelope(envelope).await });
                    }
                    Err(_) => {
                        if this.sender.blocking_send(envelope).is_ok() {
                            this.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Diagnostics consumer is gone; record discarded");
            }
        }
    }

    async fn send_envelope(&self, envelope: Envelope) {
        if self.sender.send(envelope).await.is_ok() {
            self.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Submit an error; `None` is accepted and produces no sink line
    pub fn error<E: fmt::Display>(&self, err: Option<E>) -> impl Future<Output = ()> + Send + '_ {
        let message = err.map(|e| e.to_string());
        self.submit(Diagnostic::Error(message))
    }

    /// Submit an error rendered from `message`, typically a `format!` result
    pub fn error_f(&self, message: impl fmt::Display) -> impl Future<Output = ()> + Send + '_ {
        self.submit(Diagnostic::Error(Some(message.to_string())))
    }

    pub fn warn(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.submit(Diagnostic::Warning(message.into()))
    }

    pub fn warn_f(&self, message: impl fmt::Display) -> impl Future<Output = ()> + Send + '_ {
        self.submit(Diagnostic::Warning(message.to_string()))
    }

    pub fn info(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.submit(Diagnostic::Info(message.into()))
    }

    pub fn info_f(&self, message: impl fmt::Display) -> impl Future<Output = ()> + Send + '_ {
        self.submit(Diagnostic::Info(message.to_string()))
    }

    /// Wait until everything submitted before this call has been handled
    ///
    /// Waits indefinitely if the consumer was never started.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.sender.send(Envelope::Barrier(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}
