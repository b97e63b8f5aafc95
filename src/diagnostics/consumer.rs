//! Background task draining the diagnostics channel into the sinks

use crate::diagnostics::record::{Diagnostic, DiagnosticKind};
use crate::diagnostics::sink::{render_line, LogFormat, SinkSet};
use crate::diagnostics::StatsCounters;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// What travels through the diagnostics channel
pub(crate) enum Envelope {
    Record(Diagnostic),
    /// Acknowledged once every envelope queued before it has been handled
    Barrier(oneshot::Sender<()>),
}

/// The single consumer; owns the receiver and the sinks exclusively
pub(crate) struct DiagnosticsConsumer {
    receiver: mpsc::Receiver<Envelope>,
    sinks: SinkSet,
    format: LogFormat,
    stats: Arc<StatsCounters>,
}

impl DiagnosticsConsumer {
    pub(crate) fn new(
        receiver: mpsc::Receiver<Envelope>,
        sinks: SinkSet,
        format: LogFormat,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            receiver,
            sinks,
            format,
            stats,
        }
    }

    /// Drain until every producer handle is gone
    pub(crate) async fn run(mut self) {
        debug!("Diagnostics consumer started");

        while let Some(envelope) = self.receiver.recv().await {
            match envelope {
                Envelope::Record(diagnostic) => self.handle(diagnostic).await,
                Envelope::Barrier(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        debug!("Diagnostics consumer stopped: all producers dropped");
    }

    async fn handle(&mut self, diagnostic: Diagnostic) {
        let kind = diagnostic.kind();
        let Some(message) = diagnostic.message() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let line = render_line(self.format, kind, message, chrono::Utc::now());
        match self.sinks.write(kind, &line).await {
            Ok(()) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(target: "diagnostics", sink = kind.file_name(), error = %e, "Failed to write diagnostic");
            }
        }

        match kind {
            DiagnosticKind::Error => error!(target: "diagnostics", "{message}"),
            DiagnosticKind::Warning => warn!(target: "diagnostics", "{message}"),
            DiagnosticKind::Info => info!(target: "diagnostics", "{message}"),
        }
    }
}
