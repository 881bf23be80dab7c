//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] renders every event as one `tracing` line at `INFO`
//! (failures at `WARN`). Install a `tracing` subscriber to see them.
//!
//! ## Output format
//! ```text
//! [agent-registered] agent=pinger index=0
//! [agent-starting] agent=pinger index=0
//! [agent-failed] agent=pinger reason="handler for u32 failed: boom"
//! [fatal-error] agent=pinger reason="..."
//! [all-stopped]
//! [worker-failed] worker=3 reason="..."
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs events through `tracing`.
///
/// Enabled via the `logging` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Creates the writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let kind = e.kind.as_str();
        let agent = e.agent.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::AgentFailed
            | EventKind::FatalError
            | EventKind::WorkerFailed
            | EventKind::SubscriberPanicked
            | EventKind::SubscriberOverflow => {
                warn!(
                    seq = e.seq,
                    worker = ?e.worker,
                    reason = e.reason.as_deref().unwrap_or(""),
                    "[{kind}] agent={agent}"
                );
            }
            EventKind::AgentRegistered
            | EventKind::AgentStarting
            | EventKind::AgentStopping
            | EventKind::MessageDropped => {
                info!(seq = e.seq, index = ?e.index, "[{kind}] agent={agent}");
            }
            EventKind::ShutdownRequested
            | EventKind::AllStopped
            | EventKind::SchedulerStarted
            | EventKind::SchedulerStopping => {
                info!(seq = e.seq, reason = ?e.reason, "[{kind}]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
