// ── Snapshot consumers ──
//
// Presentation layers receive poll results through `RouteSink`. The
// `watch` channel implementation backs `Matrix::subscribe()`.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::CoreError;
use crate::model::RoutingSnapshot;

/// Latest poll outcome as seen by consumers.
#[derive(Debug, Clone, Default)]
pub enum PollStatus {
    /// No cycle has finished yet.
    #[default]
    Pending,
    Ready(Arc<RoutingSnapshot>),
    /// The last cycle failed; carries the rendered cause.
    Unavailable(String),
}

impl PollStatus {
    pub fn snapshot(&self) -> Option<&Arc<RoutingSnapshot>> {
        match self {
            Self::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Receives the outcome of every poll cycle.
pub trait RouteSink: Send + Sync {
    fn publish(&self, snapshot: Arc<RoutingSnapshot>);

    fn update_failed(&self, error: &CoreError);
}

impl RouteSink for watch::Sender<PollStatus> {
    fn publish(&self, snapshot: Arc<RoutingSnapshot>) {
        self.send_replace(PollStatus::Ready(snapshot));
    }

    fn update_failed(&self, error: &CoreError) {
        self.send_replace(PollStatus::Unavailable(error.to_string()));
    }
}
