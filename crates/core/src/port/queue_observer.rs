// Queue Observer Port
// Hook for admission queue state transitions (logging, metrics, tests)

use crate::domain::{JobLabel, JobOutcome, QueueStatus, Ticket};
use tracing::{debug, info, warn};

/// A single queue transition with the counters captured at that moment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Enqueued {
        ticket: Ticket,
        label: JobLabel,
        status: QueueStatus,
    },
    Admitted {
        ticket: Ticket,
        label: JobLabel,
        status: QueueStatus,
    },
    Completed {
        ticket: Ticket,
        label: JobLabel,
        outcome: JobOutcome,
        status: QueueStatus,
    },
    Cancelled {
        ticket: Ticket,
        label: JobLabel,
        status: QueueStatus,
    },
    CeilingChanged {
        previous: usize,
        status: QueueStatus,
    },
}

impl QueueEvent {
    pub fn status(&self) -> QueueStatus {
        match self {
            QueueEvent::Enqueued { status, .. }
            | QueueEvent::Admitted { status, .. }
            | QueueEvent::Completed { status, .. }
            | QueueEvent::Cancelled { status, .. }
            | QueueEvent::CeilingChanged { status, .. } => *status,
        }
    }
}

/// Receives queue events
///
/// Called outside the queue's critical section after the transition has taken
/// effect, possibly from several tasks at once. Events for different jobs may
/// arrive out of order, and a short job's `Completed` can precede its own
/// `Admitted`. A panic in `on_event` is caught and logged by the queue.
pub trait QueueObserver: Send + Sync {
    fn on_event(&self, event: &QueueEvent);
}

/// Default observer: structured log line per transition
pub struct TracingObserver;

impl QueueObserver for TracingObserver {
    fn on_event(&self, event: &QueueEvent) {
        match event {
            QueueEvent::Enqueued {
                ticket,
                label,
                status,
            } => debug!(
                ticket = %ticket,
                label = %label,
                running = status.running,
                queued = status.queued,
                "Job enqueued"
            ),
            QueueEvent::Admitted {
                ticket,
                label,
                status,
            } => info!(
                ticket = %ticket,
                label = %label,
                running = status.running,
                ceiling = status.ceiling,
                queued = status.queued,
                "Job admitted"
            ),
            QueueEvent::Completed {
                ticket,
                label,
                outcome: JobOutcome::Panicked,
                status,
            } => warn!(
                ticket = %ticket,
                label = %label,
                running = status.running,
                queued = status.queued,
                "Job panicked"
            ),
            QueueEvent::Completed {
                ticket,
                label,
                outcome,
                status,
            } => info!(
                ticket = %ticket,
                label = %label,
                outcome = %outcome,
                running = status.running,
                ceiling = status.ceiling,
                queued = status.queued,
                "Job completed"
            ),
            QueueEvent::Cancelled {
                ticket,
                label,
                status,
            } => info!(
                ticket = %ticket,
                label = %label,
                queued = status.queued,
                "Job cancelled"
            ),
            QueueEvent::CeilingChanged { previous, status } => info!(
                previous = previous,
                ceiling = status.ceiling,
                running = status.running,
                queued = status.queued,
                "Concurrency ceiling updated"
            ),
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every event in arrival order
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<QueueEvent>>,
    }

    impl RecordingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<QueueEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Tickets in the order they were admitted
        pub fn admitted(&self) -> Vec<Ticket> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    QueueEvent::Admitted { ticket, .. } => Some(ticket),
                    _ => None,
                })
                .collect()
        }
    }

    impl QueueObserver for RecordingObserver {
        fn on_event(&self, event: &QueueEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
