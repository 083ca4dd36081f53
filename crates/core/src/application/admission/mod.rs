//! Admission Queue - bounded concurrency with paced starts
//!
//! Admits submitted jobs in FIFO order while fewer than `ceiling` are
//! running. After a job completes, if others are still waiting, the next
//! admission pass is held back by `start_delay` so fast-finishing jobs cannot
//! burst past the rate limits of the services they call.
//!
//! Admission passes run on well-defined triggers (submit, completion, end of
//! a start delay, ceiling change). The pop-and-count step of every pass runs
//! under one mutex, so concurrent triggers never admit beyond the ceiling.

mod handle;
mod panic_guard;


pub use handle::JobHandle;

use crate::domain::queue::validate_ceiling;
use crate::domain::{
    JobError, JobLabel, JobOutcome, QueueConfig, QueueError, QueueStatus, Ticket,
};
use crate::port::{QueueEvent, QueueObserver, TracingObserver};
use futures::future::BoxFuture;
use futures::FutureExt;
use panic_guard::{catch_job_panic, panic_message};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{trace, warn};

/// Erased job body: runs the operation and hands back how to deliver its result
type Launch = Box<dyn FnOnce() -> BoxFuture<'static, Completion> + Send>;

struct Completion {
    outcome: JobOutcome,
    deliver: Box<dyn FnOnce() + Send>,
}

struct WaitingJob {
    ticket: Ticket,
    label: JobLabel,
    launch: Launch,
}

struct QueueState {
    waiting: VecDeque<WaitingJob>,
    running: usize,
    ceiling: usize,
}

impl QueueState {
    fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            running: self.running,
            queued: self.waiting.len(),
            ceiling: self.ceiling,
        }
    }
}

struct Inner {
    state: Mutex<QueueState>,
    start_delay: Duration,
    next_ticket: AtomicU64,
    observer: Arc<dyn QueueObserver>,
}

impl Inner {
    // Critical sections never panic, so a poisoned lock still holds
    // consistent counters.
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an event; a panicking observer is logged and otherwise ignored
    fn notify(&self, event: QueueEvent) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.observer.on_event(&event))) {
            warn!(
                event = ?event,
                panic = %panic_message(payload.as_ref()),
                "Queue observer panicked"
            );
        }
    }
}

/// What caused an admission pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Submitted,
    Completed,
    DelayElapsed,
    CeilingChanged,
}

/// Shared handle to one admission queue
///
/// Cloning is cheap and every clone drives the same queue. Methods that may
/// admit jobs (`submit`, `update_concurrency`) spawn the admitted work onto
/// the current Tokio runtime.
#[derive(Clone)]
pub struct AdmissionQueue {
    inner: Arc<Inner>,
}

impl AdmissionQueue {
    /// Create a queue that logs transitions through `tracing`
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a queue reporting transitions to `observer`
    pub fn with_observer(
        config: QueueConfig,
        observer: Arc<dyn QueueObserver>,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    waiting: VecDeque::new(),
                    running: 0,
                    ceiling: config.max_concurrent,
                }),
                start_delay: config.start_delay,
                next_ticket: AtomicU64::new(1),
                observer,
            }),
        })
    }

    /// Queue `operation` for execution and return a handle to its result
    ///
    /// `label` is for logs only. `operation` is not called until the job is
    /// admitted. Its error, if any, reaches the handle as
    /// [`JobError::Failed`] without modification.
    pub fn submit<F, Fut, T, E>(&self, label: impl Into<JobLabel>, operation: F) -> JobHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let label = label.into();
        let ticket = Ticket::new(self.inner.next_ticket.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();

        let launch: Launch = Box::new(move || {
            async move {
                let guarded = catch_job_panic(async move { operation().await });
                let (outcome, result) = match guarded.await {
                    Ok(Ok(value)) => (JobOutcome::Succeeded, Ok(value)),
                    Ok(Err(e)) => (JobOutcome::Failed, Err(JobError::Failed(e))),
                    Err(message) => (JobOutcome::Panicked, Err(JobError::Panicked(message))),
                };
                Completion {
                    outcome,
                    deliver: Box::new(move || {
                        // Submitter may have dropped its handle.
                        let _ = tx.send(result);
                    }),
                }
            }
            .boxed()
        });

        let status = {
            let mut state = self.inner.lock_state();
            state.waiting.push_back(WaitingJob {
                ticket,
                label: label.clone(),
                launch,
            });
            state.snapshot()
        };

        self.inner.notify(QueueEvent::Enqueued {
            ticket,
            label,
            status,
        });
        self.admit(Trigger::Submitted);

        JobHandle::new(ticket, rx)
    }

    /// Replace the concurrency ceiling
    ///
    /// Raising it admits waiting jobs right away, all together. Lowering it
    /// never interrupts running jobs; `running` may exceed the new ceiling
    /// until enough of them finish.
    pub fn update_concurrency(&self, new_ceiling: usize) -> Result<(), QueueError> {
        validate_ceiling(new_ceiling)?;

        let (previous, status) = {
            let mut state = self.inner.lock_state();
            let previous = state.ceiling;
            state.ceiling = new_ceiling;
            (previous, state.snapshot())
        };

        self.inner
            .notify(QueueEvent::CeilingChanged { previous, status });
        self.admit(Trigger::CeilingChanged);
        Ok(())
    }

    /// Withdraw a job that has not been admitted yet
    ///
    /// Returns `false` if the ticket is running, finished or unknown; running
    /// jobs are never interrupted. A withdrawn job's handle resolves to
    /// [`JobError::Cancelled`].
    pub fn cancel(&self, ticket: Ticket) -> bool {
        let removed = {
            let mut state = self.inner.lock_state();
            let job = state
                .waiting
                .iter()
                .position(|job| job.ticket == ticket)
                .and_then(|index| state.waiting.remove(index));
            job.map(|job| (job, state.snapshot()))
        };

        let Some((job, status)) = removed else {
            return false;
        };

        let WaitingJob {
            ticket,
            label,
            launch,
        } = job;
        // Dropping the launch closure drops the result sender, which the
        // handle reads as a cancellation.
        drop(launch);
        self.inner.notify(QueueEvent::Cancelled {
            ticket,
            label,
            status,
        });
        true
    }

    /// Withdraw every still-waiting job among `tickets`, returning how many
    pub fn cancel_many<I>(&self, tickets: I) -> usize
    where
        I: IntoIterator<Item = Ticket>,
    {
        tickets
            .into_iter()
            .filter(|ticket| self.cancel(*ticket))
            .count()
    }

    pub fn status(&self) -> QueueStatus {
        self.inner.lock_state().snapshot()
    }

    pub fn start_delay(&self) -> Duration {
        self.inner.start_delay
    }

    /// Admit waiting jobs while capacity allows
    fn admit(&self, trigger: Trigger) {
        let admitted: Vec<(WaitingJob, QueueStatus)> = {
            let mut state = self.inner.lock_state();
            let mut admitted = Vec::new();
            while state.running < state.ceiling {
                let Some(job) = state.waiting.pop_front() else {
                    break;
                };
                state.running += 1;
                let status = state.snapshot();
                admitted.push((job, status));
            }
            admitted
        };

        if admitted.is_empty() {
            trace!(trigger = ?trigger, "Admission pass admitted nothing");
            return;
        }

        // Every admitted slot is owned by a spawned task before anyone is
        // told about it.
        let events: Vec<QueueEvent> = admitted
            .into_iter()
            .map(|(job, status)| {
                let event = QueueEvent::Admitted {
                    ticket: job.ticket,
                    label: job.label.clone(),
                    status,
                };
                tokio::spawn(self.clone().run_admitted(job));
                event
            })
            .collect();

        for event in events {
            self.inner.notify(event);
        }
    }

    async fn run_admitted(self, job: WaitingJob) {
        let WaitingJob {
            ticket,
            label,
            launch,
        } = job;

        let completion = launch().await;

        let (status, more_waiting) = {
            let mut state = self.inner.lock_state();
            state.running = state.running.saturating_sub(1);
            (state.snapshot(), !state.waiting.is_empty())
        };

        (completion.deliver)();
        self.inner.notify(QueueEvent::Completed {
            ticket,
            label,
            outcome: completion.outcome,
            status,
        });

        if more_waiting && !self.inner.start_delay.is_zero() {
            tokio::time::sleep(self.inner.start_delay).await;
            self.admit(Trigger::DelayElapsed);
        } else {
            self.admit(Trigger::Completed);
        }
    }
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("status", &self.status())
            .field("start_delay", &self.inner.start_delay)
            .finish()
    }
}
