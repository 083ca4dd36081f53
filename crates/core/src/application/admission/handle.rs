// Job Handle - the submitter's side of a queued job

use crate::domain::{JobError, Ticket};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves once the submitted operation completes
///
/// Dropping the handle does not cancel the job: it still runs when admitted
/// and its result is discarded. Use [`AdmissionQueue::cancel`] with
/// [`JobHandle::ticket`] to withdraw a job that is still waiting.
///
/// [`AdmissionQueue::cancel`]: super::AdmissionQueue::cancel
#[must_use = "a job handle does nothing unless awaited"]
pub struct JobHandle<T, E> {
    ticket: Ticket,
    rx: oneshot::Receiver<Result<T, JobError<E>>>,
}

impl<T, E> JobHandle<T, E> {
    pub(crate) fn new(ticket: Ticket, rx: oneshot::Receiver<Result<T, JobError<E>>>) -> Self {
        Self { ticket, rx }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

// No field is structurally pinned.
impl<T, E> Unpin for JobHandle<T, E> {}

impl<T, E> Future for JobHandle<T, E> {
    type Output = Result<T, JobError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The sender only disappears without sending when the waiting
            // entry was removed by a cancellation.
            Poll::Ready(Err(_)) => Poll::Ready(Err(JobError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> std::fmt::Debug for JobHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("ticket", &self.ticket)
            .finish()
    }
}
