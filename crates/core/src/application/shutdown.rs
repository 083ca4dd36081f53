// Shutdown Channel for background loops (status reporter, daemon tasks)

use serde::Serialize;
use tokio::sync::watch;

/// Why background loops are being stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    /// Every run of the batch has settled
    BatchFinished,
    /// The operator interrupted the daemon
    Interrupted,
    /// The sender went away without signalling
    SenderDropped,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::BatchFinished => write!(f, "batch_finished"),
            ShutdownReason::Interrupted => write!(f, "interrupted"),
            ShutdownReason::SenderDropped => write!(f, "sender_dropped"),
        }
    }
}

/// Receiving side, cloned into every loop that must stop together
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownToken {
    /// The reason, once shutdown has been requested
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.rx.borrow()
    }

    /// Resolve with the shutdown reason
    ///
    /// Returns at once if shutdown was already requested before the call.
    pub async fn wait(&mut self) -> ShutdownReason {
        match self.rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(ShutdownReason::SenderDropped),
            Err(_) => ShutdownReason::SenderDropped,
        }
    }
}

pub struct ShutdownSender {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownSender {
    /// Signal every token; the first reason sent wins
    pub fn shutdown(&self, reason: ShutdownReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(None);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
