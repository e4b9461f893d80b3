//! Cancellation and deadlines for lock operations
//!
//! Every lock operation takes a [`LockContext`]. Waiting happens only at two
//! kinds of suspension points, both routed through the context:
//! - the sleep between polling attempts ([`LockContext::sleep`])
//! - each store round trip ([`LockContext::run`])
//!
//! When the attached [`CancelSignal`] fires or the deadline passes, the
//! pending operation returns [`LockError::Cancelled`] or
//! [`LockError::DeadlineExceeded`] promptly instead of an ownership result.

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{LockError, Result};

/// Cloneable trigger that cancels every context subscribed to it.
#[derive(Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Cancel all subscribed contexts. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call cancellation scope.
#[derive(Clone, Default)]
pub struct LockContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl LockContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    ///
    /// A timeout too large to be represented as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(at) => Self::background().deadline(at),
            None => Self::background(),
        }
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline(deadline)
    }

    /// Set or tighten the deadline. An earlier existing deadline wins.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, signal: &CancelSignal) -> Self {
        self.cancel = Some(signal.subscribe());
        self
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(LockError::Cancelled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(LockError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Sleep for `duration` unless the context ends first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(tokio::time::sleep(duration)).await
    }

    /// Drive `fut` to completion unless the context ends first.
    ///
    /// A future that loses the race is dropped, so a store request in flight
    /// is abandoned rather than awaited.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        self.check()?;

        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            match cancel.as_mut() {
                // A dropped signal can no longer fire.
                Some(rx) => {
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        pending::<()>().await;
                    }
                }
                None => pending::<()>().await,
            }
        };

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(LockError::Cancelled),
            _ = expired => Err(LockError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
