//! Cancellation context supplied by callers of [`RateLimiter::wait`].
//!
//! A `Context` carries any number of cancel signals and an optional deadline.
//! Child contexts inherit every signal of their parent, so cancelling a parent
//! cancels all contexts derived from it, while cancelling a child leaves the
//! parent untouched.
//!
//! [`RateLimiter::wait`]: crate::ratelimit::RateLimiter::wait

use std::future::pending;
use std::time::Duration;

use futures::future::select_all;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::error::{LimiterError, Result};

/// Cancellation signal and deadline for a single logical request.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Cancel signals inherited from every ancestor plus our own
    signals: Vec<watch::Receiver<bool>>,
    /// Point in time after which waits fail with `DeadlineExceeded`
    deadline: Option<Instant>,
}

/// Handle that cancels the context returned alongside it by [`Context::with_cancel`].
///
/// Dropping the handle does not cancel anything.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel the associated context and every context derived from it.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child context that can be cancelled independently.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        let mut child = self.clone();
        child.signals.push(receiver);
        (child, CancelHandle { sender })
    }

    /// Derive a child context that expires `timeout` from now.
    ///
    /// If the parent already has an earlier deadline, that one is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Derive a child context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        child
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether any cancel signal in this context has fired.
    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|signal| *signal.borrow())
    }

    /// Report an already-fired signal without waiting.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(LimiterError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a background context.
    pub async fn done(&self) -> LimiterError {
        let cancelled = async {
            if self.signals.is_empty() {
                return pending::<()>().await;
            }

            let fired = self.signals.iter().cloned().map(|mut signal| {
                Box::pin(async move {
                    let closed = signal.wait_for(|cancelled| *cancelled).await.is_err();
                    if closed {
                        // Handle dropped without cancelling
                        pending::<()>().await;
                    }
                })
            });
            select_all(fired).await;
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => LimiterError::Cancelled,
                _ = sleep_until(deadline) => LimiterError::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                LimiterError::Cancelled
            }
        }
    }
}
