//! Caller-supplied deadline and cancellation for one `generate` call.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a call stopped before completing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// The deadline elapsed.
    DeadlineExceeded,
    /// The caller cancelled.
    Canceled,
}

/// Deadline and cancellation signal propagated through a call.
///
/// A context without a deadline never times out on its own; a context whose
/// token is never cancelled is only bounded by its deadline. Cancellation
/// takes precedence when both have fired.
///
/// ```
/// use std::time::Duration;
/// use genbox_plugins::CallContext;
///
/// let context = CallContext::new().with_timeout(Duration::from_secs(5));
/// assert!(context.deadline().is_some());
/// assert_eq!(context.interruption(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context with no deadline and a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline `timeout` from now. A timeout too large to
    /// represent leaves the context unchanged.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// The cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A child context whose deadline is the earlier of this context's and
    /// `timeout` from now. Its token is a child of this context's token:
    /// cancelling the caller cancels it, cancelling it leaves the caller
    /// untouched.
    #[must_use]
    pub fn tightened(&self, timeout: Duration) -> Self {
        let local = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, local) {
            (Some(outer), Some(inner)) => Some(outer.min(inner)),
            (outer, inner) => outer.or(inner),
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline,
        }
    }

    /// The interruption that has already happened, if any.
    #[must_use]
    pub fn interruption(&self) -> Option<Interrupt> {
        if self.cancel.is_cancelled() {
            Some(Interrupt::Canceled)
        } else if self
            .deadline
            .is_some_and(|deadline| deadline <= Instant::now())
        {
            Some(Interrupt::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Completes when the call is cancelled or its deadline elapses.
    ///
    /// Never completes for a context with neither.
    pub async fn interrupted(&self) -> Interrupt {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.cancel.cancelled() => Interrupt::Canceled,
                () = tokio::time::sleep_until(deadline) => Interrupt::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                Interrupt::Canceled
            }
        }
    }
}
