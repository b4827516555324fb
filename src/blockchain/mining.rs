use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of hash attempts between two budget checks
pub const CHECK_INTERVAL: u64 = 256;

/// Shared flag used to abandon a running proof-of-work search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a search stopped before finding a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    TimedOut,
}

/// Limits placed on a single proof-of-work search
#[derive(Debug, Clone, Default)]
pub struct MiningBudget {
    token: CancelToken,
    deadline: Option<Instant>,
}

impl MiningBudget {
    /// A budget that only stops on cancellation
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A budget that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancelToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Builds a budget from an optional timeout
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self::with_timeout(timeout),
            None => Self::unbounded(),
        }
    }

    /// The token that cancels this budget
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Returns the reason to stop, if any
    pub fn check(&self) -> Option<Interruption> {
        if self.token.is_cancelled() {
            return Some(Interruption::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interruption::TimedOut),
            _ => None,
        }
    }
}
