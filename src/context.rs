use std::time::{Duration, Instant};

use crate::error::Error;
use crate::limits::DEFAULT_OP_TIMEOUT;
use crate::model::UserId;

/// Per-call context: the request deadline plus whatever identity the
/// session layer established. Threaded explicitly through every operation;
/// there is no process-wide equivalent.
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    deadline: Instant,
    user_id: Option<UserId>,
}

impl Ctx {
    /// Fresh context with the default storage deadline.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_OP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            user_id: None,
        }
    }

    /// Attach the authenticated user id the session layer resolved.
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Time left before the deadline, `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        (now < self.deadline).then(|| self.deadline - now)
    }

    /// Remaining budget, or `Timeout` once the deadline has passed.
    /// Storage backends call this before and between blocking stages.
    pub fn budget(&self) -> Result<Duration, Error> {
        self.remaining().ok_or(Error::Timeout)
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Self::new()
    }
}
