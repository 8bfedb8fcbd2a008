mod availability;
mod bookings;
mod queries;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::context::Ctx;
use crate::notify::Outbox;
use crate::store::Repository;

/// Service façade over the repository: availability queries, the
/// reservation lifecycle, owner blocks, and the authentication check.
/// Talks only to `Arc<dyn Repository>` and the notification outbox, so a
/// different storage backend slots in behind the same trait.
pub struct FrontDesk {
    repo: Arc<dyn Repository>,
    outbox: Outbox,
    /// Owner notification address. No address, no owner notices.
    owner_email: Option<String>,
}

impl FrontDesk {
    pub fn new(repo: Arc<dyn Repository>, outbox: Outbox) -> Self {
        Self {
            repo,
            outbox,
            owner_email: None,
        }
    }

    pub fn with_owner_email(mut self, email: impl Into<String>) -> Self {
        self.owner_email = Some(email.into());
        self
    }
}

/// Attribution suffix for admin-mutation log lines.
fn actor(ctx: &Ctx) -> String {
    match ctx.user_id() {
        Some(id) => format!(" by user {id}"),
        None => String::new(),
    }
}
