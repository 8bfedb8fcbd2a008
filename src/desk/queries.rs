use tracing::{debug, error, info};

use crate::context::Ctx;
use crate::error::Error;
use crate::model::{
    DateSpan, ReservationId, ReservationRecord, Restriction, Room, RoomId, User, UserId,
};

use super::{FrontDesk, availability};

impl FrontDesk {
    /// Room catalog ordered by name for admin listings.
    pub async fn rooms(&self, ctx: &Ctx) -> Result<Vec<Room>, Error> {
        self.repo.rooms(ctx).await
    }

    pub async fn room(&self, ctx: &Ctx, id: RoomId) -> Result<Room, Error> {
        self.repo.room(ctx, id).await
    }

    pub async fn reservation(&self, ctx: &Ctx, id: ReservationId) -> Result<ReservationRecord, Error> {
        self.repo.reservation(ctx, id).await
    }

    /// Every reservation, earliest arrival first.
    pub async fn all_reservations(&self, ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error> {
        self.repo.reservations(ctx).await
    }

    /// Unprocessed reservations only, same order — the triage queue.
    pub async fn new_reservations(&self, ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error> {
        self.repo.new_reservations(ctx).await
    }

    /// Restrictions visible in a calendar window. Uses the inclusive-upper
    /// predicate, so an entry starting on the window's last day still shows;
    /// availability checks never use this query.
    pub async fn room_calendar(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        window: DateSpan,
    ) -> Result<Vec<Restriction>, Error> {
        availability::validate_window(&window)?;
        self.repo.restrictions_for_room(ctx, room_id, window).await
    }

    /// Session-rehydration lookup for the auth layer.
    pub async fn user(&self, ctx: &Ctx, id: UserId) -> Result<User, Error> {
        self.repo.user(ctx, id).await
    }

    /// Credential check. A wrong password is routine (`AuthenticationFailed`,
    /// logged at debug); a malformed stored hash or any other storage fault
    /// is an incident.
    pub async fn authenticate(&self, ctx: &Ctx, email: &str, password: &str) -> Result<UserId, Error> {
        match self.repo.authenticate(ctx, email, password).await {
            Ok(user_id) => {
                info!("user {user_id} authenticated");
                Ok(user_id)
            }
            Err(Error::AuthenticationFailed) => {
                metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
                debug!("login refused for {email}: wrong password");
                Err(Error::AuthenticationFailed)
            }
            Err(e) => {
                if e.is_storage() {
                    error!("authentication check for {email} failed: {e}");
                } else {
                    debug!("login refused for {email}: {e}");
                }
                Err(e)
            }
        }
    }
}
