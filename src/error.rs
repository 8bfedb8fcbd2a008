use thiserror::Error;

use crate::forms::FieldErrors;
use crate::model::{DateSpan, ReservationId, RestrictionId, RoomId};

#[derive(Error, Debug)]
pub enum Error {
    /// Bad caller input, reported per field. Never reaches storage.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    #[error("restriction not found: {0}")]
    RestrictionNotFound(RestrictionId),

    /// Carries the email or id the lookup was keyed on.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Another writer committed an overlapping restriction first. Routine
    /// under concurrency; the caller re-searches.
    #[error("room {room_id} is taken for {requested}, held by {held}")]
    Conflict {
        room_id: RoomId,
        requested: DateSpan,
        held: DateSpan,
    },

    /// A live reservation still owns this restriction; deleting the
    /// reservation removes both.
    #[error("restriction {restriction_id} belongs to reservation {reservation_id}")]
    RestrictionInUse {
        restriction_id: RestrictionId,
        reservation_id: ReservationId,
    },

    /// Password mismatch. Routine, and never a storage incident.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("storage deadline elapsed")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Faults of the store itself rather than of the request.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Timeout | Error::Storage(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::RoomNotFound(_)
                | Error::ReservationNotFound(_)
                | Error::RestrictionNotFound(_)
                | Error::UserNotFound(_)
        )
    }
}
