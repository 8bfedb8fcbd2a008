mod memory;

pub use memory::{LedgerStore, hash_password};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::context::Ctx;
use crate::error::Error;
use crate::model::{
    BookingRequest, DateSpan, Guest, Reservation, ReservationId, ReservationRecord, Restriction,
    RestrictionId, Room, RoomId, User, UserId,
};

/// Capability surface the engine sees: room lookup, reservation and
/// restriction CRUD, availability queries, and the authentication check.
/// Engine code is written against this trait only, so a different backend
/// (or a failure-injecting fake) can stand in for the bundled store.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn room(&self, ctx: &Ctx, id: RoomId) -> Result<Room, Error>;

    /// Whole catalog, ordered by room name (ties by id) for admin listings.
    async fn rooms(&self, ctx: &Ctx) -> Result<Vec<Room>, Error>;

    /// Strict-overlap availability test: true when no restriction on the
    /// room overlaps the span. Back-to-back ranges do not overlap.
    async fn room_available(&self, ctx: &Ctx, room_id: RoomId, span: DateSpan)
    -> Result<bool, Error>;

    /// Complement of the strict predicate across all rooms in one pass.
    /// Result is sorted by room id; that order is incidental.
    async fn available_rooms(&self, ctx: &Ctx, span: DateSpan) -> Result<Vec<Room>, Error>;

    /// Insert a reservation together with its owning restriction as one
    /// unit. Availability is re-checked under the room's write arbitration;
    /// a lost race surfaces as `Conflict`, never as partial state.
    async fn book(&self, ctx: &Ctx, req: &BookingRequest) -> Result<ReservationId, Error>;

    async fn reservation(&self, ctx: &Ctx, id: ReservationId) -> Result<ReservationRecord, Error>;

    /// Every reservation, ascending by start date (ties by id).
    async fn reservations(&self, ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error>;

    /// Unprocessed reservations only, same order.
    async fn new_reservations(&self, ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error>;

    /// Update the triage flag only. Returns whether the stored value
    /// actually changed, so repeats are observably idempotent.
    async fn set_processed(
        &self,
        ctx: &Ctx,
        id: ReservationId,
        processed: bool,
    ) -> Result<bool, Error>;

    /// Contact fields only; dates and room are immutable once booked.
    async fn update_contact(&self, ctx: &Ctx, id: ReservationId, guest: &Guest)
    -> Result<(), Error>;

    /// Aggregate delete: the reservation and its owning restriction leave
    /// together, atomically.
    async fn delete_reservation(&self, ctx: &Ctx, id: ReservationId) -> Result<Reservation, Error>;

    /// One-day owner block on `day`.
    async fn place_block(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        day: NaiveDate,
    ) -> Result<RestrictionId, Error>;

    /// Remove an owner block by id. Refuses a restriction still owned by a
    /// live reservation with `RestrictionInUse`.
    async fn remove_block(&self, ctx: &Ctx, restriction_id: RestrictionId) -> Result<(), Error>;

    /// Calendar window query — the inclusive-upper predicate, not the
    /// strict one. Sorted by span start.
    async fn restrictions_for_room(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        window: DateSpan,
    ) -> Result<Vec<Restriction>, Error>;

    /// Salted-hash comparison. Wrong password → `AuthenticationFailed`;
    /// unknown email → `UserNotFound`; a malformed stored hash is a
    /// storage fault, not a mismatch.
    async fn authenticate(&self, ctx: &Ctx, email: &str, password: &str) -> Result<UserId, Error>;

    async fn user(&self, ctx: &Ctx, id: UserId) -> Result<User, Error>;
}
