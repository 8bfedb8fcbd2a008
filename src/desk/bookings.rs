use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::context::Ctx;
use crate::error::Error;
use crate::forms::Form;
use crate::limits::{MAX_FIELD_LEN, MIN_NAME_LEN};
use crate::model::{BookingRequest, Guest, Reservation, ReservationId, RestrictionId, RoomId};
use crate::notify::Notice;

use super::{FrontDesk, actor, availability};

impl FrontDesk {
    /// Book a stay. Field validation runs first and never reaches storage;
    /// the availability re-check and the insert happen as one unit inside
    /// the store, so a lost race comes back as `Conflict` with the held
    /// span. On success the guest gets a confirmation notice and, when an
    /// owner address is configured, the owner gets a notification.
    pub async fn make_reservation(
        &self,
        ctx: &Ctx,
        req: BookingRequest,
    ) -> Result<ReservationId, Error> {
        availability::validate_span(&req.span)?;
        validate_guest(&req.guest)?;
        let room = self.repo.room(ctx, req.room_id).await?;

        let room_id = req.room_id;
        let span = req.span;
        match self.repo.book(ctx, &req).await {
            Ok(id) => {
                metrics::counter!(crate::observability::BOOKINGS_TOTAL).increment(1);
                let room_name = &room.name;
                info!("reservation {id}: {room_name} booked for {span}");

                self.outbox.send(Notice {
                    to: req.guest.email.clone(),
                    subject: "Reservation Confirmation".into(),
                    body: format!(
                        "Dear {}, <br> This confirms your reservation of {} from {} to {}.",
                        req.guest.first_name, room.name, span.start, span.end
                    ),
                    template: Some("reservation-confirmation.html".into()),
                });
                if let Some(owner) = &self.owner_email {
                    self.outbox.send(Notice {
                        to: owner.clone(),
                        subject: "Reservation Notification".into(),
                        body: format!(
                            "A reservation has been made for {} from {} to {}.",
                            room.name, span.start, span.end
                        ),
                        template: None,
                    });
                }
                Ok(id)
            }
            Err(e @ Error::Conflict { .. }) => {
                metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                debug!("booking refused for room {room_id}: {e}");
                Err(e)
            }
            Err(e) => {
                if e.is_storage() {
                    error!("booking for room {room_id} failed: {e}");
                }
                Err(e)
            }
        }
    }

    /// Flip the triage flag. Returns whether the stored value changed;
    /// repeats of the same action are no-ops and stay silent. On a real
    /// change the guest is notified of the new state.
    pub async fn set_processed(
        &self,
        ctx: &Ctx,
        id: ReservationId,
        processed: bool,
    ) -> Result<bool, Error> {
        let changed = self.repo.set_processed(ctx, id, processed).await?;
        if !changed {
            return Ok(false);
        }

        let actor = actor(ctx);
        info!("reservation {id} processed={processed}{actor}");
        match self.repo.reservation(ctx, id).await {
            Ok(record) => {
                let state = if processed {
                    "has been processed by our staff"
                } else {
                    "is back under review"
                };
                self.outbox.send(Notice {
                    to: record.guest.email,
                    subject: "Reservation Update".into(),
                    body: format!(
                        "Dear {}, <br> Your reservation of {} from {} to {} {state}.",
                        record.guest.first_name,
                        record.room_name,
                        record.span.start,
                        record.span.end
                    ),
                    template: None,
                });
            }
            // The flag change itself committed; only the notice is lost.
            Err(e) => warn!("update notice for reservation {id} skipped: {e}"),
        }
        Ok(true)
    }

    /// Correct the guest's contact fields. Dates and room are immutable
    /// once booked; changing them means delete and rebook.
    pub async fn update_contact(
        &self,
        ctx: &Ctx,
        id: ReservationId,
        guest: Guest,
    ) -> Result<(), Error> {
        validate_guest(&guest)?;
        self.repo.update_contact(ctx, id, &guest).await?;
        let actor = actor(ctx);
        info!("reservation {id} contact updated{actor}");
        Ok(())
    }

    /// Aggregate delete: the reservation and its owning restriction leave
    /// together, and the dates open up again. Returns the removed
    /// reservation for display.
    pub async fn delete_reservation(
        &self,
        ctx: &Ctx,
        id: ReservationId,
    ) -> Result<Reservation, Error> {
        let removed = self.repo.delete_reservation(ctx, id).await?;
        metrics::counter!(crate::observability::RESERVATIONS_DELETED_TOTAL).increment(1);
        let actor = actor(ctx);
        let room_id = removed.room_id;
        let span = removed.span;
        info!("reservation {id} deleted{actor}, room {room_id} freed for {span}");
        Ok(removed)
    }

    /// One-day owner block on `day`. No overlap check: the owner may block
    /// an already-restricted day, which over-counts but never corrupts.
    pub async fn place_block(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        day: NaiveDate,
    ) -> Result<RestrictionId, Error> {
        availability::validate_day(day)?;
        let block_id = self.repo.place_block(ctx, room_id, day).await?;
        let actor = actor(ctx);
        info!("room {room_id} blocked on {day}{actor}");
        Ok(block_id)
    }

    /// Lift an owner block. A restriction owned by a live reservation is
    /// refused with `RestrictionInUse`; delete the reservation instead.
    pub async fn remove_block(&self, ctx: &Ctx, restriction_id: RestrictionId) -> Result<(), Error> {
        self.repo.remove_block(ctx, restriction_id).await?;
        let actor = actor(ctx);
        info!("block {restriction_id} removed{actor}");
        Ok(())
    }
}

/// Form rules for guest contact fields, shared by booking and contact
/// updates. Mirrors what the booking form enforces client-side.
fn validate_guest(guest: &Guest) -> Result<(), Error> {
    let mut form = Form::new([
        ("first_name", guest.first_name.as_str()),
        ("last_name", guest.last_name.as_str()),
        ("email", guest.email.as_str()),
        ("phone", guest.phone.as_str()),
    ]);
    form.required(&["first_name", "last_name", "email", "phone"]);
    form.min_length("first_name", MIN_NAME_LEN);
    form.min_length("last_name", MIN_NAME_LEN);
    form.is_email("email");
    for field in ["first_name", "last_name", "email", "phone"] {
        form.max_length(field, MAX_FIELD_LEN);
    }
    if form.valid() {
        Ok(())
    } else {
        Err(Error::Validation(form.into_errors()))
    }
}
