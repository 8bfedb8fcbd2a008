use chrono::{Datelike, NaiveDate};

use crate::context::Ctx;
use crate::error::Error;
use crate::forms::FieldErrors;
use crate::limits::{MAX_STAY_NIGHTS, MAX_VALID_YEAR, MIN_VALID_YEAR};
use crate::model::{DateSpan, Room, RoomId};

use super::FrontDesk;

impl FrontDesk {
    /// True when no restriction on the room strictly overlaps the span.
    /// A stay ending the day another begins does not collide.
    pub async fn room_available(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        span: DateSpan,
    ) -> Result<bool, Error> {
        validate_span(&span)?;
        self.repo.room_available(ctx, room_id, span).await
    }

    /// Every room free for the whole span, in one pass. Result order is by
    /// room id and incidental; display sorting belongs to the caller.
    pub async fn available_rooms(&self, ctx: &Ctx, span: DateSpan) -> Result<Vec<Room>, Error> {
        validate_span(&span)?;
        self.repo.available_rooms(ctx, span).await
    }
}

fn year_in_bounds(day: NaiveDate) -> bool {
    (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&day.year())
}

/// Booking-span rules: ordered, years in bounds, stay no longer than the cap.
pub(super) fn validate_span(span: &DateSpan) -> Result<(), Error> {
    let mut errors = FieldErrors::default();
    if !year_in_bounds(span.start) {
        errors.add("start_date", "Date is outside the supported calendar");
    }
    if !year_in_bounds(span.end) {
        errors.add("end_date", "Date is outside the supported calendar");
    }
    if span.start >= span.end {
        errors.add("end_date", "End date must be after the start date");
    } else if span.nights() > MAX_STAY_NIGHTS {
        errors.add("end_date", "Stay is longer than the supported maximum");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

/// Calendar-window rules: ordered and in bounds. No stay cap — a year-long
/// display window is legitimate.
pub(super) fn validate_window(window: &DateSpan) -> Result<(), Error> {
    let mut errors = FieldErrors::default();
    if !year_in_bounds(window.start) {
        errors.add("start_date", "Date is outside the supported calendar");
    }
    if !year_in_bounds(window.end) {
        errors.add("end_date", "Date is outside the supported calendar");
    }
    if window.start >= window.end {
        errors.add("end_date", "End date must be after the start date");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

/// Owner-block rule: the day must sit inside the supported calendar.
pub(super) fn validate_day(day: NaiveDate) -> Result<(), Error> {
    if year_in_bounds(day) {
        return Ok(());
    }
    let mut errors = FieldErrors::default();
    errors.add("date", "Date is outside the supported calendar");
    Err(Error::Validation(errors))
}
