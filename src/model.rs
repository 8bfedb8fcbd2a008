use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type RoomId = i64;
pub type ReservationId = i64;
pub type RestrictionId = i64;
pub type UserId = i64;

/// Half-open date range `[start, end)` — `end` is the checkout day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "DateSpan start must be before end");
        Self { start, end }
    }

    /// One-day span `[day, day + 1)`, the shape of an owner block.
    /// `None` only at the calendar's end of time.
    pub fn one_night(day: NaiveDate) -> Option<Self> {
        day.succ_opt().map(|next| Self { start: day, end: next })
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Strict overlap — the booking-availability predicate. A range ending
    /// exactly where another begins does not overlap; back-to-back stays
    /// are legal.
    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Calendar-window predicate, inclusive on the upper side: a range
    /// starting exactly on `self.end` still counts.
    /// [`RoomLedger::in_window`] filters with this; availability checks
    /// never do.
    pub fn touches(&self, other: &DateSpan) -> bool {
        self.start < other.end && self.end >= other.start
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// What put a restriction on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionKind {
    /// Created together with a reservation; removed together with it.
    GuestBooking { reservation_id: ReservationId },
    /// Staff marked the room unavailable with no guest attached.
    OwnerBlock,
}

/// A single entry in the restriction ledger — the source of truth for
/// "is this room occupied on day D". Reservations are never consulted
/// directly for availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub id: RestrictionId,
    pub room_id: RoomId,
    pub span: DateSpan,
    pub kind: RestrictionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Restriction {
    pub fn is_owner_block(&self) -> bool {
        matches!(self.kind, RestrictionKind::OwnerBlock)
    }

    /// The owning reservation, when there is one. Deletion safety and
    /// display labeling both branch on this.
    pub fn reservation_id(&self) -> Option<ReservationId> {
        match self.kind {
            RestrictionKind::GuestBooking { reservation_id } => Some(reservation_id),
            RestrictionKind::OwnerBlock => None,
        }
    }
}

/// Contact fields of a reservation — the only part that stays mutable
/// after booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub guest: Guest,
    pub span: DateSpan,
    /// Triage flag: false = new, true = processed. Not a one-way gate.
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub access_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One room's slice of the restriction ledger.
#[derive(Debug, Clone)]
pub struct RoomLedger {
    pub room: Room,
    /// All restrictions (guest bookings + owner blocks), sorted by `span.start`.
    pub restrictions: Vec<Restriction>,
}

impl RoomLedger {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            restrictions: Vec::new(),
        }
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert(&mut self, restriction: Restriction) {
        let pos = self
            .restrictions
            .binary_search_by_key(&restriction.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.restrictions.insert(pos, restriction);
    }

    /// Remove by id.
    pub fn remove(&mut self, id: RestrictionId) -> Option<Restriction> {
        if let Some(pos) = self.restrictions.iter().position(|r| r.id == id) {
            Some(self.restrictions.remove(pos))
        } else {
            None
        }
    }

    /// Restrictions whose span strictly overlaps the query — the
    /// availability predicate. Binary search skips everything starting at
    /// or after `query.end`.
    pub fn overlapping(&self, query: &DateSpan) -> impl Iterator<Item = &Restriction> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .restrictions
            .partition_point(|r| r.span.start < query.end);
        self.restrictions[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    /// Restrictions visible in a calendar window — the inclusive-upper
    /// predicate. A restriction starting exactly on `window.end` is still
    /// returned; one ending exactly on `window.start` is not.
    pub fn in_window(&self, window: &DateSpan) -> impl Iterator<Item = &Restriction> {
        // The prefix already satisfies the upper conjunct of `touches`.
        let right_bound = self
            .restrictions
            .partition_point(|r| r.span.start <= window.end);
        self.restrictions[..right_bound]
            .iter()
            .filter(move |r| window.touches(&r.span))
    }

    /// The restriction a reservation owns, if still on the ledger.
    pub fn guest_restriction(&self, reservation_id: ReservationId) -> Option<&Restriction> {
        self.restrictions
            .iter()
            .find(|r| r.reservation_id() == Some(reservation_id))
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
/// Events carry timestamps so created_at/updated_at survive replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomAdded {
        id: RoomId,
        name: String,
        at: DateTime<Utc>,
    },
    UserAdded {
        id: UserId,
        first_name: String,
        last_name: String,
        email: String,
        password_hash: String,
        access_level: i32,
        at: DateTime<Utc>,
    },
    /// Reservation plus its owning restriction, committed as one unit.
    ReservationBooked {
        reservation_id: ReservationId,
        restriction_id: RestrictionId,
        room_id: RoomId,
        guest: Guest,
        span: DateSpan,
        at: DateTime<Utc>,
    },
    ContactUpdated {
        reservation_id: ReservationId,
        guest: Guest,
        at: DateTime<Utc>,
    },
    ProcessedSet {
        reservation_id: ReservationId,
        processed: bool,
        at: DateTime<Utc>,
    },
    /// Aggregate delete: reservation and restriction leave together.
    ReservationDeleted {
        reservation_id: ReservationId,
        restriction_id: RestrictionId,
        room_id: RoomId,
    },
    BlockPlaced {
        restriction_id: RestrictionId,
        room_id: RoomId,
        span: DateSpan,
        at: DateTime<Utc>,
    },
    BlockRemoved {
        restriction_id: RestrictionId,
        room_id: RoomId,
    },
}

// ── Engine input and projection types ────────────────────────────

/// What the booking form hands the engine once the presentation layer has
/// parsed the dates.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub room_id: RoomId,
    pub guest: Guest,
    pub span: DateSpan,
}

/// Reservation joined with its room name, the shape the admin listings
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRecord {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub room_name: String,
    pub guest: Guest,
    pub span: DateSpan,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
