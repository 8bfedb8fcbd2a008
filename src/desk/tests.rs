use super::*;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::model::*;
use crate::notify::Notice;
use crate::store::{LedgerStore, Repository, hash_password};

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("innkeep_test_desk");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn span(start: NaiveDate, end: NaiveDate) -> DateSpan {
    DateSpan::new(start, end)
}

fn guest(first: &str) -> Guest {
    Guest {
        first_name: first.into(),
        last_name: "Lovelace".into(),
        email: format!("{}@example.com", first.to_lowercase()),
        phone: "555-0100".into(),
    }
}

fn booking(room_id: RoomId, first: &str, start: NaiveDate, end: NaiveDate) -> BookingRequest {
    BookingRequest {
        room_id,
        guest: guest(first),
        span: span(start, end),
    }
}

/// Desk + store on a fresh WAL, with the named rooms already added.
async fn front_desk(
    name: &str,
    rooms: &[&str],
) -> (
    FrontDesk,
    Arc<LedgerStore>,
    mpsc::UnboundedReceiver<Notice>,
    Vec<RoomId>,
) {
    let path = test_wal_path(name);
    let store = Arc::new(LedgerStore::open(&path).unwrap());
    let ctx = Ctx::new();
    let mut ids = Vec::new();
    for room in rooms {
        ids.push(store.add_room(&ctx, room).await.unwrap().id);
    }
    let (outbox, rx) = Outbox::channel();
    let desk = FrontDesk::new(store.clone(), outbox);
    (desk, store, rx, ids)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(n) = rx.try_recv() {
        notices.push(n);
    }
    notices
}

// ── Availability scenarios ───────────────────────────────

#[tokio::test]
async fn unrestricted_room_is_available() {
    let (desk, _store, _rx, rooms) = front_desk("avail_empty.wal", &["Generals Quarters"]).await;
    let ctx = Ctx::new();

    let free = desk
        .room_available(&ctx, rooms[0], span(d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();
    assert!(free);
}

#[tokio::test]
async fn overlap_blocks_but_back_to_back_does_not() {
    let (desk, _store, _rx, rooms) = front_desk("avail_strict.wal", &["Generals Quarters"]).await;
    let ctx = Ctx::new();
    desk.make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();

    let overlapping = desk
        .room_available(&ctx, rooms[0], span(d(2024, 6, 3), d(2024, 6, 7)))
        .await
        .unwrap();
    assert!(!overlapping);

    // Checkout day = next check-in day is legal.
    let back_to_back = desk
        .room_available(&ctx, rooms[0], span(d(2024, 6, 5), d(2024, 6, 7)))
        .await
        .unwrap();
    assert!(back_to_back);
}

#[tokio::test]
async fn available_rooms_excludes_only_the_restricted_one() {
    let (desk, _store, _rx, rooms) =
        front_desk("avail_across.wal", &["Room 1", "Room 2", "Room 3"]).await;
    let ctx = Ctx::new();
    desk.make_reservation(&ctx, booking(rooms[1], "Ada", d(2024, 7, 10), d(2024, 7, 14)))
        .await
        .unwrap();

    let free = desk
        .available_rooms(&ctx, span(d(2024, 7, 12), d(2024, 7, 16)))
        .await
        .unwrap();
    let ids: Vec<RoomId> = free.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![rooms[0], rooms[2]]);
}

#[tokio::test]
async fn fully_booked_search_comes_back_empty() {
    let (desk, _store, _rx, rooms) = front_desk("avail_none.wal", &["Room 1", "Room 2"]).await;
    let ctx = Ctx::new();
    for (i, room) in rooms.iter().enumerate() {
        desk.make_reservation(
            &ctx,
            booking(*room, &format!("Guest{i}"), d(2024, 7, 1), d(2024, 7, 5)),
        )
        .await
        .unwrap();
    }

    let free = desk
        .available_rooms(&ctx, span(d(2024, 7, 2), d(2024, 7, 4)))
        .await
        .unwrap();
    assert!(free.is_empty());
}

// ── Booking flow and notices ─────────────────────────────

#[tokio::test]
async fn booking_confirms_guest_and_owner() {
    let (desk, _store, mut rx, rooms) = front_desk("notices.wal", &["Majors Suite"]).await;
    let desk = desk.with_owner_email("owner@fsm.com");
    let ctx = Ctx::new();

    let id = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();
    let record = desk.reservation(&ctx, id).await.unwrap();
    assert_eq!(record.room_name, "Majors Suite");
    assert!(!record.processed);

    let notices = drain(&mut rx);
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].to, "ada@example.com");
    assert_eq!(notices[0].subject, "Reservation Confirmation");
    assert!(notices[0].body.contains("Majors Suite"));
    assert!(notices[0].template.is_some());
    assert_eq!(notices[1].to, "owner@fsm.com");
    assert_eq!(notices[1].subject, "Reservation Notification");
    assert_eq!(notices[1].template, None);
}

#[tokio::test]
async fn no_owner_address_no_owner_notice() {
    let (desk, _store, mut rx, rooms) = front_desk("notices_no_owner.wal", &["Majors Suite"]).await;
    let ctx = Ctx::new();

    desk.make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();

    let notices = drain(&mut rx);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].to, "ada@example.com");
}

#[tokio::test]
async fn booking_unknown_room_fails() {
    let (desk, _store, mut rx, _rooms) = front_desk("unknown_room.wal", &["Room 1"]).await;
    let ctx = Ctx::new();

    let result = desk
        .make_reservation(&ctx, booking(999, "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await;
    assert!(matches!(result, Err(Error::RoomNotFound(999))));
    assert!(drain(&mut rx).is_empty());
}

// ── Validation ───────────────────────────────────────────

#[tokio::test]
async fn blank_guest_fields_rejected() {
    let (desk, _store, mut rx, rooms) = front_desk("blank_fields.wal", &["Room 1"]).await;
    let ctx = Ctx::new();

    let mut req = booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5));
    req.guest.first_name = String::new();
    req.guest.email = "not-an-email".into();

    match desk.make_reservation(&ctx, req).await {
        Err(Error::Validation(errors)) => {
            assert!(errors.get("first_name").is_some());
            assert!(errors.get("email").is_some());
            assert!(errors.get("last_name").is_none());
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    // Nothing was booked, nothing was sent.
    assert!(drain(&mut rx).is_empty());
    assert!(
        desk.room_available(&ctx, rooms[0], span(d(2024, 6, 1), d(2024, 6, 5)))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn reversed_dates_rejected() {
    let (desk, _store, _rx, rooms) = front_desk("reversed_dates.wal", &["Room 1"]).await;
    let ctx = Ctx::new();

    let req = BookingRequest {
        room_id: rooms[0],
        guest: guest("Ada"),
        // Literal on purpose: the reversed pair must reach the validator.
        span: DateSpan {
            start: d(2024, 6, 5),
            end: d(2024, 6, 1),
        },
    };
    let result = desk.make_reservation(&ctx, req).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn contact_update_validates_too() {
    let (desk, _store, _rx, rooms) = front_desk("contact_invalid.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    let id = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();

    let mut fixed = guest("Ada");
    fixed.email = "broken".into();
    let result = desk.update_contact(&ctx, id, fixed).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

// ── Double-booking and racing updates ────────────────────

#[tokio::test]
async fn losing_booking_reports_the_held_span() {
    let (desk, _store, _rx, rooms) = front_desk("seq_conflict.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    let held = span(d(2024, 6, 1), d(2024, 6, 5));
    desk.make_reservation(&ctx, booking(rooms[0], "Ada", held.start, held.end))
        .await
        .unwrap();

    let result = desk
        .make_reservation(&ctx, booking(rooms[0], "Bob", d(2024, 6, 3), d(2024, 6, 7)))
        .await;
    match result {
        Err(Error::Conflict {
            room_id,
            requested,
            held: reported,
        }) => {
            assert_eq!(room_id, rooms[0]);
            assert_eq!(requested, span(d(2024, 6, 3), d(2024, 6, 7)));
            assert_eq!(reported, held);
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_bookings_one_winner() {
    let (desk, _store, _rx, rooms) = front_desk("race.wal", &["Room 1"]).await;
    let desk = Arc::new(desk);
    let room_id = rooms[0];

    let n = 8;
    let mut handles = Vec::new();
    for i in 0..n {
        let desk = desk.clone();
        handles.push(tokio::spawn(async move {
            let ctx = Ctx::new();
            desk.make_reservation(
                &ctx,
                booking(room_id, &format!("Guest{i}"), d(2024, 6, 1), d(2024, 6, 5)),
            )
            .await
        }));
    }

    let mut won = 0;
    let mut lost = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => won += 1,
            Err(Error::Conflict { .. }) => lost += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(lost, n - 1);

    let ctx = Ctx::new();
    assert_eq!(desk.all_reservations(&ctx).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_triage_changes_state_once() {
    let (desk, _store, mut rx, rooms) = front_desk("triage_race.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    let id = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();
    drain(&mut rx);

    let desk = Arc::new(desk);
    let n = 8;
    let mut handles = Vec::new();
    for _ in 0..n {
        let desk = desk.clone();
        handles.push(tokio::spawn(async move {
            let ctx = Ctx::new();
            desk.set_processed(&ctx, id, true).await
        }));
    }

    let mut changed = 0;
    for h in handles {
        if h.await.unwrap().unwrap() {
            changed += 1;
        }
    }
    assert_eq!(changed, 1);

    // One real change, so one update notice — the repeats stay silent.
    assert_eq!(drain(&mut rx).len(), 1);
    assert!(desk.reservation(&ctx, id).await.unwrap().processed);
}

// ── Lifecycle: triage, contact, delete ───────────────────

#[tokio::test]
async fn set_processed_is_idempotent_and_notifies_once() {
    let (desk, _store, mut rx, rooms) = front_desk("processed.wal", &["Room 1"]).await;
    let ctx = Ctx::new().with_user(7);
    let id = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();
    drain(&mut rx);

    assert!(desk.set_processed(&ctx, id, true).await.unwrap());
    let notices = drain(&mut rx);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].to, "ada@example.com");
    assert_eq!(notices[0].subject, "Reservation Update");

    // Same action again: no change, no notice.
    assert!(!desk.set_processed(&ctx, id, true).await.unwrap());
    assert!(drain(&mut rx).is_empty());
    assert!(desk.reservation(&ctx, id).await.unwrap().processed);

    // Flipping back is a real change again.
    assert!(desk.set_processed(&ctx, id, false).await.unwrap());
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn triage_queue_shrinks_as_reservations_process() {
    let (desk, _store, _rx, rooms) = front_desk("triage.wal", &["Room 1", "Room 2"]).await;
    let ctx = Ctx::new();
    let first = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();
    let second = desk
        .make_reservation(&ctx, booking(rooms[1], "Bob", d(2024, 6, 2), d(2024, 6, 6)))
        .await
        .unwrap();

    desk.set_processed(&ctx, first, true).await.unwrap();

    let fresh: Vec<_> = desk
        .new_reservations(&ctx)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(fresh, vec![second]);
    assert_eq!(desk.all_reservations(&ctx).await.unwrap().len(), 2);
}

#[tokio::test]
async fn listings_order_by_arrival_date() {
    let (desk, _store, _rx, rooms) =
        front_desk("listing_order.wal", &["Room 1", "Room 2", "Room 3"]).await;
    let ctx = Ctx::new();
    let late = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 20), d(2024, 6, 25)))
        .await
        .unwrap();
    let early = desk
        .make_reservation(&ctx, booking(rooms[1], "Bob", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();
    let middle = desk
        .make_reservation(&ctx, booking(rooms[2], "Eve", d(2024, 6, 10), d(2024, 6, 12)))
        .await
        .unwrap();

    let ids: Vec<_> = desk
        .all_reservations(&ctx)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![early, middle, late]);
}

#[tokio::test]
async fn contact_update_leaves_dates_alone() {
    let (desk, _store, _rx, rooms) = front_desk("contact.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    let id = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();

    let mut fixed = guest("Ada");
    fixed.phone = "555-0199".into();
    fixed.email = "ada@lovelace.org".into();
    desk.update_contact(&ctx, id, fixed.clone()).await.unwrap();

    let record = desk.reservation(&ctx, id).await.unwrap();
    assert_eq!(record.guest, fixed);
    assert_eq!(record.span, span(d(2024, 6, 1), d(2024, 6, 5)));
    assert_eq!(record.room_id, rooms[0]);
}

#[tokio::test]
async fn deleting_reopens_the_dates() {
    let (desk, _store, _rx, rooms) = front_desk("delete.wal", &["Room 1"]).await;
    let ctx = Ctx::new().with_user(7);
    let stay = span(d(2024, 6, 1), d(2024, 6, 5));
    let id = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", stay.start, stay.end))
        .await
        .unwrap();

    let removed = desk.delete_reservation(&ctx, id).await.unwrap();
    assert_eq!(removed.id, id);
    assert!(matches!(
        desk.reservation(&ctx, id).await,
        Err(Error::ReservationNotFound(_))
    ));

    // The exact same dates can be booked again.
    desk.make_reservation(&ctx, booking(rooms[0], "Bob", stay.start, stay.end))
        .await
        .unwrap();
}

// ── Owner blocks ─────────────────────────────────────────

#[tokio::test]
async fn owner_block_blocks_exactly_one_day() {
    let (desk, _store, _rx, rooms) = front_desk("block_day.wal", &["Room 1"]).await;
    let ctx = Ctx::new().with_user(7);
    let block_id = desk.place_block(&ctx, rooms[0], d(2024, 6, 10)).await.unwrap();

    assert!(
        !desk
            .room_available(&ctx, rooms[0], span(d(2024, 6, 10), d(2024, 6, 11)))
            .await
            .unwrap()
    );
    // The surrounding days stay free.
    assert!(
        desk.room_available(&ctx, rooms[0], span(d(2024, 6, 9), d(2024, 6, 10)))
            .await
            .unwrap()
    );
    assert!(
        desk.room_available(&ctx, rooms[0], span(d(2024, 6, 11), d(2024, 6, 12)))
            .await
            .unwrap()
    );

    desk.remove_block(&ctx, block_id).await.unwrap();
    assert!(
        desk.room_available(&ctx, rooms[0], span(d(2024, 6, 10), d(2024, 6, 11)))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn guest_restriction_cannot_be_removed_directly() {
    let (desk, _store, _rx, rooms) = front_desk("block_guard.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    let id = desk
        .make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await
        .unwrap();

    let calendar = desk
        .room_calendar(&ctx, rooms[0], span(d(2024, 5, 1), d(2024, 7, 1)))
        .await
        .unwrap();
    assert_eq!(calendar.len(), 1);
    assert_eq!(calendar[0].reservation_id(), Some(id));

    let result = desk.remove_block(&ctx, calendar[0].id).await;
    assert!(matches!(
        result,
        Err(Error::RestrictionInUse { reservation_id, .. }) if reservation_id == id
    ));

    // Deleting the reservation removes the restriction with it.
    desk.delete_reservation(&ctx, id).await.unwrap();
    assert!(
        desk.room_calendar(&ctx, rooms[0], span(d(2024, 5, 1), d(2024, 7, 1)))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn block_on_unknown_room_fails() {
    let (desk, _store, _rx, _rooms) = front_desk("block_unknown.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    let result = desk.place_block(&ctx, 999, d(2024, 6, 10)).await;
    assert!(matches!(result, Err(Error::RoomNotFound(999))));
}

// ── Calendar window vs availability predicate ────────────

#[tokio::test]
async fn calendar_includes_upper_boundary_availability_does_not() {
    let (desk, _store, _rx, rooms) = front_desk("calendar_bounds.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    desk.make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 7, 10), d(2024, 7, 12)))
        .await
        .unwrap();

    // Window ending exactly on the restriction's start day.
    let window = span(d(2024, 6, 1), d(2024, 7, 10));
    let calendar = desk.room_calendar(&ctx, rooms[0], window).await.unwrap();
    assert_eq!(calendar.len(), 1);
    assert!(!calendar[0].is_owner_block());

    // The strict predicate disagrees: those dates are bookable.
    assert!(desk.room_available(&ctx, rooms[0], window).await.unwrap());
}

#[tokio::test]
async fn calendar_labels_blocks_and_bookings_apart() {
    let (desk, _store, _rx, rooms) = front_desk("calendar_kinds.wal", &["Room 1"]).await;
    let ctx = Ctx::new();
    desk.make_reservation(&ctx, booking(rooms[0], "Ada", d(2024, 7, 1), d(2024, 7, 3)))
        .await
        .unwrap();
    desk.place_block(&ctx, rooms[0], d(2024, 7, 20)).await.unwrap();

    let calendar = desk
        .room_calendar(&ctx, rooms[0], span(d(2024, 7, 1), d(2024, 7, 31)))
        .await
        .unwrap();
    assert_eq!(calendar.len(), 2);
    assert!(!calendar[0].is_owner_block());
    assert!(calendar[1].is_owner_block());
}

// ── Authentication ───────────────────────────────────────

#[tokio::test]
async fn wrong_password_is_not_a_storage_fault() {
    let (desk, store, _rx, _rooms) = front_desk("auth.wal", &[]).await;
    let ctx = Ctx::new();
    let hash = hash_password("hunter2").unwrap();
    let user = store
        .add_user(&ctx, "Marsha", "Owner", "marsha@fsm.com", &hash, 3)
        .await
        .unwrap();

    let user_id = desk
        .authenticate(&ctx, "marsha@fsm.com", "hunter2")
        .await
        .unwrap();
    assert_eq!(user_id, user.id);
    assert_eq!(desk.user(&ctx, user_id).await.unwrap().email, "marsha@fsm.com");

    let wrong = desk.authenticate(&ctx, "marsha@fsm.com", "wrong").await;
    match wrong {
        Err(e @ Error::AuthenticationFailed) => assert!(!e.is_storage()),
        other => panic!("expected AuthenticationFailed, got {other:?}"),
    }

    let unknown = desk.authenticate(&ctx, "nobody@fsm.com", "hunter2").await;
    assert!(matches!(unknown, Err(Error::UserNotFound(_))));
}

// ── Deadlines ────────────────────────────────────────────

#[tokio::test]
async fn expired_context_times_out() {
    let (desk, _store, _rx, rooms) = front_desk("deadline.wal", &["Room 1"]).await;
    let expired = Ctx::with_timeout(Duration::ZERO);

    let result = desk
        .make_reservation(&expired, booking(rooms[0], "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await;
    assert!(matches!(result, Err(Error::Timeout)));

    let ctx = Ctx::new();
    assert!(desk.all_reservations(&ctx).await.unwrap().is_empty());
}

// ── Storage-fault surfacing via a failing backend ────────

struct FailingRepo;

fn fault() -> Error {
    Error::Storage("injected fault".into())
}

#[async_trait]
impl Repository for FailingRepo {
    async fn room(&self, _ctx: &Ctx, _id: RoomId) -> Result<Room, Error> {
        Err(fault())
    }
    async fn rooms(&self, _ctx: &Ctx) -> Result<Vec<Room>, Error> {
        Err(fault())
    }
    async fn room_available(
        &self,
        _ctx: &Ctx,
        _room_id: RoomId,
        _span: DateSpan,
    ) -> Result<bool, Error> {
        Err(fault())
    }
    async fn available_rooms(&self, _ctx: &Ctx, _span: DateSpan) -> Result<Vec<Room>, Error> {
        Err(fault())
    }
    async fn book(&self, _ctx: &Ctx, _req: &BookingRequest) -> Result<ReservationId, Error> {
        Err(fault())
    }
    async fn reservation(
        &self,
        _ctx: &Ctx,
        _id: ReservationId,
    ) -> Result<ReservationRecord, Error> {
        Err(fault())
    }
    async fn reservations(&self, _ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error> {
        Err(fault())
    }
    async fn new_reservations(&self, _ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error> {
        Err(fault())
    }
    async fn set_processed(
        &self,
        _ctx: &Ctx,
        _id: ReservationId,
        _processed: bool,
    ) -> Result<bool, Error> {
        Err(fault())
    }
    async fn update_contact(
        &self,
        _ctx: &Ctx,
        _id: ReservationId,
        _guest: &Guest,
    ) -> Result<(), Error> {
        Err(fault())
    }
    async fn delete_reservation(
        &self,
        _ctx: &Ctx,
        _id: ReservationId,
    ) -> Result<Reservation, Error> {
        Err(fault())
    }
    async fn place_block(
        &self,
        _ctx: &Ctx,
        _room_id: RoomId,
        _day: NaiveDate,
    ) -> Result<RestrictionId, Error> {
        Err(fault())
    }
    async fn remove_block(&self, _ctx: &Ctx, _restriction_id: RestrictionId) -> Result<(), Error> {
        Err(fault())
    }
    async fn restrictions_for_room(
        &self,
        _ctx: &Ctx,
        _room_id: RoomId,
        _window: DateSpan,
    ) -> Result<Vec<Restriction>, Error> {
        Err(fault())
    }
    async fn authenticate(&self, _ctx: &Ctx, _email: &str, _password: &str) -> Result<UserId, Error> {
        Err(fault())
    }
    async fn user(&self, _ctx: &Ctx, _id: UserId) -> Result<User, Error> {
        Err(fault())
    }
}

#[tokio::test]
async fn storage_faults_surface_validation_short_circuits() {
    let (outbox, mut rx) = Outbox::channel();
    let desk = FrontDesk::new(Arc::new(FailingRepo), outbox);
    let ctx = Ctx::new();

    // Valid input reaches the backend and comes back as a storage fault.
    let result = desk
        .make_reservation(&ctx, booking(1, "Ada", d(2024, 6, 1), d(2024, 6, 5)))
        .await;
    match result {
        Err(e @ Error::Storage(_)) => assert!(e.is_storage()),
        other => panic!("expected Storage, got {other:?}"),
    }

    // Invalid input fails before the backend is ever consulted.
    let mut req = booking(1, "Ada", d(2024, 6, 1), d(2024, 6, 5));
    req.guest.email = "broken".into();
    let result = desk.make_reservation(&ctx, req).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    assert!(drain(&mut rx).is_empty());
}
