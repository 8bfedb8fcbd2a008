use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use argon2::Argon2;
use argon2::password_hash::{
    self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tokio::time::timeout;
use tracing::error;

use crate::context::Ctx;
use crate::error::Error;
use crate::forms::FieldErrors;
use crate::limits::*;
use crate::model::*;
use crate::wal::Wal;

use super::Repository;

pub type SharedRoomLedger = Arc<RwLock<RoomLedger>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(WalCommand::Append { event, response }) = rx.recv().await {
        let mut batch = vec![(event, response)];
        while let Ok(WalCommand::Append { event, response }) = rx.try_recv() {
            batch.push((event, response));
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
            .record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());

        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

// ── Id sequences ─────────────────────────────────────────

#[derive(Default)]
struct Sequences {
    room: AtomicI64,
    reservation: AtomicI64,
    restriction: AtomicI64,
    user: AtomicI64,
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

/// Replay observes every id so fresh allocations resume above it.
fn observe_id(seq: &AtomicI64, id: i64) {
    seq.fetch_max(id, Ordering::Relaxed);
}

// ── Store ────────────────────────────────────────────────

/// In-memory repository made durable by a write-ahead log. Rooms carry
/// their slice of the restriction ledger behind a per-room `RwLock`; that
/// write lock is the single-writer arbitration that makes the availability
/// re-check and the restriction insert atomic in `book`.
pub struct LedgerStore {
    rooms: DashMap<RoomId, SharedRoomLedger>,
    reservations: DashMap<ReservationId, Reservation>,
    users: DashMap<UserId, User>,
    /// Reverse lookup: email → user id, for the authenticate path.
    users_by_email: DashMap<String, UserId>,
    /// Reverse lookup: restriction id → room id.
    restriction_to_room: DashMap<RestrictionId, RoomId>,
    wal_tx: mpsc::Sender<WalCommand>,
    seq: Sequences,
}

impl LedgerStore {
    /// Open the store, replaying any WAL at `path`. A truncated or corrupt
    /// tail ends replay at the last good record. Must run inside a tokio
    /// runtime (spawns the WAL writer task).
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_QUEUE_DEPTH);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            rooms: DashMap::new(),
            reservations: DashMap::new(),
            users: DashMap::new(),
            users_by_email: DashMap::new(),
            restriction_to_room: DashMap::new(),
            wal_tx,
            seq: Sequences::default(),
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never block_on here; open may run inside an
        // async context.
        for event in &events {
            match event {
                Event::RoomAdded { id, name, at } => {
                    observe_id(&store.seq.room, *id);
                    let room = Room {
                        id: *id,
                        name: name.clone(),
                        created_at: *at,
                        updated_at: *at,
                    };
                    store.rooms.insert(*id, Arc::new(RwLock::new(RoomLedger::new(room))));
                }
                Event::UserAdded {
                    id,
                    first_name,
                    last_name,
                    email,
                    password_hash,
                    access_level,
                    at,
                } => {
                    observe_id(&store.seq.user, *id);
                    store.users_by_email.insert(email.clone(), *id);
                    store.users.insert(
                        *id,
                        User {
                            id: *id,
                            first_name: first_name.clone(),
                            last_name: last_name.clone(),
                            email: email.clone(),
                            password_hash: password_hash.clone(),
                            access_level: *access_level,
                            created_at: *at,
                            updated_at: *at,
                        },
                    );
                }
                Event::ContactUpdated { reservation_id, guest, at } => {
                    if let Some(mut r) = store.reservations.get_mut(reservation_id) {
                        r.guest = guest.clone();
                        r.updated_at = *at;
                    }
                }
                Event::ProcessedSet { reservation_id, processed, at } => {
                    if let Some(mut r) = store.reservations.get_mut(reservation_id) {
                        r.processed = *processed;
                        r.updated_at = *at;
                    }
                }
                other => {
                    if let Some(room_id) = event_room_id(other)
                        && let Some(entry) = store.rooms.get(&room_id) {
                            let ledger = entry.value().clone();
                            drop(entry);
                            let mut guard =
                                ledger.try_write().expect("replay: uncontended write");
                            store.apply_to_room(&mut guard, other);
                        }
                }
            }
        }

        Ok(store)
    }

    /// Apply a room-scoped event to its ledger and the record maps.
    /// No locking — the caller holds the room's write lock. Shared between
    /// replay and the live mutation paths so the two can never diverge.
    fn apply_to_room(&self, ledger: &mut RoomLedger, event: &Event) {
        match event {
            Event::ReservationBooked {
                reservation_id,
                restriction_id,
                room_id,
                guest,
                span,
                at,
            } => {
                observe_id(&self.seq.reservation, *reservation_id);
                observe_id(&self.seq.restriction, *restriction_id);
                ledger.insert(Restriction {
                    id: *restriction_id,
                    room_id: *room_id,
                    span: *span,
                    kind: RestrictionKind::GuestBooking {
                        reservation_id: *reservation_id,
                    },
                    created_at: *at,
                    updated_at: *at,
                });
                self.restriction_to_room.insert(*restriction_id, *room_id);
                self.reservations.insert(
                    *reservation_id,
                    Reservation {
                        id: *reservation_id,
                        room_id: *room_id,
                        guest: guest.clone(),
                        span: *span,
                        processed: false,
                        created_at: *at,
                        updated_at: *at,
                    },
                );
            }
            Event::ReservationDeleted { reservation_id, restriction_id, .. } => {
                ledger.remove(*restriction_id);
                self.restriction_to_room.remove(restriction_id);
                self.reservations.remove(reservation_id);
            }
            Event::BlockPlaced { restriction_id, room_id, span, at } => {
                observe_id(&self.seq.restriction, *restriction_id);
                ledger.insert(Restriction {
                    id: *restriction_id,
                    room_id: *room_id,
                    span: *span,
                    kind: RestrictionKind::OwnerBlock,
                    created_at: *at,
                    updated_at: *at,
                });
                self.restriction_to_room.insert(*restriction_id, *room_id);
            }
            Event::BlockRemoved { restriction_id, .. } => {
                ledger.remove(*restriction_id);
                self.restriction_to_room.remove(restriction_id);
            }
            // Room/user/record events are handled at the map level.
            _ => {}
        }
    }

    fn ledger(&self, room_id: RoomId) -> Option<SharedRoomLedger> {
        self.rooms.get(&room_id).map(|e| e.value().clone())
    }

    /// Acquire a room's read lock within the context deadline.
    async fn read_ledger(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
    ) -> Result<OwnedRwLockReadGuard<RoomLedger>, Error> {
        let ledger = self.ledger(room_id).ok_or(Error::RoomNotFound(room_id))?;
        timeout(ctx.budget()?, ledger.read_owned())
            .await
            .map_err(|_| Error::Timeout)
    }

    /// Acquire a room's write lock within the context deadline.
    async fn write_ledger(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
    ) -> Result<OwnedRwLockWriteGuard<RoomLedger>, Error> {
        let ledger = self.ledger(room_id).ok_or(Error::RoomNotFound(room_id))?;
        timeout(ctx.budget()?, ledger.write_owned())
            .await
            .map_err(|_| Error::Timeout)
    }

    /// Hand an event to the group-commit writer and wait for durability.
    /// The deadline bounds the queue handoff; once the writer owns the
    /// event the commit is past cancelling, so the ack wait runs to
    /// completion and the in-memory apply can never diverge from the log.
    async fn wal_append(&self, ctx: &Ctx, event: &Event) -> Result<(), Error> {
        let budget = ctx.budget()?;
        let (tx, rx) = oneshot::channel();
        let cmd = WalCommand::Append {
            event: event.clone(),
            response: tx,
        };
        match timeout(budget, self.wal_tx.send(cmd)).await {
            Err(_) => return Err(Error::Timeout),
            Ok(Err(_)) => return Err(Error::Storage("wal writer shut down".into())),
            Ok(Ok(())) => {}
        }
        rx.await
            .map_err(|_| Error::Storage("wal writer dropped response".into()))?
            .map_err(|e| Error::Storage(e.to_string()))
    }

    fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Join a reservation with its room name for the admin projections.
    async fn join_record(&self, ctx: &Ctx, r: Reservation) -> Result<ReservationRecord, Error> {
        let guard = self.read_ledger(ctx, r.room_id).await?;
        Ok(ReservationRecord {
            id: r.id,
            room_id: r.room_id,
            room_name: guard.room.name.clone(),
            guest: r.guest,
            span: r.span,
            processed: r.processed,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }

    async fn records(&self, ctx: &Ctx, only_new: bool) -> Result<Vec<ReservationRecord>, Error> {
        let mut snapshot: Vec<Reservation> = self
            .reservations
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| !only_new || !r.processed)
            .collect();
        // Earliest-arriving guests first, ties broken by id.
        snapshot.sort_by_key(|r| (r.span.start, r.id));

        let mut records = Vec::with_capacity(snapshot.len());
        for r in snapshot {
            records.push(self.join_record(ctx, r).await?);
        }
        Ok(records)
    }

    // ── Provisioning (not on the trait) ──────────────────

    /// Add a room to the catalog. Rooms are immutable after creation.
    pub async fn add_room(&self, ctx: &Ctx, name: &str) -> Result<Room, Error> {
        ctx.budget()?;
        if self.rooms.len() >= MAX_ROOMS {
            return Err(Error::LimitExceeded("too many rooms"));
        }
        if name.len() > MAX_FIELD_LEN {
            return Err(Error::LimitExceeded("room name too long"));
        }

        let id = next_id(&self.seq.room);
        let at = Utc::now();
        let event = Event::RoomAdded {
            id,
            name: name.to_string(),
            at,
        };
        self.wal_append(ctx, &event).await?;

        let room = Room {
            id,
            name: name.to_string(),
            created_at: at,
            updated_at: at,
        };
        self.rooms
            .insert(id, Arc::new(RwLock::new(RoomLedger::new(room.clone()))));
        Ok(room)
    }

    /// Register a staff user. `password_hash` comes from [`hash_password`].
    pub async fn add_user(
        &self,
        ctx: &Ctx,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
        access_level: i32,
    ) -> Result<User, Error> {
        ctx.budget()?;
        if self.users.len() >= MAX_USERS {
            return Err(Error::LimitExceeded("too many users"));
        }
        if self.users_by_email.contains_key(email) {
            let mut errors = FieldErrors::default();
            errors.add("email", "A user with this email already exists");
            return Err(Error::Validation(errors));
        }

        let id = next_id(&self.seq.user);
        let at = Utc::now();
        let event = Event::UserAdded {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            access_level,
            at,
        };
        self.wal_append(ctx, &event).await?;

        let user = User {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            access_level,
            created_at: at,
            updated_at: at,
        };
        self.users_by_email.insert(email.to_string(), id);
        self.users.insert(id, user.clone());
        Ok(user)
    }
}

/// Extract the room id from a room-scoped event (replay routing).
fn event_room_id(event: &Event) -> Option<RoomId> {
    match event {
        Event::ReservationBooked { room_id, .. }
        | Event::ReservationDeleted { room_id, .. }
        | Event::BlockPlaced { room_id, .. }
        | Event::BlockRemoved { room_id, .. } => Some(*room_id),
        Event::RoomAdded { .. }
        | Event::UserAdded { .. }
        | Event::ContactUpdated { .. }
        | Event::ProcessedSet { .. } => None,
    }
}

/// Argon2 hash for seeding user credentials.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Storage(format!("password hashing: {e}")))
}

#[async_trait]
impl Repository for LedgerStore {
    async fn room(&self, ctx: &Ctx, id: RoomId) -> Result<Room, Error> {
        let guard = self.read_ledger(ctx, id).await?;
        Ok(guard.room.clone())
    }

    async fn rooms(&self, ctx: &Ctx) -> Result<Vec<Room>, Error> {
        let mut rooms = Vec::with_capacity(self.rooms.len());
        for id in self.room_ids() {
            let guard = self.read_ledger(ctx, id).await?;
            rooms.push(guard.room.clone());
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rooms)
    }

    async fn room_available(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        span: DateSpan,
    ) -> Result<bool, Error> {
        let guard = self.read_ledger(ctx, room_id).await?;
        Ok(guard.overlapping(&span).next().is_none())
    }

    async fn available_rooms(&self, ctx: &Ctx, span: DateSpan) -> Result<Vec<Room>, Error> {
        let mut free = Vec::new();
        for id in self.room_ids() {
            let guard = self.read_ledger(ctx, id).await?;
            if guard.overlapping(&span).next().is_none() {
                free.push(guard.room.clone());
            }
        }
        Ok(free)
    }

    async fn book(&self, ctx: &Ctx, req: &BookingRequest) -> Result<ReservationId, Error> {
        let mut guard = self.write_ledger(ctx, req.room_id).await?;
        if guard.restrictions.len() >= MAX_RESTRICTIONS_PER_ROOM {
            return Err(Error::LimitExceeded("too many restrictions on room"));
        }

        // The re-check under the room's write lock is what closes the
        // check-then-insert race: a booking that lost loses here, before
        // anything is written.
        if let Some(held) = guard.overlapping(&req.span).next() {
            return Err(Error::Conflict {
                room_id: req.room_id,
                requested: req.span,
                held: held.span,
            });
        }

        let reservation_id = next_id(&self.seq.reservation);
        let restriction_id = next_id(&self.seq.restriction);
        let event = Event::ReservationBooked {
            reservation_id,
            restriction_id,
            room_id: req.room_id,
            guest: req.guest.clone(),
            span: req.span,
            at: Utc::now(),
        };
        self.wal_append(ctx, &event).await?;
        self.apply_to_room(&mut guard, &event);
        Ok(reservation_id)
    }

    async fn reservation(&self, ctx: &Ctx, id: ReservationId) -> Result<ReservationRecord, Error> {
        ctx.budget()?;
        let r = self
            .reservations
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(Error::ReservationNotFound(id))?;
        self.join_record(ctx, r).await
    }

    async fn reservations(&self, ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error> {
        self.records(ctx, false).await
    }

    async fn new_reservations(&self, ctx: &Ctx) -> Result<Vec<ReservationRecord>, Error> {
        self.records(ctx, true).await
    }

    async fn set_processed(
        &self,
        ctx: &Ctx,
        id: ReservationId,
        processed: bool,
    ) -> Result<bool, Error> {
        ctx.budget()?;
        let room_id = self
            .reservations
            .get(&id)
            .map(|e| e.value().room_id)
            .ok_or(Error::ReservationNotFound(id))?;

        // Reservation-row writes serialize on the owning room's lock like
        // every ledger mutation: re-check, append, and apply form one
        // critical section, so the WAL order is the applied order.
        let _guard = self.write_ledger(ctx, room_id).await?;
        let current = self
            .reservations
            .get(&id)
            .map(|e| e.value().processed)
            .ok_or(Error::ReservationNotFound(id))?;
        if current == processed {
            // Repeat of the same triage action — nothing to write.
            return Ok(false);
        }

        let at = Utc::now();
        let event = Event::ProcessedSet {
            reservation_id: id,
            processed,
            at,
        };
        self.wal_append(ctx, &event).await?;
        if let Some(mut r) = self.reservations.get_mut(&id) {
            r.processed = processed;
            r.updated_at = at;
        }
        Ok(true)
    }

    async fn update_contact(
        &self,
        ctx: &Ctx,
        id: ReservationId,
        guest: &Guest,
    ) -> Result<(), Error> {
        ctx.budget()?;
        let room_id = self
            .reservations
            .get(&id)
            .map(|e| e.value().room_id)
            .ok_or(Error::ReservationNotFound(id))?;

        // Same critical section as set_processed.
        let _guard = self.write_ledger(ctx, room_id).await?;
        if !self.reservations.contains_key(&id) {
            // A concurrent delete won the lock first.
            return Err(Error::ReservationNotFound(id));
        }

        let at = Utc::now();
        let event = Event::ContactUpdated {
            reservation_id: id,
            guest: guest.clone(),
            at,
        };
        self.wal_append(ctx, &event).await?;
        if let Some(mut r) = self.reservations.get_mut(&id) {
            r.guest = guest.clone();
            r.updated_at = at;
        }
        Ok(())
    }

    async fn delete_reservation(&self, ctx: &Ctx, id: ReservationId) -> Result<Reservation, Error> {
        ctx.budget()?;
        let room_id = self
            .reservations
            .get(&id)
            .map(|e| e.value().room_id)
            .ok_or(Error::ReservationNotFound(id))?;

        let mut guard = self.write_ledger(ctx, room_id).await?;
        // Re-fetch under the room lock; a concurrent delete may have won.
        let reservation = self
            .reservations
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(Error::ReservationNotFound(id))?;
        let restriction_id = match guard.guest_restriction(id) {
            Some(r) => r.id,
            None => {
                // Ledger invariant broken: every reservation owns one restriction.
                error!("reservation {id} in room {room_id} has no owning restriction");
                return Err(Error::Storage(format!(
                    "reservation {id} has no owning restriction"
                )));
            }
        };

        let event = Event::ReservationDeleted {
            reservation_id: id,
            restriction_id,
            room_id,
        };
        self.wal_append(ctx, &event).await?;
        self.apply_to_room(&mut guard, &event);
        Ok(reservation)
    }

    async fn place_block(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        day: NaiveDate,
    ) -> Result<RestrictionId, Error> {
        let span =
            DateSpan::one_night(day).ok_or(Error::LimitExceeded("date beyond calendar range"))?;
        let mut guard = self.write_ledger(ctx, room_id).await?;
        if guard.restrictions.len() >= MAX_RESTRICTIONS_PER_ROOM {
            return Err(Error::LimitExceeded("too many restrictions on room"));
        }

        let restriction_id = next_id(&self.seq.restriction);
        let event = Event::BlockPlaced {
            restriction_id,
            room_id,
            span,
            at: Utc::now(),
        };
        self.wal_append(ctx, &event).await?;
        self.apply_to_room(&mut guard, &event);
        Ok(restriction_id)
    }

    async fn remove_block(&self, ctx: &Ctx, restriction_id: RestrictionId) -> Result<(), Error> {
        ctx.budget()?;
        let room_id = self
            .restriction_to_room
            .get(&restriction_id)
            .map(|e| *e.value())
            .ok_or(Error::RestrictionNotFound(restriction_id))?;

        let mut guard = self.write_ledger(ctx, room_id).await?;
        let restriction = guard
            .restrictions
            .iter()
            .find(|r| r.id == restriction_id)
            .ok_or(Error::RestrictionNotFound(restriction_id))?;
        if let Some(reservation_id) = restriction.reservation_id() {
            // A live reservation owns this one; deleting the reservation
            // removes both.
            return Err(Error::RestrictionInUse {
                restriction_id,
                reservation_id,
            });
        }

        let event = Event::BlockRemoved {
            restriction_id,
            room_id,
        };
        self.wal_append(ctx, &event).await?;
        self.apply_to_room(&mut guard, &event);
        Ok(())
    }

    async fn restrictions_for_room(
        &self,
        ctx: &Ctx,
        room_id: RoomId,
        window: DateSpan,
    ) -> Result<Vec<Restriction>, Error> {
        let guard = self.read_ledger(ctx, room_id).await?;
        Ok(guard.in_window(&window).cloned().collect())
    }

    async fn authenticate(&self, ctx: &Ctx, email: &str, password: &str) -> Result<UserId, Error> {
        ctx.budget()?;
        let user_id = self
            .users_by_email
            .get(email)
            .map(|e| *e.value())
            .ok_or_else(|| Error::UserNotFound(email.to_string()))?;
        let stored_hash = self
            .users
            .get(&user_id)
            .map(|e| e.value().password_hash.clone())
            .ok_or_else(|| Error::UserNotFound(email.to_string()))?;

        let parsed = PasswordHash::new(&stored_hash).map_err(|e| {
            error!("stored password hash for user {user_id} is malformed: {e}");
            Error::Storage(format!("malformed password hash for user {user_id}"))
        })?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(user_id),
            Err(password_hash::Error::Password) => Err(Error::AuthenticationFailed),
            Err(e) => Err(Error::Storage(format!("password verification: {e}"))),
        }
    }

    async fn user(&self, ctx: &Ctx, id: UserId) -> Result<User, Error> {
        ctx.budget()?;
        self.users
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }
}
