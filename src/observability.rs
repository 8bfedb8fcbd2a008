// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations committed.
pub const BOOKINGS_TOTAL: &str = "innkeep_bookings_total";

/// Counter: bookings refused because another writer held the dates.
pub const BOOKING_CONFLICTS_TOTAL: &str = "innkeep_booking_conflicts_total";

/// Counter: reservations deleted (aggregate with their restriction).
pub const RESERVATIONS_DELETED_TOTAL: &str = "innkeep_reservations_deleted_total";

/// Counter: password mismatches on the authenticate path.
pub const AUTH_FAILURES_TOTAL: &str = "innkeep_auth_failures_total";

/// Counter: notices with no listener attached.
pub const NOTICES_DROPPED_TOTAL: &str = "innkeep_notices_dropped_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

// No exporter is installed here: the host process owns the recorder, the
// library only emits. Without a recorder every macro call is a no-op.
