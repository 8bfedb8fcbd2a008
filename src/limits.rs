//! Hard caps enforced at the engine and storage edges.

use std::time::Duration;

/// Default deadline for a single storage operation.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

/// Shortest accepted guest name.
pub const MIN_NAME_LEN: usize = 3;
/// Longest accepted value for any single form field.
pub const MAX_FIELD_LEN: usize = 255;
/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 366;
/// Dates outside this year window are rejected before they reach the ledger.
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2200;

pub const MAX_ROOMS: usize = 1024;
pub const MAX_USERS: usize = 1024;
/// Restrictions held per room before further inserts are refused.
pub const MAX_RESTRICTIONS_PER_ROOM: usize = 8192;

/// Depth of the WAL append queue before writers feel backpressure.
pub const WAL_QUEUE_DEPTH: usize = 4096;
