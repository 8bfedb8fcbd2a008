//! Availability and reservation engine for a small lodging business:
//! decides whether a room is free for a date range, manages the
//! reservation lifecycle together with its owning restriction, and
//! guarantees that two overlapping bookings cannot both succeed. The
//! bundled store keeps state in memory and makes it durable through a
//! write-ahead log; any backend implementing [`Repository`] can stand in.

pub mod context;
pub mod desk;
pub mod error;
pub mod forms;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
mod wal;

pub use context::Ctx;
pub use desk::FrontDesk;
pub use error::Error;
pub use store::{LedgerStore, Repository, hash_password};
