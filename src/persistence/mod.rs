//! Persistence layer: PostgreSQL event log and transaction table.
//!
//! The in-memory books are authoritative while the process runs. When
//! persistence is enabled, [`event_log::spawn_event_log`] subscribes to the
//! event bus and mirrors every event, plus the latest state of every
//! ledger entry, into PostgreSQL through `sqlx::PgPool`.

pub mod event_log;
pub mod models;
pub mod postgres;

pub use event_log::{LedgerSink, spawn_event_log};
pub use postgres::PostgresPersistence;
