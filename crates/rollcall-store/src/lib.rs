//! `rollcall-store`: durable campaign state on SQLite.
//!
//! # Overview
//!
//! Three tables back the reminder engine: `campaigns` (one row per tracked
//! message + emoji), `opt_ins` (one row per unique reactor per campaign) and
//! `reminder_logs` (one audit row per broadcast attempt). Schema creation is
//! idempotent and runs on every open.
//!
//! The [`store::Store`] handle serialises writes behind a `Mutex<Connection>`;
//! every call is one short transaction, so callers never hold the lock across
//! network I/O.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::Store;
pub use types::{Campaign, CampaignStatus, OptIn, ReminderLog, UpsertOutcome};
