use thiserror::Error;

use crate::types::CampaignStatus;

/// Errors that can occur within the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another non-deleted campaign already tracks the same
    /// (channel, message, emoji) triple.
    #[error("Duplicate campaign: id {existing} already tracks this message and emoji")]
    Duplicate { existing: i64 },

    /// No campaign with the given id exists.
    #[error("Campaign not found: {id}")]
    NotFound { id: i64 },

    /// The requested status change is outside the campaign state machine.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    /// A persisted row failed to parse (timestamp or status column).
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
