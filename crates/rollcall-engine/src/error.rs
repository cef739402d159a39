use thiserror::Error;

use rollcall_discord::DiscordError;
use rollcall_store::StoreError;

/// Errors that can occur within the campaign engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("Discord error: {0}")]
    Discord(#[from] DiscordError),
}

impl EngineError {
    /// Short kind string used in tool error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Store(StoreError::Duplicate { .. }) => "duplicate",
            EngineError::Store(StoreError::NotFound { .. }) => "not_found",
            EngineError::Store(StoreError::InvalidTransition { .. }) => "invalid_state",
            EngineError::Store(_) => "internal",
            EngineError::Discord(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
