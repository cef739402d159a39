//! The narrow seam between the campaign engine and Discord.
//!
//! The engine never names [`crate::session::Session`] directly; it is generic
//! over this trait so tests can script reactions and send failures.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MessageInfo, UserInfo};

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch one message.
    async fn message_get(&self, channel_id: &str, message_id: &str) -> Result<MessageInfo>;

    /// Every user who reacted to the message with `emoji`, paginated to
    /// exhaustion. Finite and re-traversable: calling twice re-reads the
    /// current reaction state.
    async fn reaction_users(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<UserInfo>>;

    /// Send a message, optionally as a reply. Returns the new message id
    /// (synthetic `"0"` under DRY-RUN).
    async fn message_send(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String>;
}
