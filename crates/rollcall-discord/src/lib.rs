//! `rollcall-discord`: the Discord access layer.
//!
//! One lazily-established REST session per process ([`session::Session`]).
//! The campaign engine talks to it through the narrow [`api::ChatApi`] trait;
//! the tool surface additionally uses the inherent read operations (guild and
//! channel listings, message fetches, bot identity).
//!
//! Cross-cutting policies live here too: the guild allowlist (checked before
//! any Discord call once the owning guild is known), DRY-RUN write
//! suppression, and the emoji token format shared with the store.

pub mod allow;
pub mod api;
pub mod emoji;
pub mod error;
pub mod resolve;
pub mod session;
pub mod types;

pub use api::ChatApi;
pub use error::{DiscordError, Result};
pub use session::Session;
pub use types::{ChannelInfo, GuildInfo, MessageInfo, UserInfo};
