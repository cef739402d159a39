//! Guild allowlist enforcement.
//!
//! An empty allowlist means no restriction; a non-empty list limits every
//! operation to the named guild ids. DMs carry no guild and always pass.

/// Returns `true` when operations against `guild_id` are permitted.
pub fn guild_allowed(allowlist: &[String], guild_id: &str) -> bool {
    allowlist.is_empty() || allowlist.iter().any(|g| g == guild_id)
}
