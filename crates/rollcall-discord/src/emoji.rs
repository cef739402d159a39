//! Campaign emoji tokens.
//!
//! A campaign stores its tracked emoji exactly as Discord reports it: a
//! Unicode emoji string, or `name:id` for a custom emoji. Tally equality is
//! byte-for-byte on this token, so both directions here must be canonical.

use serenity::model::channel::ReactionType;
use serenity::model::id::EmojiId;

/// Parse a stored token into the reaction to query Discord for.
///
/// `name:id` with a numeric, non-zero id becomes a custom emoji; anything
/// else is treated as a Unicode emoji verbatim.
pub fn parse_emoji(token: &str) -> ReactionType {
    if let Some((name, id)) = token.rsplit_once(':') {
        if let Ok(id) = id.parse::<u64>() {
            if id != 0 && !name.is_empty() {
                return ReactionType::Custom {
                    animated: false,
                    id: EmojiId::new(id),
                    name: Some(name.to_string()),
                };
            }
        }
    }
    ReactionType::Unicode(token.to_string())
}

/// Canonical token for a reaction, matching what [`parse_emoji`] accepts.
pub fn emoji_token(reaction: &ReactionType) -> String {
    match reaction {
        ReactionType::Unicode(s) => s.clone(),
        ReactionType::Custom { id, name, .. } => {
            format!("{}:{}", name.as_deref().unwrap_or(""), id.get())
        }
        other => other.to_string(),
    }
}
