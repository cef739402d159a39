//! Fuzzy entity resolution for tool arguments.
//!
//! Guild and channel arguments accept either a snowflake id or a name.
//! Resolution order: exact id, exact name, case-insensitive name, then a
//! substring match that is accepted only when unambiguous.

use crate::types::{ChannelInfo, GuildInfo};

/// Resolve `query` against a list of (id, name) entities.
pub fn resolve_entity<'a, T>(
    items: &'a [T],
    query: &str,
    id_of: impl Fn(&T) -> &str,
    name_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if let Some(hit) = items.iter().find(|t| id_of(t) == query) {
        return Some(hit);
    }
    if let Some(hit) = items.iter().find(|t| name_of(t) == query) {
        return Some(hit);
    }

    let lowered = query.to_lowercase();
    if let Some(hit) = items.iter().find(|t| name_of(t).to_lowercase() == lowered) {
        return Some(hit);
    }

    let partial: Vec<&T> = items
        .iter()
        .filter(|t| name_of(t).to_lowercase().contains(&lowered))
        .collect();
    match partial.as_slice() {
        [only] => Some(only),
        _ => None,
    }
}

pub fn resolve_guild<'a>(guilds: &'a [GuildInfo], query: &str) -> Option<&'a GuildInfo> {
    resolve_entity(guilds, query, |g| &g.id, |g| &g.name)
}

pub fn resolve_channel<'a>(channels: &'a [ChannelInfo], query: &str) -> Option<&'a ChannelInfo> {
    resolve_entity(channels, query, |c| &c.id, |c| &c.name)
}
