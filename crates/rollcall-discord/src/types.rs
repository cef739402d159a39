use serde::{Deserialize, Serialize};
use serenity::model::channel::{Channel, GuildChannel, Message, PrivateChannel};
use serenity::model::user::{CurrentUser, User};

/// A Discord user, as much of it as the engine cares about.
///
/// Serenity's models are `#[non_exhaustive]`; these plain structs exist so
/// fixtures and test fakes can construct values, and so tool results
/// serialize without dragging the whole wire model along.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// User snowflake as a string.
    pub id: String,
    pub username: String,
    /// Global display name, when the user has set one.
    pub display_name: Option<String>,
    pub bot: bool,
}

impl UserInfo {
    /// Best display string: global name when present, else the username.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

impl From<&User> for UserInfo {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.name.clone(),
            display_name: u.global_name.clone(),
            bot: u.bot,
        }
    }
}

impl From<&CurrentUser> for UserInfo {
    fn from(u: &CurrentUser) -> Self {
        Self {
            id: u.id.to_string(),
            username: u.name.clone(),
            display_name: u.global_name.clone(),
            bot: u.bot,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
}

impl From<&serenity::model::guild::GuildInfo> for GuildInfo {
    fn from(g: &serenity::model::guild::GuildInfo) -> Self {
        Self {
            id: g.id.to_string(),
            name: g.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    /// Owning guild; `None` for DMs.
    pub guild_id: Option<String>,
    pub name: String,
    /// Discord channel type name ("text", "voice", …).
    pub kind: String,
    pub topic: Option<String>,
}

impl From<&GuildChannel> for ChannelInfo {
    fn from(c: &GuildChannel) -> Self {
        Self {
            id: c.id.to_string(),
            guild_id: Some(c.guild_id.to_string()),
            name: c.name.clone(),
            kind: c.kind.name().to_string(),
            topic: c.topic.clone(),
        }
    }
}

impl From<&PrivateChannel> for ChannelInfo {
    fn from(c: &PrivateChannel) -> Self {
        Self {
            id: c.id.to_string(),
            guild_id: None,
            name: c.name(),
            kind: "private".to_string(),
            topic: None,
        }
    }
}

impl From<&Channel> for ChannelInfo {
    fn from(c: &Channel) -> Self {
        match c {
            Channel::Guild(gc) => ChannelInfo::from(gc),
            Channel::Private(pc) => ChannelInfo::from(pc),
            other => Self {
                id: other.id().to_string(),
                guild_id: None,
                name: String::new(),
                kind: "unknown".to_string(),
                topic: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub channel_id: String,
    pub author: UserInfo,
    pub content: String,
    /// ISO-8601 timestamp string as Discord reports it.
    pub timestamp: String,
}

impl From<&Message> for MessageInfo {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.to_string(),
            channel_id: m.channel_id.to_string(),
            author: UserInfo::from(&m.author),
            content: m.content.clone(),
            timestamp: m.timestamp.to_string(),
        }
    }
}
