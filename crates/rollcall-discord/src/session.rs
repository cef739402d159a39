use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serenity::builder::{CreateMessage, GetMessages};
use serenity::http::Http;
use serenity::model::channel::MessageReference;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use tokio::sync::RwLock;
use tracing::{debug, info};

use rollcall_core::Config;

use crate::allow::guild_allowed;
use crate::api::ChatApi;
use crate::emoji::parse_emoji;
use crate::error::{DiscordError, Result};
use crate::types::{ChannelInfo, GuildInfo, MessageInfo, UserInfo};

/// Reaction pages are fetched at Discord's maximum page size.
const REACTION_PAGE: u8 = 100;

/// Message id returned for suppressed DRY-RUN sends. Never a real snowflake.
pub const DRY_RUN_MESSAGE_ID: &str = "0";

struct Connected {
    http: Arc<Http>,
    bot: UserInfo,
}

/// The process-wide Discord session.
///
/// Holds the configuration snapshot and a lazily-established REST client.
/// With DRY-RUN set and no token configured, the session runs in fixture
/// mode: reads return deterministic empty values and writes are suppressed,
/// so the store paths can be exercised without any network.
pub struct Session {
    token: String,
    dry_run: bool,
    allowlist: Vec<String>,
    state: RwLock<Option<Connected>>,
    /// channel id -> owning guild id (None for DMs); avoids re-fetching the
    /// channel on every allowlist check.
    channel_guilds: DashMap<String, Option<String>>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            token: config.discord_token.clone(),
            dry_run: config.dry_run,
            allowlist: config.allowlist(),
            state: RwLock::new(None),
            channel_guilds: DashMap::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn allowlist(&self) -> &[String] {
        &self.allowlist
    }

    /// Tokenless DRY-RUN: no network, deterministic fixtures.
    fn fixture_mode(&self) -> bool {
        self.dry_run && self.token.is_empty()
    }

    /// Establish the REST session if not already up. Idempotent.
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.fixture_mode() {
            return Ok(());
        }
        if self.state.read().await.is_some() {
            return Ok(());
        }

        let mut guard = self.state.write().await;
        if guard.is_some() {
            return Ok(());
        }
        if self.token.is_empty() {
            return Err(DiscordError::NotConnected);
        }

        let http = Arc::new(Http::new(&self.token));
        let me = http.get_current_user().await.map_err(DiscordError::from)?;
        let bot = UserInfo::from(&me);
        info!(bot_id = %bot.id, bot = %bot.username, "Discord session established");
        *guard = Some(Connected { http, bot });
        Ok(())
    }

    pub async fn connected(&self) -> bool {
        self.fixture_mode() || self.state.read().await.is_some()
    }

    /// The bot's own identity.
    pub async fn bot_user(&self) -> Result<UserInfo> {
        if self.fixture_mode() {
            return Ok(UserInfo {
                id: "0".to_string(),
                username: "rollcall (dry-run)".to_string(),
                display_name: None,
                bot: true,
            });
        }
        let guard = self.state.read().await;
        match guard.as_ref() {
            Some(c) => Ok(c.bot.clone()),
            None => Err(DiscordError::NotConnected),
        }
    }

    async fn http(&self) -> Result<Arc<Http>> {
        let guard = self.state.read().await;
        match guard.as_ref() {
            Some(c) => Ok(Arc::clone(&c.http)),
            None => Err(DiscordError::NotConnected),
        }
    }

    /// Allowlist gate for a channel-scoped operation. Resolves the owning
    /// guild (cached after the first lookup); DMs always pass.
    async fn check_channel_allowed(&self, http: &Http, channel_id: &str) -> Result<()> {
        if self.allowlist.is_empty() {
            return Ok(());
        }

        let guild = match self.channel_guilds.get(channel_id) {
            Some(cached) => cached.clone(),
            None => {
                let cid = parse_channel_id(channel_id)?;
                let channel = http.get_channel(cid).await.map_err(DiscordError::from)?;
                let guild = ChannelInfo::from(&channel).guild_id;
                self.channel_guilds
                    .insert(channel_id.to_string(), guild.clone());
                guild
            }
        };

        match guild {
            Some(gid) if !guild_allowed(&self.allowlist, &gid) => Err(DiscordError::Forbidden(
                format!("guild {gid} is not in the allowlist"),
            )),
            _ => Ok(()),
        }
    }

    fn check_guild_allowed(&self, guild_id: &str) -> Result<()> {
        if guild_allowed(&self.allowlist, guild_id) {
            Ok(())
        } else {
            Err(DiscordError::Forbidden(format!(
                "guild {guild_id} is not in the allowlist"
            )))
        }
    }

    // --- read operations ---------------------------------------------------

    /// Guilds the bot is a member of, filtered to the allowlist.
    pub async fn guild_list(&self) -> Result<Vec<GuildInfo>> {
        if self.fixture_mode() {
            return Ok(Vec::new());
        }
        let http = self.http().await?;
        let guilds = http
            .get_guilds(None, None)
            .await
            .map_err(DiscordError::from)?;
        Ok(guilds
            .iter()
            .map(GuildInfo::from)
            .filter(|g| guild_allowed(&self.allowlist, &g.id))
            .collect())
    }

    /// All channels of a guild (by real guild id).
    pub async fn channels_list(&self, guild_id: &str) -> Result<Vec<ChannelInfo>> {
        if self.fixture_mode() {
            return Ok(Vec::new());
        }
        self.check_guild_allowed(guild_id)?;
        let http = self.http().await?;
        let gid = parse_guild_id(guild_id)?;
        let channels = http.get_channels(gid).await.map_err(DiscordError::from)?;
        let infos: Vec<ChannelInfo> = channels.iter().map(ChannelInfo::from).collect();
        for c in &infos {
            self.channel_guilds
                .insert(c.id.clone(), c.guild_id.clone());
        }
        Ok(infos)
    }

    pub async fn channel_get(&self, channel_id: &str) -> Result<ChannelInfo> {
        if self.fixture_mode() {
            return Ok(fixture_channel(channel_id));
        }
        let http = self.http().await?;
        let cid = parse_channel_id(channel_id)?;
        let channel = http.get_channel(cid).await.map_err(DiscordError::from)?;
        let info = ChannelInfo::from(&channel);
        self.channel_guilds
            .insert(info.id.clone(), info.guild_id.clone());
        if let Some(gid) = &info.guild_id {
            self.check_guild_allowed(gid)?;
        }
        Ok(info)
    }

    /// The most recent messages of a channel, newest first (Discord order).
    pub async fn recent_messages(&self, channel_id: &str, limit: u8) -> Result<Vec<MessageInfo>> {
        if self.fixture_mode() {
            return Ok(Vec::new());
        }
        let http = self.http().await?;
        self.check_channel_allowed(&http, channel_id).await?;
        let cid = parse_channel_id(channel_id)?;
        let messages = cid
            .messages(&*http, GetMessages::new().limit(limit))
            .await
            .map_err(DiscordError::from)?;
        Ok(messages.iter().map(MessageInfo::from).collect())
    }
}

#[async_trait]
impl ChatApi for Session {
    async fn message_get(&self, channel_id: &str, message_id: &str) -> Result<MessageInfo> {
        if self.fixture_mode() {
            return Ok(fixture_message(channel_id, message_id));
        }
        let http = self.http().await?;
        self.check_channel_allowed(&http, channel_id).await?;
        let cid = parse_channel_id(channel_id)?;
        let mid = parse_message_id(message_id)?;
        let message = http
            .get_message(cid, mid)
            .await
            .map_err(DiscordError::from)?;
        Ok(MessageInfo::from(&message))
    }

    async fn reaction_users(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<UserInfo>> {
        if self.fixture_mode() {
            return Ok(Vec::new());
        }
        let http = self.http().await?;
        self.check_channel_allowed(&http, channel_id).await?;
        let cid = parse_channel_id(channel_id)?;
        let mid = parse_message_id(message_id)?;
        let reaction = parse_emoji(emoji);

        let mut users = Vec::new();
        let mut after: Option<UserId> = None;
        loop {
            let page = cid
                .reaction_users(&*http, mid, reaction.clone(), Some(REACTION_PAGE), after)
                .await
                .map_err(DiscordError::from)?;
            let full_page = page.len() == REACTION_PAGE as usize;
            after = page.last().map(|u| u.id);
            users.extend(page.iter().map(UserInfo::from));
            if !full_page {
                break;
            }
        }
        debug!(channel_id, message_id, emoji, count = users.len(), "fetched reactors");
        Ok(users)
    }

    async fn message_send(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String> {
        if self.fixture_mode() {
            info!(channel_id, "DRY-RUN: send suppressed");
            return Ok(DRY_RUN_MESSAGE_ID.to_string());
        }
        let http = self.http().await?;
        self.check_channel_allowed(&http, channel_id).await?;
        if self.dry_run {
            info!(channel_id, chars = content.chars().count(), "DRY-RUN: send suppressed");
            return Ok(DRY_RUN_MESSAGE_ID.to_string());
        }

        let cid = parse_channel_id(channel_id)?;
        let mut builder = CreateMessage::new().content(content);
        if let Some(reply_id) = reply_to {
            let mid = parse_message_id(reply_id)?;
            builder = builder.reference_message(MessageReference::from((cid, mid)));
        }
        let message = cid
            .send_message(&*http, builder)
            .await
            .map_err(DiscordError::from)?;
        debug!(channel_id, message_id = %message.id, "message sent");
        Ok(message.id.to_string())
    }
}

// --- helpers ---------------------------------------------------------------

fn parse_snowflake(kind: &str, s: &str) -> Result<u64> {
    match s.parse::<u64>() {
        Ok(n) if n != 0 => Ok(n),
        _ => Err(DiscordError::InvalidId(format!("bad {kind} id: {s:?}"))),
    }
}

fn parse_channel_id(s: &str) -> Result<ChannelId> {
    parse_snowflake("channel", s).map(ChannelId::new)
}

fn parse_message_id(s: &str) -> Result<MessageId> {
    parse_snowflake("message", s).map(MessageId::new)
}

fn parse_guild_id(s: &str) -> Result<GuildId> {
    parse_snowflake("guild", s).map(GuildId::new)
}

fn fixture_channel(channel_id: &str) -> ChannelInfo {
    ChannelInfo {
        id: channel_id.to_string(),
        guild_id: None,
        name: "dry-run".to_string(),
        kind: "text".to_string(),
        topic: None,
    }
}

fn fixture_message(channel_id: &str, message_id: &str) -> MessageInfo {
    MessageInfo {
        id: message_id.to_string(),
        channel_id: channel_id.to_string(),
        author: UserInfo {
            id: "0".to_string(),
            username: "dry-run".to_string(),
            display_name: None,
            bot: false,
        },
        content: String::new(),
        timestamp: "1970-01-01T00:00:00Z".to_string(),
    }
}
