//! The tool surface: a static table of named tools and their dispatcher.
//!
//! Every result is an in-band payload: `{"success": true, "data": …}` or
//! `{"success": false, "errors": [{"kind", "message", …}]}`. Partial
//! progress (a broadcast that stopped mid-way) is reported in `data`
//! alongside the error entry.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use rollcall_discord::resolve::{resolve_channel, resolve_guild};
use rollcall_discord::ChatApi;
use rollcall_engine::{lifecycle, EngineError};
use rollcall_store::{CampaignStatus, StoreError};

use crate::context::Context;

/// Dispatch one tool call. Every handler establishes the Discord session
/// first; under tokenless DRY-RUN that is a no-op.
pub async fn execute_tool(ctx: &Context, name: &str, args: &Value) -> Value {
    if let Err(e) = ctx.session.ensure_connected().await {
        return fail(e.kind(), &e);
    }

    match name {
        "list_servers" => list_servers(ctx).await,
        "list_channels" => list_channels(ctx, args).await,
        "get_channel_info" => get_channel_info(ctx, args).await,
        "bot_status" => bot_status(ctx).await,
        "get_recent_messages" => get_recent_messages(ctx, args).await,
        "get_message" => get_message(ctx, args).await,
        "send_message" => send_message(ctx, args).await,
        "create_campaign" => create_campaign(ctx, args).await,
        "list_campaigns" => list_campaigns(ctx, args).await,
        "get_campaign" => get_campaign(ctx, args).await,
        "update_campaign_status" => update_campaign_status(ctx, args).await,
        "delete_campaign" => delete_campaign(ctx, args).await,
        "list_optins" => list_optins(ctx, args).await,
        "tally_optins" => tally_optins(ctx, args).await,
        "build_reminder" => build_reminder(ctx, args).await,
        "send_reminder" => send_reminder(ctx, args).await,
        "run_due_reminders" => run_due_reminders(ctx, args).await,
        other => fail("not_found", format!("unknown tool: {other}")),
    }
}

// --- Discord wrappers ------------------------------------------------------

async fn list_servers(ctx: &Context) -> Value {
    match ctx.session.guild_list().await {
        Ok(servers) => {
            let count = servers.len();
            ok(json!({ "servers": servers, "count": count }))
        }
        Err(e) => fail(e.kind(), &e),
    }
}

async fn list_channels(ctx: &Context, args: &Value) -> Value {
    let query = match require_str(args, "guild_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let guilds = match ctx.session.guild_list().await {
        Ok(g) => g,
        Err(e) => return fail(e.kind(), &e),
    };
    let Some(guild) = resolve_guild(&guilds, query) else {
        return fail("not_found", format!("no matching guild for {query:?}"));
    };

    match ctx.session.channels_list(&guild.id).await {
        Ok(mut channels) => {
            if let Some(kind) = opt_str(args, "type_filter") {
                channels.retain(|c| c.kind == kind);
            }
            let count = channels.len();
            ok(json!({ "guild": guild, "channels": channels, "count": count }))
        }
        Err(e) => fail(e.kind(), &e),
    }
}

async fn get_channel_info(ctx: &Context, args: &Value) -> Value {
    let query = match require_str(args, "channel_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let channel_id = match resolve_channel_query(ctx, query).await {
        Ok(id) => id,
        Err(e) => return e,
    };
    match ctx.session.channel_get(&channel_id).await {
        Ok(channel) => ok(json!({ "channel": channel })),
        Err(e) => fail(e.kind(), &e),
    }
}

/// Channel arguments accept a snowflake or a channel name; a name is
/// resolved fuzzily across the channels of every visible guild.
async fn resolve_channel_query(ctx: &Context, query: &str) -> Result<String, Value> {
    if !query.is_empty() && query.chars().all(|c| c.is_ascii_digit()) {
        return Ok(query.to_string());
    }

    let guilds = match ctx.session.guild_list().await {
        Ok(g) => g,
        Err(e) => return Err(fail(e.kind(), &e)),
    };
    let mut channels = Vec::new();
    for guild in &guilds {
        match ctx.session.channels_list(&guild.id).await {
            Ok(mut list) => channels.append(&mut list),
            Err(e) => return Err(fail(e.kind(), &e)),
        }
    }
    match resolve_channel(&channels, query) {
        Some(c) => Ok(c.id.clone()),
        None => Err(fail(
            "not_found",
            format!("no matching channel for {query:?}"),
        )),
    }
}

async fn bot_status(ctx: &Context) -> Value {
    let bot = match ctx.session.bot_user().await {
        Ok(b) => b,
        Err(e) => return fail(e.kind(), &e),
    };
    let guild_count = match ctx.session.guild_list().await {
        Ok(g) => g.len(),
        Err(e) => return fail(e.kind(), &e),
    };
    ok(json!({
        "connected": ctx.session.connected().await,
        "bot": bot,
        "guild_count": guild_count,
        "dry_run": ctx.session.is_dry_run(),
        "allowlist_size": ctx.session.allowlist().len(),
    }))
}

async fn get_recent_messages(ctx: &Context, args: &Value) -> Value {
    let query = match require_str(args, "channel_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let channel_id = match resolve_channel_query(ctx, query).await {
        Ok(id) => id,
        Err(e) => return e,
    };
    let limit = args
        .get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(10)
        .clamp(1, 100) as u8;

    match ctx.session.recent_messages(&channel_id, limit).await {
        Ok(messages) => {
            let count = messages.len();
            ok(json!({ "messages": messages, "count": count }))
        }
        Err(e) => fail(e.kind(), &e),
    }
}

async fn get_message(ctx: &Context, args: &Value) -> Value {
    let channel_id = match require_str(args, "channel_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let message_id = match require_str(args, "message_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ctx.session.message_get(channel_id, message_id).await {
        Ok(message) => ok(json!({ "message": message })),
        Err(e) => fail(e.kind(), &e),
    }
}

async fn send_message(ctx: &Context, args: &Value) -> Value {
    let channel_id = match require_str(args, "channel_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let content = match require_str(args, "content") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let reply_to = opt_str(args, "reply_to");

    match ctx.session.message_send(channel_id, content, reply_to).await {
        Ok(message_id) => ok(json!({
            "message_id": message_id,
            "dry_run": ctx.session.is_dry_run(),
        })),
        Err(e) => fail(e.kind(), &e),
    }
}

// --- campaign lifecycle ----------------------------------------------------

async fn create_campaign(ctx: &Context, args: &Value) -> Value {
    let channel_id = match require_str(args, "channel_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let message_id = match require_str(args, "message_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let emoji = match require_str(args, "emoji") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let remind_at = match require_str(args, "remind_at").and_then(|s| parse_time(s)) {
        Ok(t) => t,
        Err(e) => return e,
    };
    let title = opt_str(args, "title");

    match lifecycle::create_campaign(
        &ctx.store,
        &ctx.session,
        title,
        channel_id,
        message_id,
        emoji,
        remind_at,
    )
    .await
    {
        Ok(campaign) => ok(json!({ "campaign": campaign })),
        Err(EngineError::Store(StoreError::Duplicate { existing })) => json!({
            "success": false,
            "errors": [{
                "kind": "duplicate",
                "message": format!("campaign {existing} already tracks this message and emoji"),
                "existing_campaign_id": existing,
            }]
        }),
        Err(e) => fail(e.kind(), &e),
    }
}

async fn list_campaigns(ctx: &Context, args: &Value) -> Value {
    let status = match opt_str(args, "status_filter") {
        Some(s) => match s.parse::<CampaignStatus>() {
            Ok(status) => Some(status),
            Err(e) => return fail("invalid_argument", e),
        },
        None => None,
    };
    match lifecycle::list_campaigns(&ctx.store, status) {
        Ok(campaigns) => {
            let count = campaigns.len();
            ok(json!({ "campaigns": campaigns, "count": count }))
        }
        Err(e) => fail(e.kind(), &e),
    }
}

async fn get_campaign(ctx: &Context, args: &Value) -> Value {
    let id = match require_campaign_id(args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let campaign = match lifecycle::get_campaign(&ctx.store, id) {
        Ok(c) => c,
        Err(e) => return fail(e.kind(), &e),
    };
    let optin_count = match ctx.store.count_opt_ins(id) {
        Ok(n) => n,
        Err(e) => return store_fail(e),
    };
    let logs = match ctx.store.list_logs(id) {
        Ok(l) => l,
        Err(e) => return store_fail(e),
    };
    ok(json!({
        "campaign": campaign,
        "optin_count": optin_count,
        "reminder_logs": logs,
    }))
}

async fn update_campaign_status(ctx: &Context, args: &Value) -> Value {
    let id = match require_campaign_id(args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match require_str(args, "status") {
        Ok(s) => match s.parse::<CampaignStatus>() {
            Ok(status) => status,
            Err(e) => return fail("invalid_argument", e),
        },
        Err(e) => return e,
    };
    match lifecycle::update_status(&ctx.store, id, status) {
        Ok(()) => ok(json!({ "campaign_id": id, "status": status })),
        Err(e) => fail(e.kind(), &e),
    }
}

async fn delete_campaign(ctx: &Context, args: &Value) -> Value {
    let id = match require_campaign_id(args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match lifecycle::delete_campaign(&ctx.store, id) {
        Ok(()) => ok(json!({ "campaign_id": id, "deleted": true })),
        Err(e) => fail(e.kind(), &e),
    }
}

async fn list_optins(ctx: &Context, args: &Value) -> Value {
    let id = match require_campaign_id(args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = args
        .get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(100)
        .clamp(1, 1000) as u32;
    let after_user_id = opt_str(args, "after_user_id");

    let optins = match lifecycle::list_optins(&ctx.store, id, limit, after_user_id) {
        Ok(o) => o,
        Err(e) => return fail(e.kind(), &e),
    };
    let total = match ctx.store.count_opt_ins(id) {
        Ok(n) => n,
        Err(e) => return store_fail(e),
    };
    let count = optins.len();
    // Feed this back as after_user_id to fetch the next page.
    let next_after_user_id = optins.last().map(|o| o.user_id.clone());
    ok(json!({
        "optins": optins,
        "count": count,
        "total": total,
        "next_after_user_id": next_after_user_id,
    }))
}

// --- campaign engine -------------------------------------------------------

async fn tally_optins(ctx: &Context, args: &Value) -> Value {
    let id = match require_campaign_id(args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match rollcall_engine::tally(&ctx.store, &ctx.session, id).await {
        Ok(summary) => ok(json!({ "tally": summary })),
        Err(e) => fail(e.kind(), &e),
    }
}

async fn build_reminder(ctx: &Context, args: &Value) -> Value {
    let id = match require_campaign_id(args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let template = opt_str(args, "template");
    match rollcall_engine::build(&ctx.store, id, template) {
        Ok(broadcast) => {
            let chunk_count = broadcast.chunks.len();
            ok(json!({
                "chunks": broadcast.chunks,
                "chunk_count": chunk_count,
                "recipient_count": broadcast.recipient_count,
            }))
        }
        Err(e) => fail(e.kind(), &e),
    }
}

async fn send_reminder(ctx: &Context, args: &Value) -> Value {
    let id = match require_campaign_id(args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    // Safety default: a user-invoked send simulates unless told otherwise.
    let dry_run = args
        .get("dry_run")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    match rollcall_engine::send(&ctx.store, &ctx.session, &ctx.tuning, id, dry_run).await {
        Ok(summary) if summary.success => ok(json!({ "send": summary })),
        Ok(summary) => {
            let message = summary
                .error
                .clone()
                .unwrap_or_else(|| "broadcast stopped early".to_string());
            json!({
                "success": false,
                "data": { "send": summary },
                "errors": [{ "kind": "send_failed", "message": message }]
            })
        }
        Err(e) => fail(e.kind(), &e),
    }
}

async fn run_due_reminders(ctx: &Context, args: &Value) -> Value {
    let now = match opt_str(args, "now") {
        Some(s) => match parse_time(s) {
            Ok(t) => t,
            Err(e) => return e,
        },
        None => Utc::now(),
    };

    match rollcall_engine::run_due(&ctx.store, &ctx.session, &ctx.tuning, now).await {
        Ok(outcomes) => {
            let count = outcomes.len();
            ok(json!({ "outcomes": outcomes, "count": count }))
        }
        Err(e) => fail(e.kind(), &e),
    }
}

// --- payload helpers -------------------------------------------------------

fn ok(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

fn fail(kind: &str, message: impl std::fmt::Display) -> Value {
    json!({
        "success": false,
        "errors": [{ "kind": kind, "message": message.to_string() }]
    })
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, Value> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        fail(
            "invalid_argument",
            format!("missing required parameter: {key}"),
        )
    })
}

fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn require_campaign_id(args: &Value) -> Result<i64, Value> {
    args.get("campaign_id").and_then(Value::as_i64).ok_or_else(|| {
        fail(
            "invalid_argument",
            "missing required parameter: campaign_id",
        )
    })
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, Value> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            fail(
                "invalid_argument",
                format!("bad timestamp {s:?}: {e} (RFC 3339 required, e.g. 2026-08-01T18:00:00Z)"),
            )
        })
}

fn store_fail(e: StoreError) -> Value {
    let e = EngineError::from(e);
    fail(e.kind(), &e)
}

// --- tool table ------------------------------------------------------------

/// MCP tool definitions, one entry per handler above.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "list_servers",
            "description": "List the Discord servers the bot is a member of (restricted to the guild allowlist when one is configured).",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "list_channels",
            "description": "List the channels of a server. The server may be given by id or by (fuzzy) name.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "guild_id": {
                        "type": "string",
                        "description": "Server id, or a server name (exact, case-insensitive or unique substring)"
                    },
                    "type_filter": {
                        "type": "string",
                        "description": "Only return channels of this type (e.g. \"text\", \"voice\")"
                    }
                },
                "required": ["guild_id"]
            }
        }),
        json!({
            "name": "get_channel_info",
            "description": "Fetch one channel: name, type, topic and owning server.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "Channel id, or a channel name resolved across visible servers"
                    }
                },
                "required": ["channel_id"]
            }
        }),
        json!({
            "name": "bot_status",
            "description": "Report the bot identity, connection state, visible server count, DRY-RUN flag and allowlist size.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "get_recent_messages",
            "description": "Fetch the most recent messages of a channel, newest first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "Channel id, or a channel name resolved across visible servers"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "How many messages to fetch (1-100, default: 10)",
                        "default": 10
                    }
                },
                "required": ["channel_id"]
            }
        }),
        json!({
            "name": "get_message",
            "description": "Fetch a single message by channel and message id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "channel_id": { "type": "string", "description": "Channel id" },
                    "message_id": { "type": "string", "description": "Message id" }
                },
                "required": ["channel_id", "message_id"]
            }
        }),
        json!({
            "name": "send_message",
            "description": "Send a message to a channel, optionally as a reply. Suppressed under DRY-RUN (returns a synthetic message id).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "channel_id": { "type": "string", "description": "Channel id" },
                    "content": { "type": "string", "description": "Message text" },
                    "reply_to": { "type": "string", "description": "Message id to reply to" }
                },
                "required": ["channel_id", "content"]
            }
        }),
        json!({
            "name": "create_campaign",
            "description": "Register a message + emoji as a reminder signup sheet. Users who react with the emoji are tallied as opt-ins; at remind_at they are mentioned in a reminder broadcast.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Campaign label, rendered into the reminder header" },
                    "channel_id": { "type": "string", "description": "Channel containing the signup message" },
                    "message_id": { "type": "string", "description": "The signup message to watch" },
                    "emoji": {
                        "type": "string",
                        "description": "Tracked emoji: a Unicode emoji, or name:id for a custom emoji"
                    },
                    "remind_at": {
                        "type": "string",
                        "description": "When to send the reminder, RFC 3339 UTC (e.g. 2026-08-01T18:00:00Z)"
                    }
                },
                "required": ["channel_id", "message_id", "emoji", "remind_at"]
            }
        }),
        json!({
            "name": "list_campaigns",
            "description": "List reminder campaigns, optionally filtered by status.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "status_filter": {
                        "type": "string",
                        "description": "Only return campaigns in this state",
                        "enum": ["active", "completed", "cancelled"]
                    }
                }
            }
        }),
        json!({
            "name": "get_campaign",
            "description": "Fetch one campaign with its opt-in count and broadcast history.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "integer", "description": "Campaign id" }
                },
                "required": ["campaign_id"]
            }
        }),
        json!({
            "name": "update_campaign_status",
            "description": "Change a campaign's status. Allowed: active -> completed/cancelled/deleted, cancelled -> active, completed -> deleted. A transition to deleted removes the campaign and everything attached to it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "integer", "description": "Campaign id" },
                    "status": {
                        "type": "string",
                        "enum": ["active", "completed", "cancelled", "deleted"]
                    }
                },
                "required": ["campaign_id", "status"]
            }
        }),
        json!({
            "name": "delete_campaign",
            "description": "Delete a campaign. Its opt-ins and reminder logs are removed with it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "integer", "description": "Campaign id" }
                },
                "required": ["campaign_id"]
            }
        }),
        json!({
            "name": "list_optins",
            "description": "List a campaign's recorded opt-ins, in signup order.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "integer", "description": "Campaign id" },
                    "limit": {
                        "type": "integer",
                        "description": "Page size (1-1000, default: 100)",
                        "default": 100
                    },
                    "after_user_id": {
                        "type": "string",
                        "description": "Keyset cursor: return opt-ins recorded after this user's row (use next_after_user_id from the previous page)"
                    }
                },
                "required": ["campaign_id"]
            }
        }),
        json!({
            "name": "tally_optins",
            "description": "Read the signup message's current reactions and record every non-bot reactor as an opt-in. Idempotent: users already recorded are counted as existing.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "integer", "description": "Campaign id" }
                },
                "required": ["campaign_id"]
            }
        }),
        json!({
            "name": "build_reminder",
            "description": "Assemble the reminder broadcast without sending it: ordered message chunks (each within Discord's 2000-character ceiling) mentioning every opt-in.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "integer", "description": "Campaign id" },
                    "template": {
                        "type": "string",
                        "description": "Header template; {title}, {total_optins} and {mentions} are substituted"
                    }
                },
                "required": ["campaign_id"]
            }
        }),
        json!({
            "name": "send_reminder",
            "description": "Send a campaign's reminder broadcast. dry_run defaults to TRUE: pass dry_run=false to actually post. A full broadcast marks the campaign completed.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "integer", "description": "Campaign id" },
                    "dry_run": {
                        "type": "boolean",
                        "description": "Simulate without posting (default: true)",
                        "default": true
                    }
                },
                "required": ["campaign_id"]
            }
        }),
        json!({
            "name": "run_due_reminders",
            "description": "Run every active campaign whose remind_at has passed: tally, then broadcast, soonest first. Intended to be invoked on an external schedule (e.g. cron).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "now": {
                        "type": "string",
                        "description": "Override the reference time, RFC 3339 UTC (default: current time)"
                    }
                }
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::Config;
    use rollcall_engine::EngineTuning;
    use rollcall_store::Store;

    /// Context in tokenless DRY-RUN: no network, fixture reads, suppressed
    /// writes. Exercises the full tool dispatch path.
    fn dry_run_ctx() -> Context {
        let config = Config {
            dry_run: true,
            ..Config::default()
        };
        let store = Store::open_in_memory().unwrap();
        let mut ctx = Context::new(config, store);
        ctx.tuning = EngineTuning::instant();
        ctx
    }

    fn create_args() -> Value {
        json!({
            "title": "game night",
            "channel_id": "100",
            "message_id": "200",
            "emoji": "✅",
            "remind_at": "2026-08-01T18:00:00Z"
        })
    }

    #[tokio::test]
    async fn every_defined_tool_has_a_handler() {
        let ctx = dry_run_ctx();
        for def in tool_definitions() {
            let name = def["name"].as_str().unwrap();
            let result = execute_tool(&ctx, name, &json!({})).await;
            let errors = result["errors"].as_array();
            // Unknown-tool is the one failure we must never see here.
            if let Some(errors) = errors {
                for e in errors {
                    let msg = e["message"].as_str().unwrap_or("");
                    assert!(
                        !msg.starts_with("unknown tool"),
                        "{name} fell through dispatch"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let ctx = dry_run_ctx();
        let result = execute_tool(&ctx, "frobnicate", &json!({})).await;
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn campaign_round_trip_over_tools() {
        let ctx = dry_run_ctx();

        let created = execute_tool(&ctx, "create_campaign", &create_args()).await;
        assert_eq!(created["success"], json!(true), "{created}");
        let id = created["data"]["campaign"]["id"].as_i64().unwrap();

        // Duplicate triple is reported with the surviving id.
        let dup = execute_tool(&ctx, "create_campaign", &create_args()).await;
        assert_eq!(dup["success"], json!(false));
        assert_eq!(dup["errors"][0]["kind"], json!("duplicate"));
        assert_eq!(dup["errors"][0]["existing_campaign_id"], json!(id));

        let listed = execute_tool(&ctx, "list_campaigns", &json!({})).await;
        assert_eq!(listed["data"]["count"], json!(1));

        // Fixture reactions are empty: tally records nothing.
        let tallied =
            execute_tool(&ctx, "tally_optins", &json!({ "campaign_id": id })).await;
        assert_eq!(tallied["success"], json!(true));
        assert_eq!(tallied["data"]["tally"]["total"], json!(0));

        // Committed empty policy: no chunks for an empty roster.
        let built =
            execute_tool(&ctx, "build_reminder", &json!({ "campaign_id": id })).await;
        assert_eq!(built["data"]["chunk_count"], json!(0));

        // send_reminder defaults to dry_run and logs a zero-chunk attempt.
        let sent = execute_tool(&ctx, "send_reminder", &json!({ "campaign_id": id })).await;
        assert_eq!(sent["success"], json!(true));
        assert_eq!(sent["data"]["send"]["chunks_sent"], json!(0));

        let fetched = execute_tool(&ctx, "get_campaign", &json!({ "campaign_id": id })).await;
        assert_eq!(fetched["data"]["campaign"]["status"], json!("active"));
        assert_eq!(
            fetched["data"]["reminder_logs"].as_array().unwrap().len(),
            1
        );

        let deleted =
            execute_tool(&ctx, "delete_campaign", &json!({ "campaign_id": id })).await;
        assert_eq!(deleted["success"], json!(true));
        let listed = execute_tool(&ctx, "list_campaigns", &json!({})).await;
        assert_eq!(listed["data"]["count"], json!(0));
    }

    #[tokio::test]
    async fn optin_pages_follow_the_cursor() {
        let ctx = dry_run_ctx();
        let created = execute_tool(&ctx, "create_campaign", &create_args()).await;
        let id = created["data"]["campaign"]["id"].as_i64().unwrap();
        for u in ["11", "22", "33"] {
            ctx.store.upsert_opt_in(id, u, None).unwrap();
        }

        let first =
            execute_tool(&ctx, "list_optins", &json!({ "campaign_id": id, "limit": 2 })).await;
        assert_eq!(first["data"]["count"], json!(2));
        assert_eq!(first["data"]["total"], json!(3));
        assert_eq!(first["data"]["next_after_user_id"], json!("22"));

        let second = execute_tool(
            &ctx,
            "list_optins",
            &json!({ "campaign_id": id, "limit": 2, "after_user_id": "22" }),
        )
        .await;
        assert_eq!(second["data"]["count"], json!(1));
        assert_eq!(second["data"]["optins"][0]["user_id"], json!("33"));
    }

    #[tokio::test]
    async fn status_updates_respect_the_state_machine() {
        let ctx = dry_run_ctx();
        let created = execute_tool(&ctx, "create_campaign", &create_args()).await;
        let id = created["data"]["campaign"]["id"].as_i64().unwrap();

        let ok = execute_tool(
            &ctx,
            "update_campaign_status",
            &json!({ "campaign_id": id, "status": "cancelled" }),
        )
        .await;
        assert_eq!(ok["success"], json!(true));

        let bad = execute_tool(
            &ctx,
            "update_campaign_status",
            &json!({ "campaign_id": id, "status": "completed" }),
        )
        .await;
        assert_eq!(bad["success"], json!(false));
        assert_eq!(bad["errors"][0]["kind"], json!("invalid_state"));
    }

    #[tokio::test]
    async fn bot_status_reports_dry_run() {
        let ctx = dry_run_ctx();
        let status = execute_tool(&ctx, "bot_status", &json!({})).await;
        assert_eq!(status["success"], json!(true));
        assert_eq!(status["data"]["dry_run"], json!(true));
        assert_eq!(status["data"]["connected"], json!(true));
    }

    #[tokio::test]
    async fn invalid_timestamp_is_an_argument_error() {
        let ctx = dry_run_ctx();
        let mut args = create_args();
        args["remind_at"] = json!("tomorrow at noon");
        let result = execute_tool(&ctx, "create_campaign", &args).await;
        assert_eq!(result["success"], json!(false));
        assert_eq!(result["errors"][0]["kind"], json!("invalid_argument"));
    }
}
