//! Campaign lifecycle: the durable create/read/update/delete surface.
//!
//! Thin over the store; `create_campaign` additionally verifies the signup
//! message actually exists before anything is persisted (under tokenless
//! DRY-RUN the session answers with a fixture, which skips the check in
//! effect).

use chrono::{DateTime, Utc};

use rollcall_discord::ChatApi;
use rollcall_store::{Campaign, CampaignStatus, OptIn, Store};

use crate::error::Result;

/// Register a message + emoji as a signup sheet.
///
/// On an existing (channel, message, emoji) triple the store reports
/// `Duplicate` carrying the surviving campaign id.
pub async fn create_campaign(
    store: &Store,
    chat: &(impl ChatApi + ?Sized),
    title: Option<&str>,
    channel_id: &str,
    message_id: &str,
    emoji: &str,
    remind_at: DateTime<Utc>,
) -> Result<Campaign> {
    chat.message_get(channel_id, message_id).await?;
    Ok(store.create_campaign(title, channel_id, message_id, emoji, remind_at)?)
}

pub fn get_campaign(store: &Store, id: i64) -> Result<Campaign> {
    Ok(store.get_campaign(id)?)
}

pub fn list_campaigns(store: &Store, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
    Ok(store.list_campaigns(status)?)
}

/// One cursor page of a campaign's opt-ins. Pass the last user id of the
/// previous page as `after_user_id` to continue the walk.
pub fn list_optins(
    store: &Store,
    campaign_id: i64,
    limit: u32,
    after_user_id: Option<&str>,
) -> Result<Vec<OptIn>> {
    // Existence check first so an unknown campaign is NotFound, not [].
    store.get_campaign(campaign_id)?;
    Ok(store.list_opt_ins(campaign_id, limit, after_user_id)?)
}

/// Apply a manual status change, validated against the state machine.
pub fn update_status(store: &Store, id: i64, status: CampaignStatus) -> Result<()> {
    Ok(store.set_status(id, status)?)
}

/// Hard-delete a campaign; opt-ins and reminder logs cascade.
pub fn delete_campaign(store: &Store, id: i64) -> Result<()> {
    Ok(store.delete_campaign(id)?)
}
