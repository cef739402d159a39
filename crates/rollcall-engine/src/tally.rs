use serde::Serialize;
use tracing::info;

use rollcall_discord::ChatApi;
use rollcall_store::{Store, UpsertOutcome};

use crate::error::Result;

/// Result of reconciling a campaign's current reactors into the opt-in set.
#[derive(Debug, Clone, Serialize)]
pub struct TallySummary {
    pub campaign_id: i64,
    pub total: u32,
    pub new_optins: u32,
    pub existing_optins: u32,
}

/// Read the tracked message's current reactors and persist every non-bot
/// user as an opt-in.
///
/// Idempotent in the store: re-running against unchanged reactions reports
/// `new_optins = 0` and leaves every existing row (username included)
/// untouched. Emoji equality is byte-for-byte against the stored token.
pub async fn tally(
    store: &Store,
    chat: &(impl ChatApi + ?Sized),
    campaign_id: i64,
) -> Result<TallySummary> {
    let campaign = store.get_campaign(campaign_id)?;

    // The tracked message must still exist before we read its reactions.
    chat.message_get(&campaign.channel_id, &campaign.message_id)
        .await?;

    let reactors = chat
        .reaction_users(&campaign.channel_id, &campaign.message_id, &campaign.emoji)
        .await?;

    let mut new_optins = 0u32;
    let mut existing_optins = 0u32;
    for user in reactors.iter().filter(|u| !u.bot) {
        match store.upsert_opt_in(campaign_id, &user.id, Some(user.label()))? {
            UpsertOutcome::Inserted => new_optins += 1,
            UpsertOutcome::Existing => existing_optins += 1,
        }
    }

    info!(
        campaign_id,
        new = new_optins,
        existing = existing_optins,
        "tally complete"
    );
    Ok(TallySummary {
        campaign_id,
        total: new_optins + existing_optins,
        new_optins,
        existing_optins,
    })
}
