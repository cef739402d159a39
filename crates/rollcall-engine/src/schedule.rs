use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use rollcall_discord::ChatApi;
use rollcall_store::Store;

use crate::config::EngineTuning;
use crate::error::Result;
use crate::send::{send, SendSummary};
use crate::tally::{tally, TallySummary};

/// Per-campaign result of one scheduler tick.
#[derive(Debug, Clone, Serialize)]
pub struct DueOutcome {
    pub campaign_id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<TallySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send: Option<SendSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run every due campaign: tally, then broadcast, soonest first.
///
/// Due-ness is purely a function of persistent state, so a crashed tick is
/// retried wholesale by the next one; the engine keeps no timer of its own.
/// A failed tally is recorded but does not suppress the broadcast; the
/// opt-ins already persisted are authoritative. Campaigns are processed
/// strictly one at a time with [`EngineTuning::inter_campaign_delay`]
/// between them.
pub async fn run_due(
    store: &Store,
    chat: &(impl ChatApi + ?Sized),
    tuning: &EngineTuning,
    now: DateTime<Utc>,
) -> Result<Vec<DueOutcome>> {
    let due = store.list_due(now)?;
    if due.is_empty() {
        return Ok(Vec::new());
    }
    info!(count = due.len(), "running due campaigns");

    let mut outcomes = Vec::with_capacity(due.len());
    for (i, campaign) in due.iter().enumerate() {
        let mut outcome = DueOutcome {
            campaign_id: campaign.id,
            success: false,
            tally: None,
            tally_error: None,
            send: None,
            error: None,
        };

        match tally(store, chat, campaign.id).await {
            Ok(t) => outcome.tally = Some(t),
            Err(e) => {
                warn!(campaign_id = campaign.id, "due tally failed: {e}");
                outcome.tally_error = Some(e.to_string());
            }
        }

        match send(store, chat, tuning, campaign.id, false).await {
            Ok(s) => {
                outcome.success = s.success;
                outcome.send = Some(s);
            }
            Err(e) => {
                warn!(campaign_id = campaign.id, "due send failed: {e}");
                outcome.error = Some(e.to_string());
            }
        }
        outcomes.push(outcome);

        if i + 1 < due.len() {
            tokio::time::sleep(tuning.inter_campaign_delay).await;
        }
    }
    Ok(outcomes)
}
