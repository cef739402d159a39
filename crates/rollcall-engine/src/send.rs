use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use rollcall_discord::{ChatApi, DiscordError};
use rollcall_store::{CampaignStatus, Store};

use crate::build;
use crate::config::EngineTuning;
use crate::error::Result;

/// Outcome of one broadcast attempt. `success = false` carries the partial
/// progress counters; the audit row is written either way.
#[derive(Debug, Clone, Serialize)]
pub struct SendSummary {
    pub campaign_id: i64,
    pub recipient_count: u32,
    /// Chunks dispatched (or dry-run-simulated) before the attempt ended.
    pub chunks_sent: u32,
    pub chunk_total: u32,
    pub success: bool,
    pub dry_run: bool,
    pub error: Option<String>,
}

/// Send a campaign's reminder broadcast.
///
/// Chunks go out strictly in order with [`EngineTuning::inter_chunk_delay`]
/// between them. A rate-limited chunk is retried a bounded number of times,
/// honouring Discord's retry-after when given. Exactly one reminder-log row
/// is appended per invocation; the campaign moves to `completed` only after
/// a full, non-empty broadcast.
///
/// A failed broadcast leaves the campaign `active`; re-sending restarts
/// from chunk 0 (at-least-once delivery).
pub async fn send(
    store: &Store,
    chat: &(impl ChatApi + ?Sized),
    tuning: &EngineTuning,
    campaign_id: i64,
    dry_run: bool,
) -> Result<SendSummary> {
    let campaign = store.get_campaign(campaign_id)?;
    let broadcast = build::build(store, campaign_id, None)?;
    let chunk_total = broadcast.chunks.len() as u32;

    if broadcast.chunks.is_empty() {
        store.append_log(campaign_id, Utc::now(), 0, 0, true, None)?;
        info!(campaign_id, "no opt-ins; nothing to send");
        return Ok(SendSummary {
            campaign_id,
            recipient_count: 0,
            chunks_sent: 0,
            chunk_total: 0,
            success: true,
            dry_run,
            error: None,
        });
    }

    let mut sent = 0u32;
    for (i, chunk) in broadcast.chunks.iter().enumerate() {
        if let Err(e) = send_chunk(chat, tuning, &campaign.channel_id, chunk, dry_run).await {
            let message = e.to_string();
            warn!(campaign_id, chunks_sent = sent, "broadcast failed: {message}");
            store.append_log(
                campaign_id,
                Utc::now(),
                broadcast.recipient_count,
                sent,
                false,
                Some(&message),
            )?;
            return Ok(SendSummary {
                campaign_id,
                recipient_count: broadcast.recipient_count,
                chunks_sent: sent,
                chunk_total,
                success: false,
                dry_run,
                error: Some(message),
            });
        }
        sent += 1;
        if i + 1 < broadcast.chunks.len() {
            tokio::time::sleep(tuning.inter_chunk_delay).await;
        }
    }

    store.append_log(
        campaign_id,
        Utc::now(),
        broadcast.recipient_count,
        sent,
        true,
        None,
    )?;
    if campaign.status == CampaignStatus::Active {
        store.set_status(campaign_id, CampaignStatus::Completed)?;
    }
    info!(
        campaign_id,
        chunks = sent,
        recipients = broadcast.recipient_count,
        dry_run,
        "broadcast complete"
    );
    Ok(SendSummary {
        campaign_id,
        recipient_count: broadcast.recipient_count,
        chunks_sent: sent,
        chunk_total,
        success: true,
        dry_run,
        error: None,
    })
}

/// Dispatch one chunk, retrying only on rate limits.
async fn send_chunk(
    chat: &(impl ChatApi + ?Sized),
    tuning: &EngineTuning,
    channel_id: &str,
    content: &str,
    dry_run: bool,
) -> std::result::Result<(), DiscordError> {
    if dry_run {
        debug!(channel_id, chars = content.chars().count(), "dry-run chunk");
        return Ok(());
    }

    let mut attempts = 0u32;
    loop {
        match chat.message_send(channel_id, content, None).await {
            Ok(_) => return Ok(()),
            Err(DiscordError::RateLimited { retry_after })
                if attempts < tuning.max_rate_limit_retries =>
            {
                attempts += 1;
                let wait = retry_after
                    .map(Duration::from_secs_f64)
                    .unwrap_or(tuning.rate_limit_backoff);
                warn!(channel_id, attempt = attempts, ?wait, "rate limited; retrying chunk");
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}
