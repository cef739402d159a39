use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a reminder campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Counting opt-ins, waiting for its remind_at time.
    Active,
    /// The reminder broadcast went out in full.
    Completed,
    /// Paused by an operator; can be reactivated.
    Cancelled,
    /// Removed. Terminal; rows never persist this state, it only
    /// participates in transition validation.
    Deleted,
}

impl CampaignStatus {
    /// Whether `self -> next` is a legal status transition.
    ///
    /// Allowed: active -> completed | cancelled | deleted,
    /// cancelled -> active, completed -> deleted.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Active, Completed)
                | (Active, Cancelled)
                | (Active, Deleted)
                | (Cancelled, Active)
                | (Completed, Deleted)
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
            CampaignStatus::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(CampaignStatus::Active),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            "deleted" => Ok(CampaignStatus::Deleted),
            other => Err(format!("unknown campaign status: {other}")),
        }
    }
}

/// A reminder campaign: one Discord message + emoji pair with a fire time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Row id (primary key).
    pub id: i64,
    /// Optional human-readable label, rendered into the reminder header.
    pub title: Option<String>,
    /// Discord channel snowflake, exactly as Discord reports it.
    pub channel_id: String,
    /// Discord message snowflake of the signup sheet.
    pub message_id: String,
    /// Tracked emoji: a Unicode emoji or a custom token of form `name:id`.
    pub emoji: String,
    /// When the reminder broadcast becomes due (UTC).
    pub remind_at: DateTime<Utc>,
    /// Creation time (UTC).
    pub created_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: CampaignStatus,
}

/// One user's recorded participation in one campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptIn {
    pub id: i64,
    pub campaign_id: i64,
    /// Discord user snowflake as a string.
    pub user_id: String,
    /// Display name at tally time; informational, never refreshed.
    pub username: Option<String>,
    pub tallied_at: DateTime<Utc>,
}

/// Audit entry for one broadcast attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderLog {
    pub id: i64,
    pub campaign_id: i64,
    pub sent_at: DateTime<Utc>,
    /// Opt-ins at send time.
    pub recipient_count: u32,
    /// Chunks actually sent (or dry-run-simulated) before the attempt ended.
    pub message_chunks: u32,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Result of an opt-in upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was written.
    Inserted,
    /// The (campaign, user) pair was already recorded.
    Existing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            CampaignStatus::Active,
            CampaignStatus::Completed,
            CampaignStatus::Cancelled,
            CampaignStatus::Deleted,
        ] {
            assert_eq!(CampaignStatus::from_str(&s.to_string()).unwrap(), s);
        }
        assert!(CampaignStatus::from_str("archived").is_err());
    }

    #[test]
    fn transition_table_matches_state_machine() {
        use CampaignStatus::*;

        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Deleted));
        assert!(Cancelled.can_transition_to(Active));
        assert!(Completed.can_transition_to(Deleted));

        // Everything else is rejected.
        assert!(!Completed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Deleted));
        assert!(!Deleted.can_transition_to(Active));
        assert!(!Deleted.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Active));
    }
}
