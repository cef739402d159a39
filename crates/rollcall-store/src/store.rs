use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{Campaign, CampaignStatus, OptIn, ReminderLog, UpsertOutcome};

/// Durable campaign state.
///
/// Wraps a single SQLite connection behind a mutex; each public method is one
/// atomic transaction. Callers never hold a lock across calls;
/// there is no long-lived transaction handle to leak across await points.
pub struct Store {
    db: Mutex<Connection>,
}

const CAMPAIGN_COLS: &str = "id, title, channel_id, message_id, emoji, remind_at, created_at, status";

impl Store {
    /// Open (creating if missing) the database at `path` and apply migrations.
    pub fn open(path: &str) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=3000;",
        )?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    // --- campaigns ---------------------------------------------------------

    /// Insert a new campaign in `active` state.
    ///
    /// Returns `Duplicate` (carrying the surviving row id) when another
    /// campaign already tracks the same (channel, message, emoji) triple.
    pub fn create_campaign(
        &self,
        title: Option<&str>,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        remind_at: DateTime<Utc>,
    ) -> Result<Campaign> {
        let db = self.db.lock().unwrap();
        let res = db.execute(
            "INSERT INTO campaigns (title, channel_id, message_id, emoji, remind_at, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active')",
            params![
                title,
                channel_id,
                message_id,
                emoji,
                fmt_ts(remind_at),
                fmt_ts(Utc::now())
            ],
        );

        match res {
            Ok(_) => {
                let id = db.last_insert_rowid();
                info!(campaign_id = id, channel_id, message_id, emoji, "campaign created");
                get_campaign_conn(&db, id)
            }
            Err(e) if is_unique_violation(&e) => {
                let existing: Option<i64> = db
                    .query_row(
                        "SELECT id FROM campaigns
                         WHERE channel_id = ?1 AND message_id = ?2 AND emoji = ?3",
                        params![channel_id, message_id, emoji],
                        |row| row.get(0),
                    )
                    .optional()?;
                match existing {
                    Some(existing) => Err(StoreError::Duplicate { existing }),
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_campaign(&self, id: i64) -> Result<Campaign> {
        let db = self.db.lock().unwrap();
        get_campaign_conn(&db, id)
    }

    /// All campaigns, optionally filtered by status, oldest first.
    pub fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        let db = self.db.lock().unwrap();
        let (sql, args) = match status {
            Some(s) => (
                format!("SELECT {CAMPAIGN_COLS} FROM campaigns WHERE status = ?1 ORDER BY id"),
                vec![s.to_string()],
            ),
            None => (
                format!("SELECT {CAMPAIGN_COLS} FROM campaigns ORDER BY id"),
                vec![],
            ),
        };
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), read_campaign_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(campaign_from_parts).collect()
    }

    /// Change a campaign's status, enforcing the state machine.
    ///
    /// A transition to `deleted` is a hard row-delete (cascades); the
    /// tombstone value is never written to disk.
    pub fn set_status(&self, id: i64, next: CampaignStatus) -> Result<()> {
        let db = self.db.lock().unwrap();
        let current: Option<String> = db
            .query_row("SELECT status FROM campaigns WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(current) = current else {
            return Err(StoreError::NotFound { id });
        };
        let from: CampaignStatus = current.parse().map_err(StoreError::Corrupt)?;
        if !from.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { from, to: next });
        }

        if next == CampaignStatus::Deleted {
            db.execute("DELETE FROM campaigns WHERE id = ?1", [id])?;
        } else {
            db.execute(
                "UPDATE campaigns SET status = ?1 WHERE id = ?2",
                params![next.to_string(), id],
            )?;
        }
        info!(campaign_id = id, from = %from, to = %next, "campaign status changed");
        Ok(())
    }

    /// Hard-delete a campaign; opt-ins and logs cascade.
    pub fn delete_campaign(&self, id: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM campaigns WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound { id });
        }
        info!(campaign_id = id, "campaign deleted");
        Ok(())
    }

    /// Active campaigns whose remind_at has passed, soonest first.
    pub fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {CAMPAIGN_COLS} FROM campaigns
             WHERE status = 'active' AND remind_at <= ?1
             ORDER BY remind_at"
        ))?;
        let rows = stmt
            .query_map([fmt_ts(now)], read_campaign_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(campaign_from_parts).collect()
    }

    // --- opt-ins -----------------------------------------------------------

    /// Record a user's opt-in. Idempotent: a repeat (campaign, user) pair
    /// leaves the existing row (and its username) untouched.
    pub fn upsert_opt_in(
        &self,
        campaign_id: i64,
        user_id: &str,
        username: Option<&str>,
    ) -> Result<UpsertOutcome> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "INSERT INTO opt_ins (campaign_id, user_id, username, tallied_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(campaign_id, user_id) DO NOTHING",
            params![campaign_id, user_id, username, fmt_ts(Utc::now())],
        )?;
        Ok(if n == 0 {
            UpsertOutcome::Existing
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// One page of a campaign's opt-ins in insertion order, starting after
    /// the row of `after_user_id`.
    ///
    /// Keyset pagination: rows written by a concurrent tally land at higher
    /// ids, so a page walk in progress neither skips nor repeats entries.
    /// An unknown cursor reads from the start.
    pub fn list_opt_ins(
        &self,
        campaign_id: i64,
        limit: u32,
        after_user_id: Option<&str>,
    ) -> Result<Vec<OptIn>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, campaign_id, user_id, username, tallied_at
             FROM opt_ins
             WHERE campaign_id = ?1
               AND id > COALESCE(
                     (SELECT id FROM opt_ins
                      WHERE campaign_id = ?1 AND user_id = ?2), 0)
             ORDER BY id LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![campaign_id, after_user_id, limit], read_opt_in_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(opt_in_from_parts).collect()
    }

    /// The full roster, insertion order. Used by the reminder builder.
    pub fn all_opt_ins(&self, campaign_id: i64) -> Result<Vec<OptIn>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, campaign_id, user_id, username, tallied_at
             FROM opt_ins WHERE campaign_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([campaign_id], read_opt_in_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(opt_in_from_parts).collect()
    }

    pub fn count_opt_ins(&self, campaign_id: i64) -> Result<u32> {
        let db = self.db.lock().unwrap();
        let n: u32 = db.query_row(
            "SELECT COUNT(*) FROM opt_ins WHERE campaign_id = ?1",
            [campaign_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    // --- reminder log ------------------------------------------------------

    /// Append one audit row for a broadcast attempt.
    #[allow(clippy::too_many_arguments)]
    pub fn append_log(
        &self,
        campaign_id: i64,
        sent_at: DateTime<Utc>,
        recipient_count: u32,
        message_chunks: u32,
        success: bool,
        error_message: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO reminder_logs
             (campaign_id, sent_at, recipient_count, message_chunks, success, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                campaign_id,
                fmt_ts(sent_at),
                recipient_count,
                message_chunks,
                success as i64,
                error_message
            ],
        )?;
        Ok(())
    }

    /// Broadcast history for one campaign, oldest first.
    pub fn list_logs(&self, campaign_id: i64) -> Result<Vec<ReminderLog>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, campaign_id, sent_at, recipient_count, message_chunks, success, error_message
             FROM reminder_logs WHERE campaign_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([campaign_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(
                |(id, campaign_id, sent_at, recipient_count, message_chunks, success, error_message)| {
                    Ok(ReminderLog {
                        id,
                        campaign_id,
                        sent_at: parse_ts(&sent_at)?,
                        recipient_count,
                        message_chunks,
                        success: success != 0,
                        error_message,
                    })
                },
            )
            .collect()
    }
}

// --- row plumbing ----------------------------------------------------------

type CampaignRow = (
    i64,
    Option<String>,
    String,
    String,
    String,
    String,
    String,
    String,
);

fn read_campaign_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok((
        row.get(0)?, // id
        row.get(1)?, // title
        row.get(2)?, // channel_id
        row.get(3)?, // message_id
        row.get(4)?, // emoji
        row.get(5)?, // remind_at
        row.get(6)?, // created_at
        row.get(7)?, // status
    ))
}

fn campaign_from_parts(parts: CampaignRow) -> Result<Campaign> {
    let (id, title, channel_id, message_id, emoji, remind_at, created_at, status) = parts;
    Ok(Campaign {
        id,
        title,
        channel_id,
        message_id,
        emoji,
        remind_at: parse_ts(&remind_at)?,
        created_at: parse_ts(&created_at)?,
        status: status.parse().map_err(StoreError::Corrupt)?,
    })
}

fn get_campaign_conn(db: &Connection, id: i64) -> Result<Campaign> {
    let row = db
        .query_row(
            &format!("SELECT {CAMPAIGN_COLS} FROM campaigns WHERE id = ?1"),
            [id],
            read_campaign_row,
        )
        .optional()?;
    match row {
        Some(parts) => campaign_from_parts(parts),
        None => Err(StoreError::NotFound { id }),
    }
}

type OptInRow = (i64, i64, String, Option<String>, String);

fn read_opt_in_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OptInRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn opt_in_from_parts(parts: OptInRow) -> Result<OptIn> {
    let (id, campaign_id, user_id, username, tallied_at) = parts;
    Ok(OptIn {
        id,
        campaign_id,
        user_id,
        username,
        tallied_at: parse_ts(&tallied_at)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Canonical timestamp format. One fixed shape (second precision, `Z`
/// suffix) so lexicographic comparison in SQL equals chronological order.
fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}
