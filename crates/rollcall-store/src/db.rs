use rusqlite::Connection;

use crate::error::Result;

/// Initialise the campaign schema in `conn`. Safe to call on every startup.
///
/// The composite UNIQUE on campaigns realises the one-campaign-per
/// (channel, message, emoji) rule; the one on opt_ins makes tally
/// idempotent. `(status, remind_at)` keeps the due-campaign poll cheap.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS campaigns (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT,
            channel_id  TEXT    NOT NULL,
            message_id  TEXT    NOT NULL,
            emoji       TEXT    NOT NULL,
            remind_at   TEXT    NOT NULL,   -- RFC 3339, UTC
            created_at  TEXT    NOT NULL,
            status      TEXT    NOT NULL DEFAULT 'active',
            UNIQUE(channel_id, message_id, emoji)
        ) STRICT;

        -- Due poll: SELECT … WHERE status = 'active' AND remind_at <= ?
        CREATE INDEX IF NOT EXISTS idx_campaigns_due
            ON campaigns (status, remind_at);

        CREATE TABLE IF NOT EXISTS opt_ins (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id INTEGER NOT NULL
                        REFERENCES campaigns(id) ON DELETE CASCADE,
            user_id     TEXT    NOT NULL,
            username    TEXT,
            tallied_at  TEXT    NOT NULL,
            UNIQUE(campaign_id, user_id)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_opt_ins_campaign
            ON opt_ins (campaign_id);
        CREATE INDEX IF NOT EXISTS idx_opt_ins_user
            ON opt_ins (user_id);

        CREATE TABLE IF NOT EXISTS reminder_logs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id     INTEGER NOT NULL
                            REFERENCES campaigns(id) ON DELETE CASCADE,
            sent_at         TEXT    NOT NULL,
            recipient_count INTEGER NOT NULL,
            message_chunks  INTEGER NOT NULL,
            success         INTEGER NOT NULL,   -- 0 or 1
            error_message   TEXT
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_logs_campaign
            ON reminder_logs (campaign_id);
        ",
    )?;
    Ok(())
}
