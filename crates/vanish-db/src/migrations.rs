use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- AUTOINCREMENT keeps message ids strictly increasing even after
        -- the reaper deletes the current maximum.
        CREATE TABLE IF NOT EXISTS messages (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id     TEXT NOT NULL REFERENCES users(id),
            recipient_id  TEXT NOT NULL REFERENCES users(id),
            body          TEXT,
            voice_path    TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (sender_id <> recipient_id),
            CHECK (body IS NOT NULL OR voice_path IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id);

        CREATE INDEX IF NOT EXISTS idx_messages_recipient
            ON messages(recipient_id);

        CREATE INDEX IF NOT EXISTS idx_messages_created_at
            ON messages(created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
