/// Database row types — these map directly to SQLite rows.
/// Distinct from the vanish-types API payloads to keep the DB layer
/// independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub sender_username: String,
    pub recipient_username: String,
    pub body: Option<String>,
    pub voice_path: Option<String>,
    pub created_at: String,
}

/// One entry of the reaper's expiry snapshot: just enough to wipe the
/// attachment and delete the row.
#[derive(Debug, Clone)]
pub struct ExpiredMessage {
    pub id: i64,
    pub voice_path: Option<String>,
}
