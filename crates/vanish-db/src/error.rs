use thiserror::Error;

/// Errors the Message Store can surface. `Validation` never reaches SQLite;
/// everything the engine rejects comes back as `Sqlite`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn validation(field: &'static str, message: &'static str) -> Self {
        Self::Validation { field, message }
    }
}
