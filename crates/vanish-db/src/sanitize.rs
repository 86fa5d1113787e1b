use tracing::debug;

use crate::Database;
use crate::error::StoreError;

impl Database {
    /// Storage-engine sanitation after a deletion batch: force a WAL
    /// checkpoint that truncates the log, then VACUUM so freed pages of
    /// deleted rows are rewritten instead of lingering on disk. Skipped for
    /// in-memory databases, where there is nothing persistent to scrub.
    ///
    /// Callers treat a failure here as a soft warning, never as a failure of
    /// the deletion that preceded it.
    pub fn sanitize_storage(&self) -> Result<(), StoreError> {
        if !self.is_persistent() {
            debug!("Skipping storage sanitation for in-memory database");
            return Ok(());
        }

        self.with_conn(|conn| {
            // wal_checkpoint returns a status row; we only care that it ran.
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            conn.execute("VACUUM", [])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sanitation_is_noop() {
        let db = Database::open_in_memory().unwrap();
        db.sanitize_storage().unwrap();
    }

    #[test]
    fn file_backed_sanitation_checkpoints_and_vacuums() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("vanish.db")).unwrap();
        db.sanitize_storage().unwrap();
    }
}
