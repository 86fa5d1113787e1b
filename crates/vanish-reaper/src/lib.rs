use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use vanish_db::{Database, StoreError};
use vanish_types::config::ErasePolicy;
use vanish_vault::{Vault, eraser};

/// Outcome of one reaper cycle. Soft failures (wipe, vault delete,
/// sanitation) live here as counters and flags, structurally separate from
/// the hard `StoreError` a cycle can return — the two must never be
/// conflated.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleReport {
    /// Rows removed from the store.
    pub deleted: usize,
    /// Attachments whose vault delete failed (the rows were still removed).
    pub erasure_failures: usize,
    /// Whether the storage sanitation hook completed.
    pub sanitized: bool,
}

/// Deletes expired messages and scrubs their voice attachments.
///
/// One cycle is snapshot → wipe → delete → sanitize. The snapshot is taken
/// exactly once per cycle, so messages that become eligible while the cycle
/// runs are left for the next tick.
pub struct Reaper {
    db: Arc<Database>,
    vault: Arc<Vault>,
    policy: ErasePolicy,
}

impl Reaper {
    pub fn new(db: Arc<Database>, vault: Arc<Vault>, policy: ErasePolicy) -> Self {
        Self { db, vault, policy }
    }

    /// Run a single cycle. A `StoreError` from the snapshot or the batch
    /// delete aborts the cycle; it is retried wholesale on the next tick.
    pub async fn run_once(&self) -> Result<CycleReport, StoreError> {
        let threshold = Utc::now() - chrono::Duration::minutes(self.policy.ttl_minutes);
        let expired = self.db.find_expired_before(threshold)?;

        if expired.is_empty() {
            return Ok(CycleReport {
                sanitized: true,
                ..CycleReport::default()
            });
        }

        // Wipe before delete, per attachment: a reader racing the reaper
        // must only ever see random bytes, never plaintext next to a
        // tombstone.
        let mut erasure_failures = 0;
        for message in &expired {
            if let Some(reference) = &message.voice_path {
                eraser::wipe(&self.vault.resolve(reference), self.policy.wipe_passes).await;

                if let Err(e) = self.vault.delete(reference).await {
                    warn!("Failed to delete attachment {}: {}", reference, e);
                    erasure_failures += 1;
                }
            }
        }

        // One batch statement for the whole snapshot.
        let ids: Vec<i64> = expired.iter().map(|m| m.id).collect();
        let deleted = self.db.delete_by_ids(&ids)?;

        let sanitized = match self.db.sanitize_storage() {
            Ok(()) => true,
            Err(e) => {
                warn!("Storage sanitation failed: {}", e);
                false
            }
        };

        info!(
            "Pruned {} expired messages ({} attachment failures)",
            deleted, erasure_failures
        );

        Ok(CycleReport {
            deleted,
            erasure_failures,
            sanitized,
        })
    }

    /// Interval-driven loop. Single-flight by construction: the next tick is
    /// not taken until the current cycle finishes, and a delayed cycle
    /// pushes later ticks back rather than letting them pile up.
    pub async fn run_loop(self: Arc<Self>, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.run_once().await {
                Ok(report) if report.deleted > 0 => {
                    info!("Reaper cycle deleted {} messages", report.deleted);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Reaper cycle failed, retrying next tick: {}", e);
                }
            }
        }
    }
}
