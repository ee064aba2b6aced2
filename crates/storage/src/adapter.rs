use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use quest_core::model::{UserProgress, merge_achievements};
use quest_core::time::format_timestamp;
use quest_core::{Catalog, Clock};

use crate::record::{Envelope, SCHEMA_VERSION, StoredProgress};
use crate::repository::{KeyValueStore, StorageError};
use crate::validate::validate_progress_value;

/// Primary persistence key for the progress snapshot.
pub const STORAGE_KEY: &str = "prompt-engineering-progress";

const QUARANTINE_INFIX: &str = "_corrupted_";

/// Storage health snapshot for maintenance tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDiagnostics {
    pub primary_exists: bool,
    pub primary_parses: bool,
    pub primary_bytes: usize,
    pub quarantined_backups: usize,
}

/// Reads and writes the persisted progress snapshot.
///
/// All failure modes collapse to `None`/`false` here — nothing a collaborator
/// calls can fail loudly. Unparseable text is quarantined under a timestamped
/// backup key before falling back, and a quota-exhausted write prunes those
/// backups and retries once. No business rules live in this layer.
pub struct ProgressStore {
    store: Arc<dyn KeyValueStore>,
    catalog: Catalog,
    clock: Clock,
    key: String,
}

impl ProgressStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, catalog: Catalog) -> Self {
        Self {
            store,
            catalog,
            clock: Clock::default(),
            key: STORAGE_KEY.to_owned(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the persistence key (isolated test instances).
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Restores the persisted snapshot, reconciled against the catalog.
    ///
    /// Returns `None` on a fresh install and on every failure mode:
    /// unreadable backend, unparseable text (quarantined first), schema
    /// mismatch, validation failure. Never panics, never hangs.
    pub async fn load(&self) -> Option<UserProgress> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read stored progress");
                return None;
            }
        };

        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "stored progress is not valid JSON, quarantining");
                self.quarantine(&raw).await;
                return None;
            }
        };

        let payload = match (parsed.get("version"), parsed.get("data")) {
            (Some(version), Some(data)) => {
                if version.as_u64() != Some(u64::from(SCHEMA_VERSION)) {
                    warn!(
                        found = %version,
                        expected = SCHEMA_VERSION,
                        "storage schema version mismatch, attempting payload anyway"
                    );
                }
                data.clone()
            }
            // Legacy snapshot written before envelope versioning: the whole
            // value is the progress payload.
            _ => parsed,
        };

        if let Err(err) = validate_progress_value(&payload) {
            warn!(error = %err, "stored progress failed validation, resetting to initial state");
            return None;
        }

        let record: StoredProgress = match serde_json::from_value(payload) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "validated payload did not deserialize");
                return None;
            }
        };
        let mut progress = match record.into_progress() {
            Ok(progress) => progress,
            Err(err) => {
                warn!(error = %err, "stored timestamps did not parse");
                return None;
            }
        };

        progress.achievements =
            merge_achievements(self.catalog.achievements(), &progress.achievements);
        Some(progress)
    }

    /// Persists the snapshot in a versioned envelope. Returns true when the
    /// write (or the single post-prune retry after a quota failure) landed.
    pub async fn save(&self, progress: &UserProgress) -> bool {
        let raw = match self.encode(progress) {
            Ok(raw) => raw,
            Err(err) => {
                error!(error = %err, "failed to serialize progress");
                return false;
            }
        };

        match self.store.put(&self.key, &raw).await {
            Ok(()) => true,
            Err(StorageError::QuotaExceeded) => {
                warn!("storage quota exceeded, pruning quarantined backups and retrying");
                self.cleanup_quarantine().await;
                match self.store.put(&self.key, &raw).await {
                    Ok(()) => true,
                    Err(err) => {
                        error!(error = %err, "save failed even after pruning backups");
                        false
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "failed to save progress");
                false
            }
        }
    }

    /// Quarantined backup keys, oldest first.
    pub async fn quarantine_keys(&self) -> Vec<String> {
        match self.store.keys_with_prefix(&self.quarantine_prefix()).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "failed to enumerate quarantined backups");
                Vec::new()
            }
        }
    }

    /// Deletes every quarantined backup, returning how many were removed.
    pub async fn cleanup_quarantine(&self) -> usize {
        let mut removed = 0;
        for key in self.quarantine_keys().await {
            match self.store.remove(&key).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(error = %err, key = %key, "failed to remove quarantined backup"),
            }
        }
        removed
    }

    /// Health snapshot of the persisted state, for maintenance tooling.
    pub async fn diagnostics(&self) -> StorageDiagnostics {
        let primary = self.store.get(&self.key).await.ok().flatten();
        StorageDiagnostics {
            primary_exists: primary.is_some(),
            primary_parses: primary
                .as_deref()
                .is_some_and(|raw| serde_json::from_str::<Value>(raw).is_ok()),
            primary_bytes: primary.map_or(0, |raw| raw.len()),
            quarantined_backups: self.quarantine_keys().await.len(),
        }
    }

    fn encode(&self, progress: &UserProgress) -> Result<String, serde_json::Error> {
        let envelope = Envelope {
            version: SCHEMA_VERSION,
            data: StoredProgress::from_progress(progress),
            timestamp: format_timestamp(self.clock.now()),
        };
        serde_json::to_string(&envelope)
    }

    fn quarantine_prefix(&self) -> String {
        format!("{}{QUARANTINE_INFIX}", self.key)
    }

    /// Preserves unparseable raw text under a timestamped backup key for
    /// forensic recovery. Quarantined keys are never read back by `load`.
    async fn quarantine(&self, raw: &str) {
        let key = format!(
            "{}{}",
            self.quarantine_prefix(),
            self.clock.now().timestamp_millis()
        );
        match self.store.put(&key, raw).await {
            Ok(()) => debug!(key = %key, "quarantined corrupted progress snapshot"),
            Err(err) => warn!(error = %err, "failed to quarantine corrupted data"),
        }
    }
}
