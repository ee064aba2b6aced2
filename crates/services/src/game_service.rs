use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use quest_core::model::{
    Achievement, AchievementId, ActivityId, GameState, ProgressEvent, SectionId,
};
use quest_core::{Catalog, Reducer};
use storage::{ProgressStore, export_progress, import_progress};

/// User-facing message surfaced when a persist attempt fails.
pub const SAVE_FAILED_MESSAGE: &str =
    "Could not save your progress. Recent changes may be lost.";

/// The store/provider: wires the reducer and the storage adapter into a
/// lifecycle and exposes the only read/dispatch surface consumers get.
///
/// One instance per running application, injected into the UI layer; tests
/// build isolated instances against in-memory backends. There is exactly
/// one writer: UI handlers dispatch events one at a time.
pub struct GameService {
    reducer: Reducer,
    store: ProgressStore,
    state: Mutex<GameState>,
    initialized: AtomicBool,
}

impl GameService {
    /// Builds the service in its pre-load state (`is_loading == true`).
    /// Call [`GameService::init`] before serving consumers.
    #[must_use]
    pub fn new(reducer: Reducer, store: ProgressStore) -> Self {
        let state = reducer.initial_state();
        Self {
            reducer,
            store,
            state: Mutex::new(state),
            initialized: AtomicBool::new(false),
        }
    }

    /// Performs the initial storage read.
    ///
    /// A restored snapshot enters through a `LoadProgress` dispatch; a fresh
    /// install saves the initial state to establish the on-disk schema.
    /// Either way `is_loading` flips to false and persistence is armed —
    /// saves never run before this completes, so a slow start can never
    /// clobber not-yet-read storage with the blank initial state.
    pub async fn init(&self) {
        match self.store.load().await {
            Some(progress) => {
                debug!("restored saved progress");
                let mut guard = self.lock_state();
                *guard = self
                    .reducer
                    .apply(&guard, ProgressEvent::LoadProgress(progress));
            }
            None => {
                debug!("no saved progress found, establishing the storage schema");
                let initial = self.lock_state().progress.clone();
                if !self.store.save(&initial).await {
                    warn!("could not establish the initial snapshot");
                }
            }
        }

        self.lock_state().is_loading = false;
        self.initialized.store(true, Ordering::Release);
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> GameState {
        self.lock_state().clone()
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        self.reducer.catalog()
    }

    /// Applies `event` and persists the result when progress changed.
    ///
    /// A failed persist surfaces as `storage_error` on the state; the next
    /// successful persist clears it. Dispatching never fails or panics.
    pub async fn dispatch(&self, event: ProgressEvent) {
        let snapshot = {
            let mut guard = self.lock_state();
            let next = self.reducer.apply(&guard, event);
            let changed = next.progress != guard.progress;
            *guard = next;
            changed.then(|| guard.progress.clone())
        };

        let Some(progress) = snapshot else {
            return;
        };
        if !self.initialized.load(Ordering::Acquire) {
            return;
        }

        if self.store.save(&progress).await {
            let mut guard = self.lock_state();
            if guard.storage_error.is_some() {
                *guard = self
                    .reducer
                    .apply(&guard, ProgressEvent::SetStorageError(None));
            }
        } else {
            warn!("progress could not be persisted, flagging a storage error");
            let mut guard = self.lock_state();
            *guard = self.reducer.apply(
                &guard,
                ProgressEvent::SetStorageError(Some(SAVE_FAILED_MESSAGE.to_owned())),
            );
        }
    }

    // ─── Convenience dispatchers ───────────────────────────────────────────

    pub async fn complete_activity(&self, activity_id: impl Into<ActivityId>, points: u32) {
        self.dispatch(ProgressEvent::CompleteActivity {
            activity_id: activity_id.into(),
            points,
        })
        .await;
    }

    pub async fn complete_section(&self, section_id: impl Into<SectionId>) {
        self.dispatch(ProgressEvent::CompleteSection {
            section_id: section_id.into(),
        })
        .await;
    }

    pub async fn unlock_achievement(&self, achievement: Achievement) {
        self.dispatch(ProgressEvent::UnlockAchievement(achievement))
            .await;
    }

    pub async fn set_current_section(&self, section_id: impl Into<SectionId>) {
        self.dispatch(ProgressEvent::SetCurrentSection(section_id.into()))
            .await;
    }

    pub async fn show_confetti(&self, show: bool) {
        self.dispatch(ProgressEvent::ShowConfetti(show)).await;
    }

    pub async fn clear_storage_error(&self) {
        self.dispatch(ProgressEvent::SetStorageError(None)).await;
    }

    // ─── Derived queries ───────────────────────────────────────────────────

    /// Completed sections as a share of the catalog, rounded to whole percent.
    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        let total = self.reducer.catalog().total_sections();
        if total == 0 {
            return 0;
        }
        let completed = self.lock_state().progress.completed_sections.len();
        let percentage = (completed as f64 / total as f64) * 100.0;
        percentage.round().min(100.0) as u8
    }

    #[must_use]
    pub fn is_activity_completed(&self, activity_id: &ActivityId) -> bool {
        self.lock_state().progress.is_activity_completed(activity_id)
    }

    #[must_use]
    pub fn is_section_completed(&self, section_id: &SectionId) -> bool {
        self.lock_state().progress.is_section_completed(section_id)
    }

    #[must_use]
    pub fn achievement(&self, id: &AchievementId) -> Option<Achievement> {
        self.lock_state().progress.achievement(id).cloned()
    }

    #[must_use]
    pub fn unlocked_achievements(&self) -> Vec<Achievement> {
        self.lock_state()
            .progress
            .unlocked_achievements()
            .into_iter()
            .cloned()
            .collect()
    }

    // ─── Backup / restore ──────────────────────────────────────────────────

    /// Renders the current progress as an export document, offered to the
    /// user as a mitigation when persistence keeps failing.
    #[must_use]
    pub fn export(&self) -> Option<String> {
        let progress = self.lock_state().progress.clone();
        match export_progress(&progress, self.reducer.clock().now()) {
            Ok(document) => Some(document),
            Err(err) => {
                warn!(error = %err, "failed to export progress");
                None
            }
        }
    }

    /// Validates and adopts an export document. Returns false (leaving live
    /// state untouched) when the document is rejected.
    pub async fn import(&self, raw: &str) -> bool {
        match import_progress(raw) {
            Some(progress) => {
                self.dispatch(ProgressEvent::LoadProgress(progress)).await;
                true
            }
            None => false,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GameState> {
        // A poisoned lock only means a reader panicked mid-clone; the state
        // itself is still the last fully-applied transition.
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
