use crate::model::{Achievement, ActivityId, SectionId, UserProgress};

/// The complete event set accepted by the reducer.
///
/// Every transition is monotonic with respect to progress: no event removes
/// a completed id, decreases the score, or re-locks an achievement.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// An activity was finished, worth `points`. Duplicate ids are no-ops.
    CompleteActivity {
        activity_id: ActivityId,
        points: u32,
    },
    /// A section was finished. Duplicate ids are no-ops.
    CompleteSection { section_id: SectionId },
    /// Explicitly award an achievement (e.g. from a mini-game). Unknown or
    /// already-unlocked ids are no-ops.
    UnlockAchievement(Achievement),
    /// Raise or extinguish the celebratory UI signal.
    ShowConfetti(bool),
    /// Navigation only; overwrites unconditionally.
    SetCurrentSection(SectionId),
    /// Replace progress wholesale (storage load or import). The reducer
    /// re-derives the snapshot defensively before accepting it.
    LoadProgress(UserProgress),
    /// Set (`Some`) or clear (`None`) the persistence failure flag.
    SetStorageError(Option<String>),
}
