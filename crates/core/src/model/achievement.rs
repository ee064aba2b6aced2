use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::AchievementId;

/// A single badge the application can award.
///
/// Invariant: a locked achievement carries no `unlocked_at` timestamp.
/// Persisted data may violate this; [`Achievement::normalized`] and the
/// merger repair it rather than rejecting the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub id: AchievementId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Achievement {
    /// Builds a catalog entry in its initial, locked form.
    #[must_use]
    pub fn locked(
        id: impl Into<AchievementId>,
        title: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            icon: icon.into(),
            unlocked: false,
            unlocked_at: None,
        }
    }

    /// Marks the achievement unlocked at `at`.
    ///
    /// Unlocking is irreversible and idempotent: an already-unlocked
    /// achievement keeps its original timestamp.
    pub fn unlock(&mut self, at: DateTime<Utc>) {
        if !self.unlocked {
            self.unlocked = true;
            self.unlocked_at = Some(at);
        }
    }

    /// Repairs the unlocked/timestamp invariant on data of storage origin.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !self.unlocked {
            self.unlocked_at = None;
        }
        self
    }
}

/// Reconciles the static catalog with achievements restored from storage.
///
/// The result is seeded entirely from `catalog`, preserving its order and
/// picking up entries added since the snapshot was written. A stored entry
/// contributes only when its id still exists in the catalog and it is
/// unlocked; unlock state flows forward (locked to unlocked), never back.
/// Ids no longer in the catalog are dropped silently.
#[must_use]
pub fn merge_achievements(catalog: &[Achievement], stored: &[Achievement]) -> Vec<Achievement> {
    let mut merged: Vec<Achievement> =
        catalog.iter().cloned().map(Achievement::normalized).collect();
    let index: HashMap<&AchievementId, usize> = catalog
        .iter()
        .enumerate()
        .map(|(pos, achievement)| (&achievement.id, pos))
        .collect();

    for entry in stored {
        if !entry.unlocked {
            continue;
        }
        if let Some(&pos) = index.get(&entry.id) {
            merged[pos].unlocked = true;
            merged[pos].unlocked_at = entry.unlocked_at;
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build_catalog() -> Vec<Achievement> {
        vec![
            Achievement::locked("first-steps", "First Steps", "Complete an activity", "🎯"),
            Achievement::locked("completionist", "Completionist", "Finish every section", "🏆"),
        ]
    }

    fn unlocked(id: &str) -> Achievement {
        let mut achievement = Achievement::locked(id, "Stored", "Stored entry", "⭐");
        achievement.unlock(fixed_now());
        achievement
    }

    #[test]
    fn merge_keeps_catalog_order_and_ids() {
        let catalog = build_catalog();
        let merged = merge_achievements(&catalog, &[unlocked("completionist")]);

        let ids: Vec<&str> = merged.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["first-steps", "completionist"]);
        assert!(!merged[0].unlocked);
        assert!(merged[1].unlocked);
        assert_eq!(merged[1].unlocked_at, Some(fixed_now()));
        // Catalog definition wins for everything but the unlock state.
        assert_eq!(merged[1].title, "Completionist");
    }

    #[test]
    fn merge_drops_ids_removed_from_catalog() {
        let catalog = build_catalog();
        let merged = merge_achievements(&catalog, &[unlocked("retired-badge")]);
        assert_eq!(merged.len(), catalog.len());
        assert!(merged.iter().all(|a| a.id.as_str() != "retired-badge"));
    }

    #[test]
    fn merge_never_fabricates_unlocks() {
        let catalog = build_catalog();
        let stored = vec![
            Achievement::locked("first-steps", "First Steps", "Complete an activity", "🎯"),
        ];
        let merged = merge_achievements(&catalog, &stored);
        assert!(merged.iter().all(|a| !a.unlocked));
        assert!(merged.iter().all(|a| a.unlocked_at.is_none()));
    }

    #[test]
    fn merge_tolerates_unlocked_entry_without_timestamp() {
        let catalog = build_catalog();
        let stored = vec![Achievement {
            unlocked: true,
            unlocked_at: None,
            ..Achievement::locked("first-steps", "First Steps", "Complete an activity", "🎯")
        }];
        let merged = merge_achievements(&catalog, &stored);
        assert!(merged[0].unlocked);
        assert_eq!(merged[0].unlocked_at, None);
    }

    #[test]
    fn unlock_is_idempotent() {
        let mut achievement = Achievement::locked("first-steps", "First Steps", "d", "🎯");
        achievement.unlock(fixed_now());
        let first = achievement.unlocked_at;
        achievement.unlock(fixed_now() + chrono::Duration::days(1));
        assert_eq!(achievement.unlocked_at, first);
    }
}
