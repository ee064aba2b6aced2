use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::hash::Hash;

use crate::catalog::Catalog;
use crate::model::{Achievement, AchievementId, ActivityId, SectionId, merge_achievements};

/// The aggregate persisted per user: everything the application knows about
/// what has been completed, scored, and unlocked.
///
/// Owned exclusively by the reducer; collaborators read snapshots and
/// dispatch events. Completed-id lists keep insertion order and are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProgress {
    pub current_section: SectionId,
    pub completed_sections: Vec<SectionId>,
    pub completed_activities: Vec<ActivityId>,
    pub total_score: u32,
    pub streak_count: u32,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub achievements: Vec<Achievement>,
}

impl UserProgress {
    /// Fresh-install progress: nothing completed, every catalog achievement
    /// locked, positioned on the catalog's initial section.
    #[must_use]
    pub fn initial(catalog: &Catalog) -> Self {
        Self {
            current_section: catalog.initial_section().clone(),
            completed_sections: Vec::new(),
            completed_activities: Vec::new(),
            total_score: 0,
            streak_count: 0,
            last_activity_date: None,
            achievements: catalog.achievements().to_vec(),
        }
    }

    #[must_use]
    pub fn is_activity_completed(&self, activity_id: &ActivityId) -> bool {
        self.completed_activities.contains(activity_id)
    }

    #[must_use]
    pub fn is_section_completed(&self, section_id: &SectionId) -> bool {
        self.completed_sections.contains(section_id)
    }

    #[must_use]
    pub fn achievement(&self, id: &AchievementId) -> Option<&Achievement> {
        self.achievements.iter().find(|a| &a.id == id)
    }

    /// Unlocked achievements, in catalog order.
    #[must_use]
    pub fn unlocked_achievements(&self) -> Vec<&Achievement> {
        self.achievements.iter().filter(|a| a.unlocked).collect()
    }

    /// Re-derives every field defensively against the catalog.
    ///
    /// Applied when a whole snapshot enters the state wholesale (storage
    /// load or import): duplicate ids collapse to their first occurrence,
    /// an empty current section falls back to the catalog's initial one,
    /// and achievements are re-merged so the list always carries exactly
    /// the catalog's id set.
    #[must_use]
    pub fn normalized(self, catalog: &Catalog) -> Self {
        let current_section = if self.current_section.is_empty() {
            catalog.initial_section().clone()
        } else {
            self.current_section
        };

        Self {
            current_section,
            completed_sections: dedup_keep_first(self.completed_sections),
            completed_activities: dedup_keep_first(self.completed_activities),
            total_score: self.total_score,
            streak_count: self.streak_count,
            last_activity_date: self.last_activity_date,
            achievements: merge_achievements(catalog.achievements(), &self.achievements),
        }
    }
}

fn dedup_keep_first<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn initial_progress_matches_catalog() {
        let catalog = Catalog::builtin();
        let progress = UserProgress::initial(&catalog);

        assert_eq!(progress.current_section, *catalog.initial_section());
        assert_eq!(progress.total_score, 0);
        assert_eq!(progress.achievements.len(), catalog.achievements().len());
        assert!(progress.achievements.iter().all(|a| !a.unlocked));
    }

    #[test]
    fn normalized_dedups_and_repairs() {
        let catalog = Catalog::builtin();
        let mut progress = UserProgress::initial(&catalog);
        progress.current_section = SectionId::new("");
        progress.completed_activities = vec![
            ActivityId::new("a1"),
            ActivityId::new("a2"),
            ActivityId::new("a1"),
        ];
        progress.achievements.retain(|a| a.id.as_str() == "first-steps");
        progress.achievements[0].unlock(fixed_now());

        let normalized = progress.normalized(&catalog);

        assert_eq!(normalized.current_section, *catalog.initial_section());
        assert_eq!(
            normalized.completed_activities,
            vec![ActivityId::new("a1"), ActivityId::new("a2")]
        );
        // Merger restores the full catalog id set, keeping the unlock.
        assert_eq!(normalized.achievements.len(), catalog.achievements().len());
        assert!(
            normalized
                .achievement(&AchievementId::new("first-steps"))
                .is_some_and(|a| a.unlocked)
        );
    }

    #[test]
    fn membership_queries_project_the_lists() {
        let catalog = Catalog::builtin();
        let mut progress = UserProgress::initial(&catalog);
        progress.completed_sections.push(SectionId::new("intro"));

        assert!(progress.is_section_completed(&SectionId::new("intro")));
        assert!(!progress.is_section_completed(&SectionId::new("map")));
        assert!(!progress.is_activity_completed(&ActivityId::new("a1")));
        assert!(progress.unlocked_achievements().is_empty());
    }
}
