use chrono::{DateTime, Utc};

use crate::catalog::{self, Catalog};
use crate::model::{Achievement, GameState, ProgressEvent};
use crate::time::Clock;

/// Pure transition function over [`GameState`].
///
/// Owns every business rule: point awards, streaks, achievement triggers,
/// and duplicate-event suppression. Progress fields only ever ratchet
/// forward; replaying an event is always safe.
///
/// With a fixed [`Clock`] the reducer is fully deterministic.
#[derive(Debug, Clone)]
pub struct Reducer {
    catalog: Catalog,
    clock: Clock,
}

impl Reducer {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// The state a fresh process starts from, before the initial load.
    #[must_use]
    pub fn initial_state(&self) -> GameState {
        GameState::initial(&self.catalog)
    }

    /// Computes the next state for `event`. Never mutates `state`.
    #[must_use]
    pub fn apply(&self, state: &GameState, event: ProgressEvent) -> GameState {
        match event {
            ProgressEvent::CompleteActivity {
                activity_id,
                points,
            } => {
                if state.progress.is_activity_completed(&activity_id) {
                    return state.clone();
                }

                let now = self.clock.now();
                let mut next = state.clone();
                next.progress.completed_activities.push(activity_id);
                next.progress.total_score = next.progress.total_score.saturating_add(points);
                next.progress.streak_count = next.progress.streak_count.saturating_add(1);
                next.progress.last_activity_date = Some(now);

                if next.progress.completed_activities.len() == 1 {
                    unlock(&mut next.progress.achievements, catalog::FIRST_STEPS, now);
                }

                next.show_confetti = true;
                next
            }

            ProgressEvent::CompleteSection { section_id } => {
                if state.progress.is_section_completed(&section_id) {
                    return state.clone();
                }

                let mut next = state.clone();
                next.progress.completed_sections.push(section_id);

                if next.progress.completed_sections.len() == self.catalog.total_sections() {
                    unlock(
                        &mut next.progress.achievements,
                        catalog::COMPLETIONIST,
                        self.clock.now(),
                    );
                }

                next.show_confetti = true;
                next
            }

            ProgressEvent::UnlockAchievement(achievement) => {
                let already_unlocked = state
                    .progress
                    .achievement(&achievement.id)
                    .map(|a| a.unlocked);
                match already_unlocked {
                    None | Some(true) => state.clone(),
                    Some(false) => {
                        let mut next = state.clone();
                        let unlocked = unlock(
                            &mut next.progress.achievements,
                            achievement.id.as_str(),
                            self.clock.now(),
                        );
                        next.recent_achievement = unlocked;
                        next.show_confetti = true;
                        next
                    }
                }
            }

            ProgressEvent::ShowConfetti(show) => {
                let mut next = state.clone();
                next.show_confetti = show;
                next
            }

            ProgressEvent::SetCurrentSection(section_id) => {
                let mut next = state.clone();
                next.progress.current_section = section_id;
                next
            }

            ProgressEvent::LoadProgress(progress) => {
                let mut next = state.clone();
                next.progress = progress.normalized(&self.catalog);
                next
            }

            ProgressEvent::SetStorageError(message) => {
                let mut next = state.clone();
                next.storage_error = message;
                next
            }
        }
    }
}

/// Transitions the achievement with `id` to unlocked, returning the updated
/// entry when it actually changed. Unknown or already-unlocked ids return
/// `None`.
fn unlock(achievements: &mut [Achievement], id: &str, at: DateTime<Utc>) -> Option<Achievement> {
    let entry = achievements.iter_mut().find(|a| a.id.as_str() == id)?;
    if entry.unlocked {
        return None;
    }
    entry.unlock(at);
    Some(entry.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AchievementId, ActivityId, SectionId, UserProgress};
    use crate::time::{fixed_clock, fixed_now};

    fn build_reducer() -> Reducer {
        Reducer::new(Catalog::builtin()).with_clock(fixed_clock())
    }

    fn complete_activity(id: &str, points: u32) -> ProgressEvent {
        ProgressEvent::CompleteActivity {
            activity_id: ActivityId::new(id),
            points,
        }
    }

    fn complete_section(id: &str) -> ProgressEvent {
        ProgressEvent::CompleteSection {
            section_id: SectionId::new(id),
        }
    }

    #[test]
    fn first_activity_awards_points_streak_and_badge() {
        let reducer = build_reducer();
        let state = reducer.apply(&reducer.initial_state(), complete_activity("a1", 25));

        assert_eq!(
            state.progress.completed_activities,
            vec![ActivityId::new("a1")]
        );
        assert_eq!(state.progress.total_score, 25);
        assert_eq!(state.progress.streak_count, 1);
        assert_eq!(state.progress.last_activity_date, Some(fixed_now()));
        assert!(state.show_confetti);

        let first_steps = state
            .progress
            .achievement(&AchievementId::new(catalog::FIRST_STEPS))
            .unwrap();
        assert!(first_steps.unlocked);
        assert_eq!(first_steps.unlocked_at, Some(fixed_now()));
    }

    #[test]
    fn duplicate_activity_is_identity() {
        let reducer = build_reducer();
        let once = reducer.apply(&reducer.initial_state(), complete_activity("a1", 25));
        let twice = reducer.apply(&once, complete_activity("a1", 25));
        assert_eq!(once, twice);
    }

    #[test]
    fn score_sums_first_occurrences_only() {
        let reducer = build_reducer();
        let events = [
            complete_activity("a1", 10),
            complete_activity("a2", 20),
            complete_activity("a1", 999),
            complete_activity("a3", 5),
            complete_activity("a2", 999),
        ];

        let mut state = reducer.initial_state();
        let mut previous_score = 0;
        for event in events {
            state = reducer.apply(&state, event);
            assert!(state.progress.total_score >= previous_score);
            previous_score = state.progress.total_score;
        }

        assert_eq!(state.progress.total_score, 35);
        assert_eq!(state.progress.streak_count, 3);
    }

    #[test]
    fn second_activity_does_not_retrigger_first_steps() {
        let reducer = build_reducer();
        let mut clock = fixed_clock();
        let one = reducer.apply(&reducer.initial_state(), complete_activity("a1", 10));
        clock.advance(chrono::Duration::hours(1));
        let reducer_later = Reducer::new(Catalog::builtin()).with_clock(clock);
        let two = reducer_later.apply(&one, complete_activity("a2", 10));

        let badge = two
            .progress
            .achievement(&AchievementId::new(catalog::FIRST_STEPS))
            .unwrap();
        // Unlock timestamp stays at the first activity's time.
        assert_eq!(badge.unlocked_at, Some(fixed_now()));
    }

    #[test]
    fn completing_all_sections_unlocks_completionist_once() {
        let reducer = build_reducer();
        let sections = ["intro", "comprehension", "application", "reflection", "evaluation", "map"];

        let mut state = reducer.initial_state();
        for (index, id) in sections.iter().enumerate() {
            state = reducer.apply(&state, complete_section(id));
            let badge = state
                .progress
                .achievement(&AchievementId::new(catalog::COMPLETIONIST))
                .unwrap();
            assert_eq!(badge.unlocked, index == sections.len() - 1);
        }

        assert_eq!(state.progress.completed_sections.len(), 6);
        let badge = state
            .progress
            .achievement(&AchievementId::new(catalog::COMPLETIONIST))
            .unwrap();
        assert_eq!(badge.unlocked_at, Some(fixed_now()));

        // Replaying the last section changes nothing.
        let replay = reducer.apply(&state, complete_section("map"));
        assert_eq!(replay, state);
    }

    #[test]
    fn unlock_event_sets_recent_achievement_and_confetti() {
        let reducer = build_reducer();
        let initial = reducer.initial_state();
        let badge = initial
            .progress
            .achievement(&AchievementId::new(catalog::DEEP_THINKER))
            .unwrap()
            .clone();

        let state = reducer.apply(&initial, ProgressEvent::UnlockAchievement(badge));

        assert!(state.show_confetti);
        let recent = state.recent_achievement.as_ref().unwrap();
        assert_eq!(recent.id, AchievementId::new(catalog::DEEP_THINKER));
        assert!(recent.unlocked);
        assert_eq!(recent.unlocked_at, Some(fixed_now()));
    }

    #[test]
    fn unlock_event_ignores_unknown_and_unlocked_ids() {
        let reducer = build_reducer();
        let initial = reducer.initial_state();

        let unknown = Achievement::locked("retired-badge", "Retired", "gone", "👻");
        let state = reducer.apply(&initial, ProgressEvent::UnlockAchievement(unknown));
        assert_eq!(state, initial);

        let badge = initial
            .progress
            .achievement(&AchievementId::new(catalog::DEEP_THINKER))
            .unwrap()
            .clone();
        let unlocked_once = reducer.apply(&initial, ProgressEvent::UnlockAchievement(badge.clone()));
        let unlocked_twice = reducer.apply(&unlocked_once, ProgressEvent::UnlockAchievement(badge));
        assert_eq!(unlocked_once, unlocked_twice);
    }

    #[test]
    fn confetti_can_be_raised_and_extinguished() {
        let reducer = build_reducer();
        let on = reducer.apply(&reducer.initial_state(), ProgressEvent::ShowConfetti(true));
        assert!(on.show_confetti);
        let off = reducer.apply(&on, ProgressEvent::ShowConfetti(false));
        assert!(!off.show_confetti);
    }

    #[test]
    fn set_current_section_is_navigation_not_progress() {
        let reducer = build_reducer();
        let state = reducer.apply(
            &reducer.initial_state(),
            ProgressEvent::SetCurrentSection(SectionId::new("map")),
        );
        assert_eq!(state.progress.current_section, SectionId::new("map"));
        assert!(state.progress.completed_sections.is_empty());
        assert!(!state.show_confetti);
    }

    #[test]
    fn load_progress_normalizes_the_snapshot() {
        let reducer = build_reducer();
        let catalog = Catalog::builtin();

        let mut loaded = UserProgress::initial(&catalog);
        loaded.current_section = SectionId::new("");
        loaded.completed_sections = vec![
            SectionId::new("intro"),
            SectionId::new("intro"),
            SectionId::new("map"),
        ];
        loaded.total_score = 50;
        // Simulate a snapshot written before two badges existed.
        loaded.achievements.truncate(3);
        loaded.achievements[0].unlock(fixed_now());

        let state = reducer.apply(&reducer.initial_state(), ProgressEvent::LoadProgress(loaded));

        assert_eq!(state.progress.current_section, *catalog.initial_section());
        assert_eq!(
            state.progress.completed_sections,
            vec![SectionId::new("intro"), SectionId::new("map")]
        );
        assert_eq!(state.progress.total_score, 50);
        assert_eq!(state.progress.achievements.len(), catalog.achievements().len());
        assert!(
            state
                .progress
                .achievement(&AchievementId::new(catalog::FIRST_STEPS))
                .is_some_and(|a| a.unlocked)
        );
    }

    #[test]
    fn storage_error_flag_round_trips_without_touching_progress() {
        let reducer = build_reducer();
        let initial = reducer.initial_state();

        let flagged = reducer.apply(
            &initial,
            ProgressEvent::SetStorageError(Some("could not save".into())),
        );
        assert_eq!(flagged.storage_error.as_deref(), Some("could not save"));
        assert_eq!(flagged.progress, initial.progress);

        let cleared = reducer.apply(&flagged, ProgressEvent::SetStorageError(None));
        assert_eq!(cleared.storage_error, None);
    }
}
