use crate::model::{Achievement, AchievementId, SectionId};

/// Awarded on the first completed activity.
pub const FIRST_STEPS: &str = "first-steps";
/// Awarded when every practical scenario is completed. No automatic trigger
/// is wired yet; awarded via an explicit `UnlockAchievement` dispatch.
pub const PROMPT_MASTER: &str = "prompt-master";
/// Awarded for a flawless multiple-choice run. Same dispatch-only status as
/// [`PROMPT_MASTER`].
pub const PERFECT_SCORE: &str = "perfect-score";
/// Awarded when every reflection is completed. Dispatch-only.
pub const DEEP_THINKER: &str = "deep-thinker";
/// Awarded when every section is completed.
pub const COMPLETIONIST: &str = "completionist";

/// Static, read-only ground truth the engine reconciles against: the full
/// achievement catalog (id-keyed, ordered) and the course's section count.
///
/// The application ships one built-in catalog; tests inject smaller ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    initial_section: SectionId,
    achievements: Vec<Achievement>,
    total_sections: usize,
}

impl Catalog {
    /// Builds a catalog from its parts. Duplicate achievement ids collapse
    /// to their first occurrence so the id set stays unique.
    #[must_use]
    pub fn new(
        initial_section: SectionId,
        achievements: Vec<Achievement>,
        total_sections: usize,
    ) -> Self {
        let mut unique: Vec<Achievement> = Vec::with_capacity(achievements.len());
        for achievement in achievements {
            if !unique.iter().any(|a| a.id == achievement.id) {
                unique.push(achievement);
            }
        }
        Self {
            initial_section,
            achievements: unique,
            total_sections,
        }
    }

    /// The catalog shipped with the prompt-engineering course: five badges
    /// and six sections, starting on the intro.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(
            SectionId::new("intro"),
            vec![
                Achievement::locked(
                    FIRST_STEPS,
                    "First Steps",
                    "Complete your first activity",
                    "🎯",
                ),
                Achievement::locked(
                    PROMPT_MASTER,
                    "Prompt Master",
                    "Complete every practical scenario",
                    "🧠",
                ),
                Achievement::locked(
                    PERFECT_SCORE,
                    "Perfect Score",
                    "Answer every multiple-choice question correctly",
                    "⭐",
                ),
                Achievement::locked(
                    DEEP_THINKER,
                    "Deep Thinker",
                    "Complete every reflection",
                    "🤔",
                ),
                Achievement::locked(
                    COMPLETIONIST,
                    "Completionist",
                    "Complete the whole course",
                    "🏆",
                ),
            ],
            6,
        )
    }

    #[must_use]
    pub fn initial_section(&self) -> &SectionId {
        &self.initial_section
    }

    /// The full catalog, every entry locked, in award-display order.
    #[must_use]
    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    #[must_use]
    pub fn total_sections(&self) -> usize {
        self.total_sections
    }

    #[must_use]
    pub fn contains(&self, id: &AchievementId) -> bool {
        self.achievements.iter().any(|a| &a.id == id)
    }
}
