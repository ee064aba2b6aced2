use serde::{Deserialize, Serialize};
use thiserror::Error;

use quest_core::model::{Achievement, AchievementId, ActivityId, SectionId, UserProgress};
use quest_core::time::{format_timestamp, parse_timestamp};

/// Version stamped into every envelope this build writes.
pub const SCHEMA_VERSION: u32 = 1;

/// The versioned wrapper persisted under the primary key, distinct from the
/// raw progress payload it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub data: StoredProgress,
    /// Envelope write time, canonical ISO-8601.
    pub timestamp: String,
}

/// Storage-safe mirror of [`Achievement`]: timestamps as canonical strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAchievement {
    pub id: AchievementId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<String>,
}

/// Storage-safe mirror of [`UserProgress`].
///
/// Mirroring the domain type keeps storage concerns (string timestamps,
/// loosely-signed counters from old snapshots) out of the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProgress {
    pub current_section: SectionId,
    pub completed_sections: Vec<SectionId>,
    pub completed_activities: Vec<ActivityId>,
    pub total_score: i64,
    pub streak_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<String>,
    pub achievements: Vec<StoredAchievement>,
}

/// Errors converting a stored record back into domain progress.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("field `{field}` holds an unparseable timestamp: `{value}`")]
    InvalidTimestamp { field: &'static str, value: String },
}

impl StoredAchievement {
    #[must_use]
    pub fn from_achievement(achievement: &Achievement) -> Self {
        Self {
            id: achievement.id.clone(),
            title: achievement.title.clone(),
            description: achievement.description.clone(),
            icon: achievement.icon.clone(),
            unlocked: achievement.unlocked,
            unlocked_at: achievement.unlocked_at.map(format_timestamp),
        }
    }

    /// Convert back into a domain [`Achievement`].
    ///
    /// A locked entry carrying a stray timestamp is normalized rather than
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if `unlocked_at` is present but not canonical.
    pub fn into_achievement(self) -> Result<Achievement, RecordError> {
        let unlocked_at = self
            .unlocked_at
            .map(|raw| {
                parse_timestamp(&raw).ok_or(RecordError::InvalidTimestamp {
                    field: "unlockedAt",
                    value: raw,
                })
            })
            .transpose()?;

        Ok(Achievement {
            id: self.id,
            title: self.title,
            description: self.description,
            icon: self.icon,
            unlocked: self.unlocked,
            unlocked_at,
        }
        .normalized())
    }
}

impl StoredProgress {
    #[must_use]
    pub fn from_progress(progress: &UserProgress) -> Self {
        Self {
            current_section: progress.current_section.clone(),
            completed_sections: progress.completed_sections.clone(),
            completed_activities: progress.completed_activities.clone(),
            total_score: i64::from(progress.total_score),
            streak_count: i64::from(progress.streak_count),
            last_activity_date: progress.last_activity_date.map(format_timestamp),
            achievements: progress
                .achievements
                .iter()
                .map(StoredAchievement::from_achievement)
                .collect(),
        }
    }

    /// Convert the record back into domain [`UserProgress`].
    ///
    /// Counters are clamped to the non-negative range; old snapshots may
    /// carry negative values the validator deliberately lets through.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if any timestamp fails canonical parsing.
    pub fn into_progress(self) -> Result<UserProgress, RecordError> {
        let last_activity_date = self
            .last_activity_date
            .map(|raw| {
                parse_timestamp(&raw).ok_or(RecordError::InvalidTimestamp {
                    field: "lastActivityDate",
                    value: raw,
                })
            })
            .transpose()?;

        let achievements = self
            .achievements
            .into_iter()
            .map(StoredAchievement::into_achievement)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UserProgress {
            current_section: self.current_section,
            completed_sections: self.completed_sections,
            completed_activities: self.completed_activities,
            total_score: clamp_counter(self.total_score),
            streak_count: clamp_counter(self.streak_count),
            last_activity_date,
            achievements,
        })
    }
}

fn clamp_counter(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}
