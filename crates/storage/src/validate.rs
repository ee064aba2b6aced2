use serde_json::Value;
use thiserror::Error;

use quest_core::time::parse_timestamp;

/// Why an untrusted payload was rejected at the validation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("progress payload is not an object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),

    #[error("field `{field}` is not a canonical timestamp: `{value}`")]
    NonCanonicalTimestamp { field: &'static str, value: String },

    #[error("achievement entry {0} is not an object")]
    AchievementNotAnObject(usize),

    #[error("achievement entry {index}: missing or mistyped `{field}`")]
    AchievementField { index: usize, field: &'static str },

    #[error("achievement entry {index}: non-canonical timestamp `{value}`")]
    AchievementTimestamp { index: usize, value: String },
}

const REQUIRED_FIELDS: [&str; 6] = [
    "currentSection",
    "completedSections",
    "completedActivities",
    "totalScore",
    "streakCount",
    "achievements",
];

/// Structurally verifies a progress payload of untrusted origin (storage
/// read or import) before it may enter runtime state.
///
/// The check is all-or-nothing: on any failure the caller must discard the
/// whole payload and fall back to initial state, never partially accept it.
/// Counters are only checked for integer format here; sign is clamped by
/// the record conversion. Unknown extra fields are tolerated.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate_progress_value(value: &Value) -> Result<(), ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            return Err(ValidationError::MissingField(field));
        }
    }

    if !obj["currentSection"].is_string() {
        return Err(ValidationError::WrongType("currentSection"));
    }
    check_string_array(&obj["completedSections"], "completedSections")?;
    check_string_array(&obj["completedActivities"], "completedActivities")?;
    if obj["totalScore"].as_i64().is_none() {
        return Err(ValidationError::WrongType("totalScore"));
    }
    if obj["streakCount"].as_i64().is_none() {
        return Err(ValidationError::WrongType("streakCount"));
    }

    let achievements = obj["achievements"]
        .as_array()
        .ok_or(ValidationError::WrongType("achievements"))?;
    for (index, entry) in achievements.iter().enumerate() {
        check_achievement(entry, index)?;
    }

    if let Some(raw) = obj.get("lastActivityDate") {
        let text = raw
            .as_str()
            .ok_or(ValidationError::WrongType("lastActivityDate"))?;
        if parse_timestamp(text).is_none() {
            return Err(ValidationError::NonCanonicalTimestamp {
                field: "lastActivityDate",
                value: text.to_owned(),
            });
        }
    }

    Ok(())
}

fn check_string_array(value: &Value, field: &'static str) -> Result<(), ValidationError> {
    let items = value.as_array().ok_or(ValidationError::WrongType(field))?;
    if items.iter().all(Value::is_string) {
        Ok(())
    } else {
        Err(ValidationError::WrongType(field))
    }
}

fn check_achievement(entry: &Value, index: usize) -> Result<(), ValidationError> {
    let obj = entry
        .as_object()
        .ok_or(ValidationError::AchievementNotAnObject(index))?;

    for field in ["id", "title", "description", "icon"] {
        if !obj.get(field).is_some_and(Value::is_string) {
            return Err(ValidationError::AchievementField { index, field });
        }
    }
    if !obj.get("unlocked").is_some_and(Value::is_boolean) {
        return Err(ValidationError::AchievementField {
            index,
            field: "unlocked",
        });
    }

    if let Some(raw) = obj.get("unlockedAt") {
        let text = raw.as_str().ok_or(ValidationError::AchievementField {
            index,
            field: "unlockedAt",
        })?;
        if parse_timestamp(text).is_none() {
            return Err(ValidationError::AchievementTimestamp {
                index,
                value: text.to_owned(),
            });
        }
    }

    Ok(())
}
