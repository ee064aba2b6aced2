use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use quest_core::model::UserProgress;
use quest_core::time::format_timestamp;

use crate::record::StoredProgress;
use crate::validate::validate_progress_value;

/// Version stamped into export payloads.
pub const EXPORT_VERSION: u32 = 1;

/// The user-facing backup format: pretty JSON a person can stash in a file
/// and bring to another machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressExport {
    pub version: u32,
    pub exported_at: String,
    pub progress: StoredProgress,
}

/// Renders progress as a pretty-printed export document.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if encoding fails.
pub fn export_progress(
    progress: &UserProgress,
    exported_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let export = ProgressExport {
        version: EXPORT_VERSION,
        exported_at: format_timestamp(exported_at),
        progress: StoredProgress::from_progress(progress),
    };
    serde_json::to_string_pretty(&export)
}

/// Parses and re-validates an export document.
///
/// Returns `None` for anything that is not a fully valid export — the caller
/// must not merge a partial result into live state. The returned progress
/// has not been reconciled against the catalog yet; feeding it through a
/// `LoadProgress` dispatch takes care of that.
#[must_use]
pub fn import_progress(raw: &str) -> Option<UserProgress> {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "import payload is not valid JSON");
            return None;
        }
    };

    let Some(payload) = parsed.get("progress") else {
        warn!("import payload has no `progress` field");
        return None;
    };

    if let Err(err) = validate_progress_value(payload) {
        warn!(error = %err, "import payload failed validation");
        return None;
    }

    let record: StoredProgress = serde_json::from_value(payload.clone()).ok()?;
    record.into_progress().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_core::Catalog;
    use quest_core::model::ActivityId;
    use quest_core::time::fixed_now;

    fn build_progress() -> UserProgress {
        let catalog = Catalog::builtin();
        let mut progress = UserProgress::initial(&catalog);
        progress.completed_activities.push(ActivityId::new("a1"));
        progress.total_score = 25;
        progress.streak_count = 1;
        progress.last_activity_date = Some(fixed_now());
        progress.achievements[0].unlock(fixed_now());
        progress
    }

    #[test]
    fn export_then_import_round_trips() {
        let progress = build_progress();
        let document = export_progress(&progress, fixed_now()).unwrap();
        let restored = import_progress(&document).unwrap();
        assert_eq!(restored, progress);
    }

    #[test]
    fn export_document_shape() {
        let document = export_progress(&build_progress(), fixed_now()).unwrap();
        let value: Value = serde_json::from_str(&document).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["exportedAt"], "2023-11-14T22:13:20.000Z");
        assert_eq!(value["progress"]["totalScore"], 25);
    }

    #[test]
    fn import_rejects_garbage_and_partial_documents() {
        assert_eq!(import_progress("not json"), None);
        assert_eq!(import_progress("{}"), None);
        // A progress field that fails validation is rejected whole.
        assert_eq!(
            import_progress(r#"{ "version": 1, "progress": { "totalScore": 10 } }"#),
            None
        );
    }

    #[test]
    fn import_rejects_tampered_timestamps() {
        let document = export_progress(&build_progress(), fixed_now()).unwrap();
        let tampered = document.replace("2023-11-14T22:13:20.000Z", "2023-11-14");
        assert_eq!(import_progress(&tampered), None);
    }
}
