use crate::catalog::Catalog;
use crate::model::{Achievement, UserProgress};

/// Everything a consumer can observe, in memory only — never persisted.
///
/// `is_loading` is true only between construction and completion of the
/// initial storage read. `storage_error` is set when a persist attempt
/// fails and cleared on the next successful persist.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub progress: UserProgress,
    pub show_confetti: bool,
    pub recent_achievement: Option<Achievement>,
    pub is_loading: bool,
    pub storage_error: Option<String>,
}

impl GameState {
    /// State at process start, before the initial storage read resolves.
    #[must_use]
    pub fn initial(catalog: &Catalog) -> Self {
        Self {
            progress: UserProgress::initial(catalog),
            show_confetti: false,
            recent_achievement: None,
            is_loading: true,
            storage_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_loading_with_no_signals() {
        let state = GameState::initial(&Catalog::builtin());
        assert!(state.is_loading);
        assert!(!state.show_confetti);
        assert_eq!(state.recent_achievement, None);
        assert_eq!(state.storage_error, None);
    }
}
