use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::game_service::GameService;
use quest_core::model::ProgressEvent;

/// Auto-hide timer for the celebratory UI signal.
///
/// Schedules a single pending `ShowConfetti(false)` dispatch. Re-scheduling
/// aborts the still-pending timer first, so a stale dismiss can never fire
/// after a newer achievement has raised the confetti again.
#[derive(Default)]
pub struct ConfettiTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ConfettiTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch `ShowConfetti(false)` after `delay`, replacing any timer
    /// that is still pending.
    pub fn schedule(&self, service: Arc<GameService>, delay: Duration) {
        let mut guard = self.lock_pending();
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            service.dispatch(ProgressEvent::ShowConfetti(false)).await;
        }));
    }

    /// Discard the pending dismiss, if any.
    pub fn cancel(&self) {
        if let Some(task) = self.lock_pending().take() {
            task.abort();
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConfettiTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quest_core::time::fixed_clock;
    use quest_core::{Catalog, Reducer};
    use storage::{InMemoryStore, ProgressStore};

    async fn build_service() -> Arc<GameService> {
        let catalog = Catalog::builtin();
        let reducer = Reducer::new(catalog.clone()).with_clock(fixed_clock());
        let store =
            ProgressStore::new(Arc::new(InMemoryStore::new()), catalog).with_clock(fixed_clock());
        let service = Arc::new(GameService::new(reducer, store));
        service.init().await;
        service
    }

    #[tokio::test]
    async fn timer_extinguishes_the_confetti() {
        let service = build_service().await;
        service.show_confetti(true).await;

        let timer = ConfettiTimer::new();
        timer.schedule(Arc::clone(&service), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!service.state().show_confetti);
    }

    #[tokio::test]
    async fn retrigger_discards_the_stale_dismiss() {
        let service = build_service().await;
        let timer = ConfettiTimer::new();

        service.show_confetti(true).await;
        timer.schedule(Arc::clone(&service), Duration::from_millis(10));

        // A new trigger arrives before the first dismiss fires.
        service.show_confetti(true).await;
        timer.schedule(Arc::clone(&service), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(100)).await;
        // The aborted 10ms timer must not have extinguished the new signal.
        assert!(service.state().show_confetti);

        timer.cancel();
    }

    #[tokio::test]
    async fn cancel_discards_the_pending_dismiss() {
        let service = build_service().await;
        let timer = ConfettiTimer::new();

        service.show_confetti(true).await;
        timer.schedule(Arc::clone(&service), Duration::from_millis(10));
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.state().show_confetti);
    }
}
