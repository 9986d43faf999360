use std::sync::Arc;

use fedor_core::{Config, Target};
use futures::FutureExt;

use crate::debounce::Debouncer;
use crate::reviewer::Reviewer;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scheduler: Arc<Debouncer<Target>>,
}

impl AppState {
    /// Wire the scheduler to a [`Reviewer`] built from `config`.
    pub fn new(config: Arc<Config>) -> Self {
        let reviewer = Reviewer::new(Arc::clone(&config));
        let scheduler = Debouncer::new(config.webhook_delay(), move |target: Target, reason: String| {
            let reviewer = reviewer.clone();
            async move {
                reviewer.review(target, reason).await;
            }
            .boxed()
        });
        Self::with_scheduler(config, scheduler)
    }

    /// State with a caller-supplied scheduler; tests use this to observe
    /// what the webhook handler schedules.
    pub fn with_scheduler(config: Arc<Config>, scheduler: Debouncer<Target>) -> Self {
        Self {
            config,
            scheduler: Arc::new(scheduler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn scheduler_uses_configured_delay() {
        let config = Arc::new(Config {
            webhook_secret: "s".into(),
            webhook_delay_secs: 12,
            dummy_mode: true,
            ..Config::default()
        });
        let state = AppState::new(config);
        assert_eq!(state.scheduler.delay(), Duration::from_secs(12));
        assert_eq!(state.scheduler.pending_count(), 0);
    }
}
