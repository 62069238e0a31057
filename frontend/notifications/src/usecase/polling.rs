use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::usecase::contracts::NotificationGateway;
use crate::usecase::notifications::NotificationStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Background resynchronisation of the unread counter.
#[derive(Debug, Clone, Copy)]
pub struct PollingRefresher {
    period: Duration,
}

impl Default for PollingRefresher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollingRefresher {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts polling. The first refresh happens one full period from now.
    pub fn spawn<G>(&self, store: Arc<NotificationStore<G>>) -> PollingHandle
    where
        G: NotificationGateway + 'static,
    {
        let period = self.period;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tracing::info!(period_secs = period.as_secs(), "unread count polling started");

            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Failures are recorded on the store; the schedule keeps going.
                        store.load_unread_count().await;
                        metrics::counter!("notification_unread_polls_total").increment(1);
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            tracing::info!("unread count polling stopped");
        });

        PollingHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owns the polling task. Dropping the handle aborts it.
pub struct PollingHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    /// Stops the task and waits for an in-flight refresh to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "polling task ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::Session;
    use crate::repository::errors::GatewayError;
    use crate::usecase::contracts::MockNotificationGateway;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn store_counting_polls(
        fail_first: bool,
    ) -> (Arc<NotificationStore<MockNotificationGateway>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut gateway = MockNotificationGateway::new();
        gateway.expect_unread_count().returning(move |_| {
            let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
            if fail_first && n == 1 {
                Err(GatewayError::Transport("connection reset".to_string()))
            } else {
                Ok(n as u64 * 10)
            }
        });

        let store = Arc::new(NotificationStore::new(gateway));
        store.set_session(Some(Session::new("user-1", "tenant-1", "token"))).await;
        (store, calls)
    }

    #[test]
    fn test_default_period_is_thirty_seconds() {
        assert_eq!(PollingRefresher::default().period(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_every_period() {
        let (store, calls) = store_counting_polls(false).await;
        let handle = PollingRefresher::new(Duration::from_secs(30)).spawn(store.clone());

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(66)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.unread_count(), 30);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_schedule() {
        let (store, calls) = store_counting_polls(true).await;
        let handle = PollingRefresher::new(Duration::from_secs(30)).spawn(store.clone());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.unread_count(), 0);
        assert!(store.error().await.is_some());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.unread_count(), 20);
        assert!(!handle.is_finished());

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_polling() {
        let (store, calls) = store_counting_polls(false).await;
        let handle = PollingRefresher::new(Duration::from_secs(30)).spawn(store);

        tokio::time::sleep(Duration::from_secs(31)).await;
        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_polling() {
        let (store, calls) = store_counting_polls(false).await;
        let handle = PollingRefresher::new(Duration::from_secs(30)).spawn(store);

        drop(handle);
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
