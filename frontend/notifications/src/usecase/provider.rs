use std::sync::Arc;

use crate::domain::filter::{DEFAULT_PAGE_LIMIT, NotificationFilter};
use crate::domain::session::Session;
use crate::usecase::contracts::{NotificationGateway, PushPlatform};
use crate::usecase::notifications::NotificationStore;
use crate::usecase::polling::{PollingHandle, PollingRefresher};
use crate::usecase::push::PushBridge;

/// Ties the store, the poller and the push bridge to one session.
///
/// At most one poller and one bridge run per provider; starting a new
/// session always tears down the previous one first.
pub struct NotificationProvider<G>
where
    G: NotificationGateway + 'static,
{
    store: Arc<NotificationStore<G>>,
    refresher: PollingRefresher,
    platform: Option<Arc<dyn PushPlatform>>,
    page_limit: u32,
    polling: Option<PollingHandle>,
    push: Option<PushBridge>,
}

impl<G> NotificationProvider<G>
where
    G: NotificationGateway + 'static,
{
    pub fn new(gateway: G, refresher: PollingRefresher) -> Self {
        Self {
            store: Arc::new(NotificationStore::new(gateway)),
            refresher,
            platform: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            polling: None,
            push: None,
        }
    }

    pub fn with_push_platform(mut self, platform: Arc<dyn PushPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    pub fn store(&self) -> &Arc<NotificationStore<G>> {
        &self.store
    }

    pub fn is_active(&self) -> bool {
        self.polling.is_some()
    }

    pub fn push_token(&self) -> Option<&str> {
        self.push.as_ref().and_then(PushBridge::token)
    }

    pub fn push_bridge_mut(&mut self) -> Option<&mut PushBridge> {
        self.push.as_mut()
    }

    #[tracing::instrument(skip_all, fields(user_id = %session.user_id, tenant_id = %session.tenant_id))]
    pub async fn begin_session(&mut self, session: Session) {
        self.end_session().await;

        self.store.set_session(Some(session)).await;
        tokio::join!(
            self.store
                .load_notifications(NotificationFilter::default().with_limit(self.page_limit)),
            self.store.load_unread_count(),
            self.store.load_preferences(),
        );

        self.polling = Some(self.refresher.spawn(self.store.clone()));
        if let Some(platform) = &self.platform {
            self.push = Some(PushBridge::start(platform.clone(), self.store.clone()).await);
        }

        tracing::info!(unread = self.store.unread_count(), "notification session started");
    }

    /// Stops background work and clears the store. Safe to call without an
    /// active session.
    pub async fn end_session(&mut self) {
        let was_active = self.is_active();

        if let Some(polling) = self.polling.take() {
            polling.stop().await;
        }
        if let Some(push) = self.push.take() {
            push.shutdown().await;
        }
        self.store.clear().await;

        if was_active {
            tracing::info!("notification session ended");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::{Notification, NotificationCategory, NotificationPage, NotificationType, Pagination};
    use crate::domain::preference::NotificationPreference;
    use crate::domain::push::{PermissionStatus, PushPayload};
    use crate::usecase::contracts::{MockNotificationGateway, MockPushPlatform};
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn gateway(unread: u64) -> MockNotificationGateway {
        let mut gateway = MockNotificationGateway::new();
        gateway.expect_list().returning(|_, filter| {
            Ok(NotificationPage {
                notifications: vec![Notification::new(
                    "n-1",
                    "Work order overdue",
                    "Lathe 2 inspection",
                    NotificationType::Warning,
                    NotificationCategory::Maintenance,
                )],
                pagination: Pagination {
                    page: filter.page,
                    limit: filter.limit,
                    total: 1,
                    pages: 1,
                },
            })
        });
        gateway.expect_unread_count().returning(move |_| Ok(unread));
        gateway.expect_preferences().returning(|_| {
            Ok(vec![NotificationPreference {
                category: NotificationCategory::Maintenance,
                email_enabled: false,
                push_enabled: true,
                in_app_enabled: true,
            }])
        });
        gateway
    }

    #[tokio::test]
    async fn test_begin_session_loads_everything() {
        let mut provider = NotificationProvider::new(gateway(7), PollingRefresher::new(Duration::from_secs(3600)))
            .with_page_limit(5);

        provider.begin_session(Session::new("user-1", "tenant-1", "token")).await;

        let store = provider.store();
        assert!(provider.is_active());
        assert_eq!(store.notifications().await.len(), 1);
        assert_eq!(store.pagination().await.map(|p| p.limit), Some(5));
        assert_eq!(store.preferences().await.len(), 1);
        assert_eq!(store.unread_count(), 7);
        assert!(provider.push_token().is_none());

        provider.end_session().await;
    }

    #[tokio::test]
    async fn test_end_session_clears_state() {
        let mut provider = NotificationProvider::new(gateway(2), PollingRefresher::default());
        provider.begin_session(Session::new("user-1", "tenant-1", "token")).await;

        provider.end_session().await;

        assert!(!provider.is_active());
        assert!(provider.store().session().await.is_none());
        assert!(provider.store().notifications().await.is_empty());
        assert_eq!(provider.store().unread_count(), 0);
    }

    #[tokio::test]
    async fn test_end_session_without_session_is_harmless() {
        let mut provider = NotificationProvider::new(MockNotificationGateway::new(), PollingRefresher::default());

        provider.end_session().await;

        assert!(!provider.is_active());
    }

    #[tokio::test]
    async fn test_tenant_switch_restarts_session() {
        let mut provider = NotificationProvider::new(gateway(3), PollingRefresher::default());
        provider.begin_session(Session::new("user-1", "tenant-1", "token")).await;

        provider.begin_session(Session::new("user-1", "tenant-2", "token")).await;

        assert!(provider.is_active());
        assert_eq!(provider.store().session().await.unwrap().tenant_id, "tenant-2");
        assert_eq!(provider.store().unread_count(), 3);

        provider.end_session().await;
    }

    #[tokio::test]
    async fn test_push_bridge_follows_session() {
        let (received, _) = broadcast::channel::<PushPayload>(4);
        let (responses, _) = broadcast::channel::<PushPayload>(4);
        let mut platform = MockPushPlatform::new();
        platform.expect_permission_status().returning(|| Ok(PermissionStatus::Granted));
        platform.expect_push_token().returning(|| Ok("device-token".to_string()));
        platform.expect_set_badge_count().returning(|_| Ok(()));
        let tx = received.clone();
        platform.expect_subscribe_received().returning(move || tx.subscribe());
        let tx = responses.clone();
        platform.expect_subscribe_responses().returning(move || tx.subscribe());

        let mut provider = NotificationProvider::new(gateway(1), PollingRefresher::default())
            .with_push_platform(Arc::new(platform));

        provider.begin_session(Session::new("user-1", "tenant-1", "token")).await;
        assert_eq!(provider.push_token(), Some("device-token"));
        assert!(provider.push_bridge_mut().is_some());
        assert_eq!(received.receiver_count(), 1);

        provider.end_session().await;
        assert!(provider.push_token().is_none());
        assert_eq!(received.receiver_count(), 0);
        assert_eq!(responses.receiver_count(), 0);
    }
}
