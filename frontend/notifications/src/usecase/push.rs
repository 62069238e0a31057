use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::domain::push::{PermissionStatus, PushPayload};
use crate::usecase::contracts::{NotificationGateway, PushPlatform};
use crate::usecase::error::PushError;
use crate::usecase::notifications::NotificationStore;

const NAVIGATION_BUFFER: usize = 16;

/// Feeds platform push messages into the store and mirrors the unread
/// counter onto the app badge.
///
/// Without a push token (permission denied, token fetch failed) the bridge
/// still listens for messages but never touches the badge; the session then
/// relies on polling alone.
pub struct PushBridge {
    token: Option<String>,
    navigation: mpsc::Receiver<String>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PushBridge {
    #[tracing::instrument(skip_all)]
    pub async fn start<G>(platform: Arc<dyn PushPlatform>, store: Arc<NotificationStore<G>>) -> Self
    where
        G: NotificationGateway + 'static,
    {
        let token = match register(platform.as_ref()).await {
            Ok(token) => {
                tracing::info!("push token obtained");
                Some(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "push delivery unavailable, relying on polling");
                None
            }
        };

        let (shutdown, _) = watch::channel(false);
        let (navigation_tx, navigation) = mpsc::channel(NAVIGATION_BUFFER);

        let mut tasks = vec![
            tokio::spawn(forward_received(
                platform.subscribe_received(),
                store.clone(),
                shutdown.subscribe(),
            )),
            tokio::spawn(forward_taps(
                platform.subscribe_responses(),
                navigation_tx,
                shutdown.subscribe(),
            )),
        ];
        if token.is_some() {
            tasks.push(tokio::spawn(sync_badge(
                platform,
                store.subscribe_unread(),
                shutdown.subscribe(),
            )));
        }

        Self {
            token,
            navigation,
            shutdown,
            tasks,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Next deep link from a tapped push message. `None` once the bridge has
    /// shut down.
    pub async fn next_navigation(&mut self) -> Option<String> {
        self.navigation.recv().await
    }

    /// Unregisters the listeners and waits for them to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "push listener ended abnormally");
            }
        }
        tracing::info!("push bridge stopped");
    }
}

impl Drop for PushBridge {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn register(platform: &dyn PushPlatform) -> Result<String, PushError> {
    let mut status = platform.permission_status().await?;
    if status != PermissionStatus::Granted {
        tracing::debug!(?status, "requesting push permission");
        status = platform.request_permission().await?;
    }
    if status != PermissionStatus::Granted {
        return Err(PushError::PermissionDenied);
    }

    platform.push_token().await
}

async fn forward_received<G>(
    mut rx: broadcast::Receiver<PushPayload>,
    store: Arc<NotificationStore<G>>,
    mut shutdown: watch::Receiver<bool>,
) where
    G: NotificationGateway,
{
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(payload) => match payload.embedded_notification() {
                    Some(notification) => {
                        tracing::debug!(notification_id = %notification.id, "push notification received");
                        store.add_notification(notification).await;
                    }
                    None => tracing::debug!("push message without a notification, ignored"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "push listener lagged, some messages were skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("push delivery channel closed");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn forward_taps(
    mut rx: broadcast::Receiver<PushPayload>,
    navigation: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(payload) => {
                    let Some(url) = payload.action_url() else {
                        tracing::debug!("tapped push message has no action url");
                        continue;
                    };
                    tracing::debug!(action_url = %url, "push message tapped");
                    if navigation.send(url).await.is_err() {
                        tracing::debug!("navigation receiver gone");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "tap listener lagged, some messages were skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("push response channel closed");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn sync_badge(
    platform: Arc<dyn PushPlatform>,
    mut unread: watch::Receiver<u64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let count = *unread.borrow_and_update();
        if let Err(e) = platform.set_badge_count(count).await {
            tracing::warn!(error = %e, count, "failed to set badge count");
        }

        tokio::select! {
            changed = unread.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
