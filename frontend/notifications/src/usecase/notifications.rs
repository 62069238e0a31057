use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{RwLock, watch};

use crate::domain::filter::NotificationFilter;
use crate::domain::notification::{Notification, NotificationPatch, Pagination};
use crate::domain::preference::{NotificationPreference, PreferenceUpdate};
use crate::domain::session::Session;
use crate::repository::errors::GatewayError;
use crate::usecase::contracts::NotificationGateway;
use crate::usecase::error::StoreError;

#[derive(Default)]
struct StoreState {
    session: Option<Session>,
    notifications: Vec<Notification>,
    preferences: Vec<NotificationPreference>,
    pagination: Option<Pagination>,
    filter: NotificationFilter,
    loading: bool,
    error: Option<String>,
    pending: HashMap<String, usize>,
}

/// Current user's notification view and unread counter for the active tenant.
///
/// Every mutation goes to the server first and is applied locally only once
/// the server confirmed it, so a failed call leaves the list and the counter
/// untouched. The counter is published on a watch channel; all decrements
/// clamp at zero.
///
/// Without a session every operation is a silent no-op.
///
/// Two concurrent mutations on the same id are not ordered against each
/// other; callers are expected to disable the control while
/// [`is_pending`](Self::is_pending) is true.
pub struct NotificationStore<G>
where
    G: NotificationGateway,
{
    gateway: G,
    state: RwLock<StoreState>,
    unread: watch::Sender<u64>,
}

impl<G> NotificationStore<G>
where
    G: NotificationGateway,
{
    pub fn new(gateway: G) -> Self {
        let (unread, _) = watch::channel(0);
        Self {
            gateway,
            state: RwLock::new(StoreState::default()),
            unread,
        }
    }

    /// Installs the session. A different user or tenant, or `None`, resets
    /// all cached state.
    pub async fn set_session(&self, session: Option<Session>) {
        let mut state = self.state.write().await;

        let keep = match (&state.session, &session) {
            (Some(current), Some(next)) => current.same_scope(next),
            _ => false,
        };

        if !keep {
            let had_session = state.session.is_some();
            *state = StoreState::default();
            self.set_unread(0);
            if had_session {
                tracing::info!("notification state cleared");
            }
        }

        if let Some(s) = &session {
            tracing::info!(user_id = %s.user_id, tenant_id = %s.tenant_id, "notification session set");
        }
        state.session = session;
    }

    pub async fn clear(&self) {
        self.set_session(None).await;
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn preferences(&self) -> Vec<NotificationPreference> {
        self.state.read().await.preferences.clone()
    }

    pub async fn pagination(&self) -> Option<Pagination> {
        self.state.read().await.pagination
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    /// True while at least one mutation for this id is waiting on the server.
    pub async fn is_pending(&self, id: &str) -> bool {
        self.state.read().await.pending.contains_key(id)
    }

    pub fn unread_count(&self) -> u64 {
        *self.unread.borrow()
    }

    pub fn subscribe_unread(&self) -> watch::Receiver<u64> {
        self.unread.subscribe()
    }

    /// Replaces the list with one page from the server. Errors are recorded,
    /// never returned.
    #[tracing::instrument(skip(self), fields(page = filter.page, limit = filter.limit))]
    pub async fn load_notifications(&self, filter: NotificationFilter) {
        let Some(session) = self.begin_load().await else {
            return;
        };

        let result = self.gateway.list(&session, &filter).await;

        let mut state = self.state.write().await;
        state.loading = false;
        if !Self::in_scope(&state, &session) {
            tracing::debug!("session changed while loading, dropping result");
            return;
        }

        match result {
            Ok(page) => {
                tracing::debug!(count = page.notifications.len(), total = page.pagination.total, "notifications loaded");
                state.notifications = page.notifications;
                state.pagination = Some(page.pagination);
                state.filter = filter;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load notifications");
                state.error = Some(StoreError::from(e).to_string());
            }
        }
    }

    /// Overwrites the counter with the server value.
    #[tracing::instrument(skip(self))]
    pub async fn load_unread_count(&self) {
        let Some(session) = self.begin_request().await else {
            return;
        };

        let result = self.gateway.unread_count(&session).await;

        let mut state = self.state.write().await;
        if !Self::in_scope(&state, &session) {
            return;
        }

        match result {
            Ok(count) => {
                let previous = self.unread_count();
                if previous != count {
                    tracing::debug!(previous, count, "unread count resynchronised");
                }
                self.set_unread(count);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load unread count");
                state.error = Some(StoreError::from(e).to_string());
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_preferences(&self) {
        let Some(session) = self.begin_request().await else {
            return;
        };

        let result = self.gateway.preferences(&session).await;

        let mut state = self.state.write().await;
        if !Self::in_scope(&state, &session) {
            return;
        }

        match result {
            Ok(preferences) => {
                tracing::debug!(count = preferences.len(), "preferences loaded");
                state.preferences = preferences;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load preferences");
                state.error = Some(StoreError::from(e).to_string());
            }
        }
    }

    /// Reloads the last requested page and the counter together.
    pub async fn refresh_notifications(&self) {
        let filter = self.state.read().await.filter.clone();
        tokio::join!(self.load_notifications(filter), self.load_unread_count());
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_as_read(&self, id: &str) -> Result<(), StoreError> {
        let Some(session) = self.begin_mutation(Some(id)).await else {
            return Ok(());
        };

        let result = self.gateway.mark_as_read(&session, id).await;

        let mut state = self.state.write().await;
        Self::release(&mut state, &session, id);
        if let Err(e) = result {
            return Err(Self::reject(&mut state, &session, "mark notification as read", e));
        }
        if !Self::in_scope(&state, &session) {
            return Ok(());
        }

        let already_read = match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if n.is_read => true,
            Some(n) => {
                n.mark_read(Utc::now());
                false
            }
            None => false,
        };
        if !already_read {
            self.decrement_unread();
        }

        tracing::debug!(notification_id = %id, "notification marked as read");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_as_unread(&self, id: &str) -> Result<(), StoreError> {
        let Some(session) = self.begin_mutation(Some(id)).await else {
            return Ok(());
        };

        let result = self.gateway.mark_as_unread(&session, id).await;

        let mut state = self.state.write().await;
        Self::release(&mut state, &session, id);
        if let Err(e) = result {
            return Err(Self::reject(&mut state, &session, "mark notification as unread", e));
        }
        if !Self::in_scope(&state, &session) {
            return Ok(());
        }

        let already_unread = match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.is_read => true,
            Some(n) => {
                n.mark_unread();
                false
            }
            None => false,
        };
        if !already_unread {
            self.unread.send_modify(|count| *count += 1);
            self.publish_gauge();
        }

        tracing::debug!(notification_id = %id, "notification marked as unread");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_all_as_read(&self) -> Result<(), StoreError> {
        let Some(session) = self.begin_mutation(None).await else {
            return Ok(());
        };

        let result = self.gateway.mark_all_as_read(&session).await;

        let mut state = self.state.write().await;
        if let Err(e) = result {
            return Err(Self::reject(&mut state, &session, "mark all notifications as read", e));
        }
        if !Self::in_scope(&state, &session) {
            return Ok(());
        }

        let now = Utc::now();
        for n in state.notifications.iter_mut() {
            n.mark_read(now);
        }
        self.set_unread(0);

        tracing::debug!(count = state.notifications.len(), "all notifications marked as read");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_notification(&self, id: &str) -> Result<(), StoreError> {
        let Some(session) = self.begin_mutation(Some(id)).await else {
            return Ok(());
        };

        let result = self.gateway.delete(&session, id).await;

        let mut state = self.state.write().await;
        Self::release(&mut state, &session, id);
        if let Err(e) = result {
            return Err(Self::reject(&mut state, &session, "delete notification", e));
        }
        if !Self::in_scope(&state, &session) {
            return Ok(());
        }

        if let Some(removed) = Self::take(&mut state, id) {
            if !removed.is_read {
                self.decrement_unread();
            }
        }

        tracing::debug!(notification_id = %id, "notification deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(category = %update.category))]
    pub async fn update_preference(&self, update: PreferenceUpdate) -> Result<(), StoreError> {
        let Some(session) = self.begin_mutation(None).await else {
            return Ok(());
        };

        let result = self.gateway.update_preference(&session, &update).await;

        let mut state = self.state.write().await;
        if let Err(e) = result {
            return Err(Self::reject(&mut state, &session, "update notification preference", e));
        }
        if !Self::in_scope(&state, &session) {
            return Ok(());
        }

        match state.preferences.iter_mut().find(|p| p.category == update.category) {
            Some(pref) => pref.merge(&update),
            None => tracing::debug!("preference not cached locally, nothing to merge"),
        }

        tracing::debug!("notification preference updated");
        Ok(())
    }

    /// Prepends a notification received out of band.
    pub async fn add_notification(&self, notification: Notification) {
        let mut state = self.state.write().await;
        if state.session.is_none() {
            return;
        }

        tracing::debug!(notification_id = %notification.id, is_read = notification.is_read, "notification added");
        let unread = !notification.is_read;
        state.notifications.insert(0, notification);
        if unread {
            self.unread.send_modify(|count| *count += 1);
            self.publish_gauge();
        }
    }

    /// Shallow-merges the patch; the counter is left to the caller.
    pub async fn update_notification(&self, id: &str, patch: NotificationPatch) {
        let mut state = self.state.write().await;
        if state.session.is_none() {
            return;
        }

        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => n.apply(patch),
            None => tracing::debug!(notification_id = %id, "notification to update not in view"),
        }
    }

    pub async fn remove_notification(&self, id: &str) {
        let mut state = self.state.write().await;
        if state.session.is_none() {
            return;
        }

        if let Some(removed) = Self::take(&mut state, id) {
            if !removed.is_read {
                self.decrement_unread();
            }
        }
    }

    async fn begin_load(&self) -> Option<Session> {
        let mut state = self.state.write().await;
        let Some(session) = state.session.clone() else {
            tracing::debug!("no active session, skipping");
            return None;
        };
        state.loading = true;
        state.error = None;
        Some(session)
    }

    // Background refreshes leave the last error in place for the UI.
    async fn begin_request(&self) -> Option<Session> {
        let session = self.state.read().await.session.clone();
        if session.is_none() {
            tracing::debug!("no active session, skipping");
        }
        session
    }

    async fn begin_mutation(&self, id: Option<&str>) -> Option<Session> {
        let mut state = self.state.write().await;
        let Some(session) = state.session.clone() else {
            tracing::debug!("no active session, skipping");
            return None;
        };
        state.error = None;
        if let Some(id) = id {
            let in_flight = state.pending.entry(id.to_string()).or_insert(0);
            *in_flight += 1;
            if *in_flight > 1 {
                tracing::warn!(notification_id = %id, in_flight = *in_flight, "overlapping mutation for the same notification");
            }
        }
        Some(session)
    }

    fn in_scope(state: &StoreState, session: &Session) -> bool {
        state
            .session
            .as_ref()
            .is_some_and(|current| current.same_scope(session))
    }

    /// The caller always gets the error; the store records it only if the
    /// session that issued the call is still the current one.
    fn reject(state: &mut StoreState, session: &Session, action: &str, e: GatewayError) -> StoreError {
        tracing::warn!(error = %e, "failed to {}", action);
        let err = StoreError::from(e);
        if Self::in_scope(state, session) {
            state.error = Some(err.to_string());
        }
        err
    }

    fn release(state: &mut StoreState, session: &Session, id: &str) {
        if !Self::in_scope(state, session) {
            return;
        }
        if let Some(in_flight) = state.pending.get_mut(id) {
            *in_flight -= 1;
            if *in_flight == 0 {
                state.pending.remove(id);
            }
        }
    }

    fn take(state: &mut StoreState, id: &str) -> Option<Notification> {
        let index = state.notifications.iter().position(|n| n.id == id)?;
        Some(state.notifications.remove(index))
    }

    fn decrement_unread(&self) {
        self.unread.send_modify(|count| *count = count.saturating_sub(1));
        self.publish_gauge();
    }

    fn set_unread(&self, value: u64) {
        self.unread.send_if_modified(|count| {
            let changed = *count != value;
            *count = value;
            changed
        });
        self.publish_gauge();
    }

    fn publish_gauge(&self) {
        metrics::gauge!("notification_unread_count").set(self.unread_count() as f64);
    }
}
