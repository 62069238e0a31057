use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::filter::NotificationFilter;
use crate::domain::notification::NotificationPage;
use crate::domain::preference::{NotificationPreference, PreferenceUpdate};
use crate::domain::push::{PermissionStatus, PushPayload};
use crate::domain::session::Session;
use crate::repository::errors::GatewayError;
use crate::usecase::error::PushError;

/// Acknowledgement body returned by the mutation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn list(
        &self,
        session: &Session,
        filter: &NotificationFilter,
    ) -> Result<NotificationPage, GatewayError>;
    async fn unread_count(&self, session: &Session) -> Result<u64, GatewayError>;
    async fn mark_as_read(&self, session: &Session, id: &str) -> Result<MessageResponse, GatewayError>;
    async fn mark_as_unread(&self, session: &Session, id: &str) -> Result<MessageResponse, GatewayError>;
    async fn mark_all_as_read(&self, session: &Session) -> Result<MessageResponse, GatewayError>;
    async fn delete(&self, session: &Session, id: &str) -> Result<MessageResponse, GatewayError>;
    async fn preferences(&self, session: &Session) -> Result<Vec<NotificationPreference>, GatewayError>;
    async fn update_preference(
        &self,
        session: &Session,
        update: &PreferenceUpdate,
    ) -> Result<MessageResponse, GatewayError>;
}

/// OS-level push service on mobile targets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushPlatform: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus, PushError>;
    async fn request_permission(&self) -> Result<PermissionStatus, PushError>;
    async fn push_token(&self) -> Result<String, PushError>;
    async fn set_badge_count(&self, count: u64) -> Result<(), PushError>;
    /// Messages delivered while the app is in the foreground.
    fn subscribe_received(&self) -> broadcast::Receiver<PushPayload>;
    /// Messages the user tapped on.
    fn subscribe_responses(&self) -> broadcast::Receiver<PushPayload>;
}
