use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::filter::NotificationFilter;
use crate::domain::notification::NotificationPage;
use crate::domain::preference::{NotificationPreference, PreferenceUpdate};
use crate::domain::session::Session;
use crate::repository::errors::GatewayError;
use crate::usecase::contracts::{MessageResponse, NotificationGateway};

pub const TENANT_HEADER: &str = "X-Tenant-ID";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountResponse {
    unread_count: u64,
}

#[derive(Deserialize)]
struct PreferencesResponse {
    preferences: Vec<NotificationPreference>,
}

/// REST client for the notification endpoints. Stateless: no retries, no caching.
#[derive(Clone)]
pub struct HttpNotificationGateway {
    client: Client,
    base_url: Url,
}

impl HttpNotificationGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Transport(format!("invalid base url {}", base_url)));
        }

        let client = Client::builder()
            .user_agent(concat!("notifications/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build http client: {}", e)))?;

        tracing::info!(%base_url, ?timeout, "HttpNotificationGateway created");

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .push("notifications")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, session: &Session) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&session.access_token)
            .header(TENANT_HEADER, &session.tenant_id)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "notification request failed");
            record(operation, "transport_error");
            GatewayError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_message(&body)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            tracing::warn!(operation, %status, %message, "notification service returned error");
            record(operation, "http_error");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "failed to read notification service response");
            record(operation, "transport_error");
            GatewayError::Transport(e.to_string())
        })?;

        // An empty success body (e.g. 204) reads as `{}`.
        let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &body };
        let parsed = serde_json::from_slice::<T>(body).map_err(|e| {
            tracing::error!(operation, error = %e, "failed to parse notification service response");
            record(operation, "decode_error");
            GatewayError::Decode(e.to_string())
        })?;

        record(operation, "ok");
        Ok(parsed)
    }
}

fn record(operation: &'static str, outcome: &'static str) {
    metrics::counter!(
        "notification_gateway_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Error text from a `{ "message": .. }` or `{ "error": .. }` body.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id, page = filter.page, limit = filter.limit))]
    async fn list(
        &self,
        session: &Session,
        filter: &NotificationFilter,
    ) -> Result<NotificationPage, GatewayError> {
        let url = self.endpoint(&[])?;
        let request = self.request(Method::GET, url, session).query(&filter.query_pairs());
        let page: NotificationPage = self.send("list", request).await?;

        tracing::debug!(count = page.notifications.len(), total = page.pagination.total, "notifications fetched");
        Ok(page)
    }

    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    async fn unread_count(&self, session: &Session) -> Result<u64, GatewayError> {
        let url = self.endpoint(&["unread-count"])?;
        let response: UnreadCountResponse = self
            .send("unread_count", self.request(Method::GET, url, session))
            .await?;
        Ok(response.unread_count)
    }

    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    async fn mark_as_read(&self, session: &Session, id: &str) -> Result<MessageResponse, GatewayError> {
        let url = self.endpoint(&[id, "read"])?;
        self.send("mark_as_read", self.request(Method::PATCH, url, session)).await
    }

    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    async fn mark_as_unread(&self, session: &Session, id: &str) -> Result<MessageResponse, GatewayError> {
        let url = self.endpoint(&[id, "unread"])?;
        self.send("mark_as_unread", self.request(Method::PATCH, url, session)).await
    }

    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    async fn mark_all_as_read(&self, session: &Session) -> Result<MessageResponse, GatewayError> {
        let url = self.endpoint(&["read-all"])?;
        self.send("mark_all_as_read", self.request(Method::PATCH, url, session)).await
    }

    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    async fn delete(&self, session: &Session, id: &str) -> Result<MessageResponse, GatewayError> {
        let url = self.endpoint(&[id])?;
        self.send("delete", self.request(Method::DELETE, url, session)).await
    }

    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id))]
    async fn preferences(&self, session: &Session) -> Result<Vec<NotificationPreference>, GatewayError> {
        let url = self.endpoint(&["preferences"])?;
        let response: PreferencesResponse = self
            .send("preferences", self.request(Method::GET, url, session))
            .await?;
        Ok(response.preferences)
    }

    #[tracing::instrument(skip(self, session), fields(tenant_id = %session.tenant_id, category = %update.category))]
    async fn update_preference(
        &self,
        session: &Session,
        update: &PreferenceUpdate,
    ) -> Result<MessageResponse, GatewayError> {
        let url = self.endpoint(&["preferences"])?;
        let request = self.request(Method::PUT, url, session).json(update);
        self.send("update_preference", request).await
    }
}
