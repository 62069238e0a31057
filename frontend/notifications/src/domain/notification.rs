use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Warning,
    Error,
    Success,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
            NotificationType::Success => "success",
            NotificationType::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business area a notification belongs to. Preferences are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Hr,
    Inventory,
    Crm,
    Production,
    Quality,
    Maintenance,
    Ledger,
    System,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Hr => "hr",
            NotificationCategory::Inventory => "inventory",
            NotificationCategory::Crm => "crm",
            NotificationCategory::Production => "production",
            NotificationCategory::Quality => "quality",
            NotificationCategory::Maintenance => "maintenance",
            NotificationCategory::Ledger => "ledger",
            NotificationCategory::System => "system",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub category: NotificationCategory,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        notification_type: NotificationType,
        category: NotificationCategory,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            message: message.into(),
            notification_type,
            category,
            is_read: false,
            read_at: None,
            action_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        self.is_read = true;
        self.read_at = Some(at);
    }

    pub fn mark_unread(&mut self) {
        self.is_read = false;
        self.read_at = None;
    }

    /// Shallow merge: every `Some` field of the patch replaces the current value.
    pub fn apply(&mut self, patch: NotificationPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(message) = patch.message {
            self.message = message;
        }
        if let Some(notification_type) = patch.notification_type {
            self.notification_type = notification_type;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(is_read) = patch.is_read {
            self.is_read = is_read;
        }
        if let Some(read_at) = patch.read_at {
            self.read_at = read_at;
        }
        if let Some(action_url) = patch.action_url {
            self.action_url = action_url;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub category: Option<NotificationCategory>,
    pub is_read: Option<bool>,
    pub read_at: Option<Option<DateTime<Utc>>>,
    pub action_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub pagination: Pagination,
}
