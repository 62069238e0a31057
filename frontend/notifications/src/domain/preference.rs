use serde::{Deserialize, Serialize};

use crate::domain::notification::NotificationCategory;

/// Delivery channels enabled for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreference {
    pub category: NotificationCategory,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub in_app_enabled: bool,
}

impl NotificationPreference {
    pub fn merge(&mut self, update: &PreferenceUpdate) {
        if let Some(email) = update.email_enabled {
            self.email_enabled = email;
        }
        if let Some(push) = update.push_enabled {
            self.push_enabled = push;
        }
        if let Some(in_app) = update.in_app_enabled {
            self.in_app_enabled = in_app;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceUpdate {
    pub category: NotificationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app_enabled: Option<bool>,
}

impl PreferenceUpdate {
    pub fn new(category: NotificationCategory) -> Self {
        Self {
            category,
            email_enabled: None,
            push_enabled: None,
            in_app_enabled: None,
        }
    }

    pub fn email(mut self, enabled: bool) -> Self {
        self.email_enabled = Some(enabled);
        self
    }

    pub fn push(mut self, enabled: bool) -> Self {
        self.push_enabled = Some(enabled);
        self
    }

    pub fn in_app(mut self, enabled: bool) -> Self {
        self.in_app_enabled = Some(enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_serializes_only_given_flags() {
        let update = PreferenceUpdate::new(NotificationCategory::Maintenance).push(false);

        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(json, serde_json::json!({ "category": "maintenance", "pushEnabled": false }));
    }

    #[test]
    fn test_merge_keeps_untouched_channels() {
        let mut pref = NotificationPreference {
            category: NotificationCategory::Quality,
            email_enabled: true,
            push_enabled: true,
            in_app_enabled: true,
        };

        pref.merge(&PreferenceUpdate::new(NotificationCategory::Quality).email(false));

        assert!(!pref.email_enabled);
        assert!(pref.push_enabled);
        assert!(pref.in_app_enabled);
    }
}
