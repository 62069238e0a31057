use serde_json::Value;

use crate::domain::notification::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Opaque data attached to a platform push message.
#[derive(Debug, Clone, PartialEq)]
pub struct PushPayload {
    pub data: Value,
}

impl PushPayload {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// The notification carried under `notification`, either as an object or
    /// as a serialized JSON string.
    pub fn embedded_notification(&self) -> Option<Notification> {
        let raw = self.data.get("notification")?;

        let parsed = match raw {
            Value::String(s) => serde_json::from_str::<Notification>(s),
            Value::Object(_) => serde_json::from_value::<Notification>(raw.clone()),
            _ => return None,
        };

        match parsed {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::debug!(error = %e, "push payload carries an unrecognised notification");
                None
            }
        }
    }

    pub fn action_url(&self) -> Option<String> {
        self.data
            .get("actionUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.embedded_notification().and_then(|n| n.action_url))
    }
}
