use thiserror::Error;

use crate::repository::errors::GatewayError;

/// Failure of a store operation. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<GatewayError> for StoreError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Status { status, message } if status >= 500 => {
                StoreError::Unavailable(message)
            }
            GatewayError::Status { message, .. } => StoreError::Rejected(message),
            GatewayError::Transport(_) => {
                StoreError::Unavailable("Unable to reach the notification service".to_string())
            }
            GatewayError::Decode(msg) => StoreError::Internal(format!("Unexpected server response: {}", msg)),
        }
    }
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push permission denied")]
    PermissionDenied,

    #[error("push token unavailable: {0}")]
    Token(String),

    #[error("push platform error: {0}")]
    Platform(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_is_kept() {
        let err: StoreError = GatewayError::Status {
            status: 404,
            message: "Notification not found".to_string(),
        }
        .into();

        assert_eq!(err, StoreError::Rejected("Notification not found".to_string()));
        assert_eq!(err.to_string(), "Notification not found");
    }

    #[test]
    fn test_server_failure_is_unavailable() {
        let err: StoreError = GatewayError::Status {
            status: 503,
            message: "Maintenance".to_string(),
        }
        .into();

        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_transport_error_is_readable() {
        let err: StoreError = GatewayError::Transport("connection refused".to_string()).into();

        assert_eq!(err.to_string(), "Unable to reach the notification service");
    }
}
