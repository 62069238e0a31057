use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
