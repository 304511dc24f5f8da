use thiserror::Error;

// Every failure the client can surface. Display is what a view shows inline.
#[derive(Error, Debug)]
pub enum ApiError {
    // Raised locally, before any request is sent
    #[error("{0}")]
    Validation(String),

    // Non-2xx response; message is the server's `error` field or a status line
    #[error("{message}")]
    Remote { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}
