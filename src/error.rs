// Error types for mangofetch.
// Typed HTTP failures, caller-contract violations, and ambient I/O errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{message}")]
    NotFound { message: String, url: String },

    #[error("{message}")]
    Http {
        message: String,
        url: String,
        status: u16,
    },

    /// A failure the bot operator needs to hear about. `user_message` is safe
    /// to show in chat; `developer_message` is not.
    #[error("{user_message}")]
    DeveloperNotif {
        user_message: String,
        developer_message: String,
    },

    #[error("Invalid return type '{0}'")]
    InvalidRepresentation(String),

    #[error("Filename representation requires caching: {0}")]
    FilenameWithoutCache(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether the error carries a message meant for the end user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound { .. } | FetchError::Http { .. } | FetchError::DeveloperNotif { .. }
        )
    }

    /// The message to surface to the end user, if any.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            FetchError::NotFound { message, .. } | FetchError::Http { message, .. } => {
                Some(message)
            }
            FetchError::DeveloperNotif { user_message, .. } => Some(user_message),
            _ => None,
        }
    }

    /// HTTP status behind the error, when it came from an upstream response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::NotFound { .. } => Some(404),
            FetchError::Http { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
