use thiserror::Error;

pub type Result<T> = std::result::Result<T, InferenceError>;

/// Shown to chat users when the model answered but the payload was unreadable.
pub const UNEXPECTED_FORMAT_FALLBACK: &str = "La réponse du modèle n'est pas au format attendu.";

/// Shown to chat users for every other inference failure.
pub const COMMUNICATION_FALLBACK: &str =
    "Une erreur s'est produite lors de la communication avec le modèle.";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl InferenceError {
    /// Fixed user-facing text for this failure. Never contains provider output.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::ResponseFormat(_) => UNEXPECTED_FORMAT_FALLBACK,
            Self::InvalidInput(_) | Self::Http(_) | Self::Status { .. } => COMMUNICATION_FALLBACK,
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for InferenceError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
