use thiserror::Error;

pub type DocsliceResult<T> = Result<T, DocsliceError>;

/// Title used for every user-facing error notification.
pub const NOTIFICATION_TITLE: &str = "Error";

#[derive(Debug, Error)]
pub enum DocsliceError {
    /// Opening the document failed; no slices may be requested.
    #[error("acquisition error: {message}")]
    Acquisition { message: String },

    /// A single slice fetch failed. Other in-flight slices are unaffected.
    #[error("slice {index} error: {message}")]
    Slice { index: u64, message: String },

    /// Releasing the open document failed.
    #[error("release error: {message}")]
    Release { message: String },

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DocsliceError {
    /// The `(title, message)` pair shown to the user for this error.
    ///
    /// Host failures carry the host-provided message verbatim.
    pub fn notification(&self) -> (&'static str, String) {
        let message = match self {
            DocsliceError::Acquisition { message }
            | DocsliceError::Slice { message, .. }
            | DocsliceError::Release { message } => message.clone(),
            other => other.to_string(),
        };
        (NOTIFICATION_TITLE, message)
    }
}
