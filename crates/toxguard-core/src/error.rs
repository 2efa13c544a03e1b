//! Error types for toxguard

/// Result type alias using toxguard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for toxguard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Classifier execution errors (tokenization, forward pass)
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Model resolution and loading errors
    #[error("model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Input rejected before it reaches the model
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote moderation endpoint could not be reached or answered garbage
    #[error("moderation service error: {0}")]
    ModerationUnavailable(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new moderation-unavailable error
    pub fn moderation_unavailable(msg: impl Into<String>) -> Self {
        Self::ModerationUnavailable(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short, stable name of the variant; used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Classifier(_) => "classifier",
            Self::Model(_) => "model",
            Self::Config(_) => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::ModerationUnavailable(_) => "moderation_unavailable",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}
