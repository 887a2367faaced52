//! Error types for the Persona identity provider

/// Result type for Persona operations
pub type Result<T> = std::result::Result<T, PersonaError>;

/// Persona-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    /// A signing or descriptor operation ran before any key was assigned
    #[error("private key is undefined")]
    KeyNotSet,

    /// Key material is of an algorithm this provider cannot sign with
    #[error("unsupported private key type: {0}")]
    UnsupportedKeyType(String),

    /// Key is smaller than the minimum accepted size
    #[error("private key is {bits} bits, should be at least {minimum} bits")]
    KeyTooWeak {
        /// Size of the rejected key
        bits: usize,
        /// Minimum accepted size
        minimum: usize,
    },

    /// Elliptic curve is not one of P-224, P-256, P-384, P-521
    #[error("unsupported elliptic curve: {0}")]
    UnsupportedCurve(String),

    /// Key file could not be decoded
    #[error("invalid key format: {0}")]
    KeyFormat(String),

    /// Underlying signature primitive failed
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Header or claims could not be serialized
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// Session operation attempted before the backing was opened
    #[error("session backing has not been opened")]
    StoreNotOpen,

    /// Session backing was opened twice
    #[error("session backing is already open")]
    AlreadyOpen,

    /// Session write reported no affected rows
    #[error("failed to create a new session: no rows affected")]
    WriteRejected,

    /// Storage driver error, passed through unchanged
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersonaError {
    /// Check if the error was caused by the key handed to the provider
    pub fn is_key_rejection(&self) -> bool {
        matches!(
            self,
            PersonaError::UnsupportedKeyType(_)
                | PersonaError::KeyTooWeak { .. }
                | PersonaError::UnsupportedCurve(_)
                | PersonaError::KeyFormat(_)
        )
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PersonaError::Storage(_) => 503,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for PersonaError {
    fn from(err: serde_json::Error) -> Self {
        PersonaError::EncodingFailed(err.to_string())
    }
}

impl From<signature::Error> for PersonaError {
    fn from(err: signature::Error) -> Self {
        PersonaError::SigningFailed(err.to_string())
    }
}

impl From<validator::ValidationErrors> for PersonaError {
    fn from(err: validator::ValidationErrors) -> Self {
        PersonaError::ConfigError(err.to_string())
    }
}
