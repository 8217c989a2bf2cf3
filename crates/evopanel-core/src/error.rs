use thiserror::Error;

/// Top-level error type for the panel.
#[derive(Debug, Error)]
pub enum PanelError {
    /// Malformed or incomplete request input.
    #[error("{0}")]
    Validation(String),

    /// A referenced record (instance, user, contact) does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The messaging provider rejected the call or could not be reached.
    ///
    /// `status` is `None` for transport failures.
    #[error("provider error{}: {body}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider { status: Option<u16>, body: String },

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Uniqueness violation (e.g. duplicate e-mail).
    #[error("{0}")]
    Conflict(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Server-side fault outside storage and I/O (hashing, token signing).
    #[error("internal error: {0}")]
    Internal(String),

    /// Storage error.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PanelError {
    /// Prefix a provider failure with the recipient and job kind it happened on.
    ///
    /// Status is kept as-is; other variants pass through untouched.
    pub fn with_context(self, recipient: &str, kind: &str) -> Self {
        match self {
            Self::Provider { status, body } => Self::Provider {
                status,
                body: format!("{kind} to {recipient}: {body}"),
            },
            other => other,
        }
    }
}
