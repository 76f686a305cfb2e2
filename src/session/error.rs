use thiserror::Error;

/// Failures of the session layer.
///
/// `Security` and `State` are answered with a redirect that starts a fresh
/// session; `Backend` means the store itself is broken and propagates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The request's secure token does not match the session's
    #[error("secure token mismatch")]
    Security,

    /// The session or state is unknown, expired or unreadable
    #[error("invalid session state: {0}")]
    State(String),

    #[error("session store failure: {0}")]
    Backend(String),
}

impl SessionError {
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::Security | SessionError::State(_))
    }
}
