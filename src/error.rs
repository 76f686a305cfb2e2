use thiserror::Error;

use crate::session::SessionError;

/// Error type of handlers and of the application dispatch path.
///
/// Session errors that the session coordinator knows how to recover from never
/// leave it; everything else reaches the caller of [`crate::App::handle`].
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True for session errors answered with a redirect instead of a failure
    #[must_use]
    pub fn is_recoverable_session_error(&self) -> bool {
        matches!(self, Error::Session(e) if e.is_recoverable())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
