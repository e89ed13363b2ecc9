use std::fmt::{self, Display};

/// The kind of error that occurred while talking to a model backend.
///
/// Every kind is terminal for the session that hit it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend could not be reached, timed out, or failed on its side.
    Unavailable,
    /// The reply could not be parsed into a message.
    Protocol,
    /// The backend rejected the credentials.
    Authentication,
    /// The backend is throttling requests.
    RateLimited,
}

impl ErrorKind {
    /// Classifies a non-success HTTP status code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Authentication,
            429 => ErrorKind::RateLimited,
            408 | 500..=599 => ErrorKind::Unavailable,
            _ => ErrorKind::Protocol,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unavailable => write!(f, "backend unavailable"),
            ErrorKind::Protocol => write!(f, "backend protocol error"),
            ErrorKind::Authentication => write!(f, "backend authentication error"),
            ErrorKind::RateLimited => write!(f, "backend rate limited"),
        }
    }
}
