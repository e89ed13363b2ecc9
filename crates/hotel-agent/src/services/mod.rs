//! Clients for the external services the tools talk to.

pub mod elasticsearch;
pub mod geocoding;

use std::error::Error as StdError;
use std::fmt::{self, Display};

pub use elasticsearch::{
    BulkReport, ElasticsearchClient, SearchBackend, SearchParams,
    SearchResults,
};
pub use geocoding::{Coordinates, Geocoder, GoogleGeocoder};

/// The kind of error a service call failed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// The service could not be reached or timed out.
    Unavailable,
    /// The service answered, but refused the request.
    Rejected,
    /// The answer could not be understood.
    InvalidResponse,
}

impl Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceErrorKind::Unavailable => write!(f, "service unavailable"),
            ServiceErrorKind::Rejected => write!(f, "request rejected"),
            ServiceErrorKind::InvalidResponse => write!(f, "invalid response"),
        }
    }
}

/// An error from an external service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceError {
    kind: ServiceErrorKind,
    message: String,
}

impl ServiceError {
    /// Creates an error of `kind`.
    #[inline]
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            ServiceErrorKind::InvalidResponse
        } else if err.is_status() {
            ServiceErrorKind::Rejected
        } else {
            ServiceErrorKind::Unavailable
        };
        Self::new(kind, format!("{err}"))
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ServiceErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for ServiceError {}
