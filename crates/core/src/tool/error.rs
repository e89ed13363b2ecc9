use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use serde_json::{Value, json};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The arguments were not a JSON object or didn't fit the tool.
    InvalidArguments,
    /// Error occurred while executing the tool.
    ExecutionError,
    /// An external service could not be reached or rejected the call.
    CollaboratorUnavailable,
    /// A parameter the tool needs was neither given nor accumulated.
    MissingParameter,
    /// The model requested a tool that is not in the catalogue.
    UnknownTool,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArguments => write!(f, "invalid arguments"),
            ErrorKind::ExecutionError => write!(f, "execution error"),
            ErrorKind::CollaboratorUnavailable => {
                write!(f, "service unavailable")
            }
            ErrorKind::MissingParameter => write!(f, "missing parameter"),
            ErrorKind::UnknownTool => write!(f, "unknown function"),
        }
    }
}

/// Describes a tool call error.
///
/// Tool errors never end a session, they are rendered with
/// [`Error::to_payload`] and handed back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
    raw: Option<String>,
}

impl Error {
    #[inline]
    fn with_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            reason: None,
            raw: None,
        }
    }

    /// Creates a new error with the `InvalidArguments` kind.
    #[inline]
    pub fn invalid_arguments() -> Self {
        Self::with_kind(ErrorKind::InvalidArguments)
    }

    /// Creates a new error with the `ExecutionError` kind.
    #[inline]
    pub fn execution_error() -> Self {
        Self::with_kind(ErrorKind::ExecutionError)
    }

    /// Creates a new error with the `CollaboratorUnavailable` kind.
    #[inline]
    pub fn collaborator_unavailable() -> Self {
        Self::with_kind(ErrorKind::CollaboratorUnavailable)
    }

    /// Creates a new error for the missing parameter `name`.
    #[inline]
    pub fn missing_parameter(name: &str) -> Self {
        Self::with_kind(ErrorKind::MissingParameter).with_reason(name)
    }

    /// Creates a new error for the unknown tool `name`.
    #[inline]
    pub fn unknown_tool(name: &str) -> Self {
        Self::with_kind(ErrorKind::UnknownTool).with_reason(name)
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the raw argument text that failed to parse.
    #[inline]
    pub fn with_raw<S: Into<String>>(mut self, raw: S) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }

    /// Renders the error as the JSON document the model receives.
    pub fn to_payload(&self) -> Value {
        match self.kind {
            ErrorKind::InvalidArguments => json!({
                "error": "invalid arguments",
                "details": self.reason(),
                "raw": self.raw.as_deref().unwrap_or_default(),
            }),
            ErrorKind::UnknownTool => json!({
                "error": format!("unknown function: {}", self.reason()),
            }),
            ErrorKind::MissingParameter => json!({
                "error": format!("Missing '{}' parameter", self.reason()),
            }),
            ErrorKind::ExecutionError | ErrorKind::CollaboratorUnavailable => {
                json!({ "error": self.reason() })
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads() {
        assert_eq!(
            Error::unknown_tool("delete_everything").to_payload(),
            json!({ "error": "unknown function: delete_everything" })
        );
        assert_eq!(
            Error::missing_parameter("query").to_payload(),
            json!({ "error": "Missing 'query' parameter" })
        );
        assert_eq!(
            Error::invalid_arguments()
                .with_reason("expected value at line 1 column 1")
                .with_raw("not json")
                .to_payload(),
            json!({
                "error": "invalid arguments",
                "details": "expected value at line 1 column 1",
                "raw": "not json"
            })
        );
        assert_eq!(
            Error::collaborator_unavailable().to_payload(),
            json!({ "error": "service unavailable" })
        );
    }
}
