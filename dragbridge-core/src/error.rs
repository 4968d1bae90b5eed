//! Common error types.

use std::{error, fmt, io};

/// The error type returned by every request dispatched through the bridge.
///
/// Each variant maps to a stable wire code (see [`BridgeError::code`]) so the host application
/// receives a structured error result on the call that triggered it.
#[derive(Debug)]
#[non_exhaustive]
pub enum BridgeError {
    /// A required argument was missing or malformed. No state was mutated.
    InvalidArgument { method: &'static str, reason: String },
    /// The request referenced a drag session or file that is not in flight.
    NotFound(NotFoundError),
    /// Writing the promised file failed. The OS was told about the failure as well.
    WriteFailure(WriteError),
    /// The method name is not one the bridge understands.
    NotImplemented(String),
    /// The platform has nothing to attach the request to, e.g. no content view yet.
    Unavailable(&'static str),
}

impl BridgeError {
    pub(crate) fn invalid(method: &'static str, reason: impl fmt::Display) -> Self {
        BridgeError::InvalidArgument { method, reason: reason.to_string() }
    }

    /// The stable code reported to the host application.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument { .. } => "missingOrInvalidArg",
            BridgeError::NotFound(_) => "notFound",
            BridgeError::WriteFailure(_) => "writeFailure",
            BridgeError::NotImplemented(_) => "notImplemented",
            BridgeError::Unavailable(_) => "unavailable",
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::InvalidArgument { method, reason } => {
                write!(f, "invalid arguments for `{method}`: {reason}")
            },
            BridgeError::NotFound(e) => fmt::Display::fmt(e, f),
            BridgeError::WriteFailure(e) => write!(f, "file promise write failed: {e}"),
            BridgeError::NotImplemented(method) => write!(f, "method `{method}` is not implemented"),
            BridgeError::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

impl error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            BridgeError::NotFound(e) => Some(e),
            BridgeError::WriteFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NotFoundError> for BridgeError {
    fn from(error: NotFoundError) -> Self {
        BridgeError::NotFound(error)
    }
}

impl From<WriteError> for BridgeError {
    fn from(error: WriteError) -> Self {
        BridgeError::WriteFailure(error)
    }
}

/// The error type for lookups of a session or file that is not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
    session_id: String,
    file_name: Option<String>,
}

impl NotFoundError {
    pub(crate) fn session(session_id: &str) -> Self {
        NotFoundError { session_id: session_id.to_owned(), file_name: None }
    }

    pub(crate) fn file(session_id: &str, file_name: &str) -> Self {
        NotFoundError { session_id: session_id.to_owned(), file_name: Some(file_name.to_owned()) }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// `None` when the whole session was missing.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_name {
            Some(file_name) => {
                write!(f, "no transfer of `{file_name}` in drag session `{}`", self.session_id)
            },
            None => write!(f, "no transfers registered for drag session `{}`", self.session_id),
        }
    }
}

impl error::Error for NotFoundError {}

/// The reason a file promise could not be fulfilled.
///
/// This is what the OS completion callback receives, and what the feeding request returns.
#[derive(Debug)]
#[non_exhaustive]
pub enum WriteError {
    /// A `kWriting` chunk arrived without any data.
    MissingChunk,
    /// The destination stream failed.
    Io(io::Error),
    /// The OS asked to write a promise that was already being written.
    AlreadyStarted,
    /// The host application stopped feeding the transfer for longer than the delivery timeout.
    TimedOut,
    /// The transfer was dropped from the registry before it finished.
    Abandoned,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::MissingChunk => f.pad("chunk fed without data"),
            WriteError::Io(e) => write!(f, "destination stream error: {e}"),
            WriteError::AlreadyStarted => f.pad("file promise is already being written"),
            WriteError::TimedOut => f.pad("file promise delivery timed out"),
            WriteError::Abandoned => f.pad("file promise was abandoned before completion"),
        }
    }
}

impl error::Error for WriteError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            WriteError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WriteError {
    fn from(error: io::Error) -> Self {
        WriteError::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_fmt_does_not_panic() {
        let _ = format!(
            "{:?}, {}, {}, {}",
            BridgeError::invalid("feedFileStream", "unknown status `kPaused`"),
            BridgeError::from(NotFoundError::file("abc", "photo.png")),
            BridgeError::from(WriteError::Io(io::Error::other("disk full"))),
            BridgeError::NotImplemented("getPlatformVersion".into()),
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(BridgeError::invalid("updateProgress", "").code(), "missingOrInvalidArg");
        assert_eq!(BridgeError::from(NotFoundError::session("abc")).code(), "notFound");
        assert_eq!(BridgeError::from(WriteError::MissingChunk).code(), "writeFailure");
        assert_eq!(BridgeError::NotImplemented("x".into()).code(), "notImplemented");
        assert_eq!(BridgeError::Unavailable("no content view").code(), "unavailable");
    }

    #[test]
    fn not_found_names_the_missing_key() {
        let error = NotFoundError::file("abc", "photo.png");
        assert_eq!(error.session_id(), "abc");
        assert_eq!(error.file_name(), Some("photo.png"));
        assert_eq!(error.to_string(), "no transfer of `photo.png` in drag session `abc`");
        assert_eq!(NotFoundError::session("abc").file_name(), None);
    }
}
