use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for Basalt operations.
///
/// Each kind describes one category of failure so callers can branch on
/// [BasaltError::kind] instead of matching message text.
///
/// # Examples
///
/// ```rust,ignore
/// use basalt::errors::{BasaltError, ErrorKind, BasaltResult};
///
/// fn example() -> BasaltResult<()> {
///     Err(BasaltError::new("index not found with name [a_1]", ErrorKind::IndexNotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A request was malformed or missing a required field. Raised before
    /// the store is contacted.
    ValidationError,
    /// No index matches the requested key pattern or name.
    IndexNotFound,
    /// A collection with the requested name already exists.
    NameConflict,
    /// The store rejected a command. The message is the store's `errmsg`.
    CommandFailure,
    /// A write violated a unique index.
    DuplicateKey,
    /// The operation is not valid in the current context.
    InvalidOperation,
    /// An identifier could not be parsed.
    InvalidId,
    /// A value could not be encoded or decoded.
    EncodingError,
    /// A nested document could not be materialized by a type binding.
    ObjectMappingError,
    /// The store connection was used before it was opened.
    StoreNotInitialized,
    /// The store connection has been closed.
    StoreAlreadyClosed,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::NameConflict => write!(f, "Name conflict"),
            ErrorKind::CommandFailure => write!(f, "Command failure"),
            ErrorKind::DuplicateKey => write!(f, "Duplicate key"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::StoreNotInitialized => write!(f, "Store not initialized"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Basalt error type.
///
/// `BasaltError` carries the error message, its kind, an optional cause and
/// the backtrace captured at construction.
///
/// # Examples
///
/// ```rust,ignore
/// use basalt::errors::{BasaltError, ErrorKind};
///
/// let err = BasaltError::new("target namespace exists", ErrorKind::NameConflict);
///
/// let cause = BasaltError::new("no such command: 'foo'", ErrorKind::CommandFailure);
/// let err = BasaltError::new_with_cause("group failed", ErrorKind::CommandFailure, cause);
/// ```
#[derive(Clone)]
pub struct BasaltError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<BasaltError>>,
    backtrace: Atomic<Backtrace>,
}

impl BasaltError {
    /// Creates a new `BasaltError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        BasaltError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `BasaltError` that wraps `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: BasaltError) -> Self {
        BasaltError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&BasaltError> {
        self.cause.as_deref()
    }
}

impl Display for BasaltError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for BasaltError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // message and kind, then either the cause chain or the backtrace
        match &self.cause {
            Some(cause) => write!(
                f,
                "{} ({})\nCaused by: {:?}",
                self.message, self.error_kind, cause
            ),
            None => write!(
                f,
                "{} ({})\n{:?}",
                self.message,
                self.error_kind,
                self.backtrace.read()
            ),
        }
    }
}

impl Error for BasaltError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Basalt operations.
///
/// `BasaltResult<T>` is shorthand for `Result<T, BasaltError>`.
pub type BasaltResult<T> = Result<T, BasaltError>;

#[cfg(feature = "serde")]
impl serde::de::Error for BasaltError {
    fn custom<T: Display>(msg: T) -> Self {
        BasaltError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for BasaltError {
    fn custom<T: Display>(msg: T) -> Self {
        BasaltError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl From<regex::Error> for BasaltError {
    fn from(err: regex::Error) -> Self {
        BasaltError::new(
            &format!("Invalid regular expression: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<std::num::ParseIntError> for BasaltError {
    fn from(err: std::num::ParseIntError) -> Self {
        BasaltError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidId,
        )
    }
}

impl From<String> for BasaltError {
    fn from(msg: String) -> Self {
        BasaltError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for BasaltError {
    fn from(msg: &str) -> Self {
        BasaltError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basalt_error_new_creates_error() {
        let error = BasaltError::new("index not found", ErrorKind::IndexNotFound);
        assert_eq!(error.message(), "index not found");
        assert_eq!(error.kind(), &ErrorKind::IndexNotFound);
        assert!(error.cause().is_none());
    }

    #[test]
    fn basalt_error_new_with_cause_keeps_chain() {
        let cause = BasaltError::new("reduce failed", ErrorKind::InvalidOperation);
        let error = BasaltError::new_with_cause("group failed", ErrorKind::CommandFailure, cause);
        assert_eq!(error.kind(), &ErrorKind::CommandFailure);
        assert_eq!(error.cause().map(|c| c.message()), Some("reduce failed"));
        assert!(error.source().is_some());
    }

    #[test]
    fn basalt_error_display_is_message() {
        let error = BasaltError::new("target namespace exists", ErrorKind::NameConflict);
        assert_eq!(format!("{}", error), "target namespace exists");
    }

    #[test]
    fn basalt_error_debug_includes_kind_and_cause() {
        let cause = BasaltError::new("inner", ErrorKind::InternalError);
        let error = BasaltError::new_with_cause("outer", ErrorKind::CommandFailure, cause);
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("outer"));
        assert!(formatted.contains("Command failure"));
        assert!(formatted.contains("Caused by:"));
    }

    #[test]
    fn basalt_error_source_none_without_cause() {
        let error = BasaltError::new("plain", ErrorKind::ValidationError);
        assert!(error.source().is_none());
    }

    #[test]
    fn regex_error_maps_to_validation() {
        let err = regex::Regex::new("(").unwrap_err();
        let error: BasaltError = err.into();
        assert_eq!(error.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn string_converts_to_internal_error() {
        let error: BasaltError = "boom".into();
        assert_eq!(error.kind(), &ErrorKind::InternalError);
        assert_eq!(error.message(), "boom");
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::IndexNotFound.to_string(), "Index not found");
        assert_eq!(ErrorKind::NameConflict.to_string(), "Name conflict");
        assert_eq!(ErrorKind::CommandFailure.to_string(), "Command failure");
    }
}
