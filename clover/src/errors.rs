use backtrace::Backtrace;
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for clover operations
///
/// Each kind describes one category of failure so callers can match on
/// [`CloverError::kind`] instead of parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use clover::errors::{CloverError, CloverResult, ErrorKind};
///
/// fn example() -> CloverResult<()> {
///     Err(CloverError::new("map key type must be a string", ErrorKind::InvalidMapKey))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Normalization Errors
    /// A value of a kind that has no canonical representation
    UnsupportedType,
    /// A map whose keys do not normalize to strings
    InvalidMapKey,

    // Codec Errors
    /// The binary codec failed to encode or decode a value
    CodecFailure,
    /// Stored document bytes could not be materialized
    CorruptedDocument,

    // Validation Errors
    /// The `_id` field is missing or is not a UUID string
    InvalidIdentifier,
    /// The `_expiresAt` field is present but is not an instant
    InvalidExpiration,
    /// A field path has no segments
    InvalidFieldName,

    // Indexing Errors
    /// The value kind cannot be encoded by the bound index variant
    UnsupportedIndexValueType,
    /// The order-preserving transform failed for the value
    EncodingFailure,

    // Operation Errors
    /// The operation is not valid in the current context
    InvalidOperation,

    // Store Errors
    /// Error raised by the key-value store backend
    BackendError,

    // Generic/Internal Errors - used as fallback
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UnsupportedType => write!(f, "Unsupported type"),
            ErrorKind::InvalidMapKey => write!(f, "Invalid map key"),
            ErrorKind::CodecFailure => write!(f, "Codec failure"),
            ErrorKind::CorruptedDocument => write!(f, "Corrupted document"),
            ErrorKind::InvalidIdentifier => write!(f, "Invalid identifier"),
            ErrorKind::InvalidExpiration => write!(f, "Invalid expiration"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::UnsupportedIndexValueType => write!(f, "Unsupported index value type"),
            ErrorKind::EncodingFailure => write!(f, "Encoding failure"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom clover error type.
///
/// `CloverError` carries a message, an [`ErrorKind`], an optional cause and the
/// backtrace captured where the error was created. Errors coming from a
/// collaborator (codec, store backend) are wrapped as the cause instead of
/// being discarded.
///
/// # Examples
///
/// ```rust,ignore
/// use clover::errors::{CloverError, ErrorKind};
///
/// let cause = CloverError::new("unexpected end of input", ErrorKind::CodecFailure);
/// let err = CloverError::new_with_cause("failed to decode document", ErrorKind::CorruptedDocument, cause);
/// ```
#[derive(Clone)]
pub struct CloverError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<CloverError>>,
    backtrace: Arc<Backtrace>,
}

impl CloverError {
    /// Creates a new `CloverError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        CloverError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `CloverError` chained to the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: CloverError) -> Self {
        CloverError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&CloverError> {
        self.cause.as_deref()
    }
}

impl Display for CloverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for CloverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for CloverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for clover operations.
pub type CloverResult<T> = Result<T, CloverError>;

impl de::Error for CloverError {
    fn custom<T: Display>(msg: T) -> Self {
        CloverError::new(&msg.to_string(), ErrorKind::CodecFailure)
    }
}

impl ser::Error for CloverError {
    fn custom<T: Display>(msg: T) -> Self {
        CloverError::new(&msg.to_string(), ErrorKind::CodecFailure)
    }
}

impl From<rmp_serde::encode::Error> for CloverError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CloverError::new_with_cause(
            "failed to encode value",
            ErrorKind::CodecFailure,
            CloverError::new(&err.to_string(), ErrorKind::CodecFailure),
        )
    }
}

impl From<rmp_serde::decode::Error> for CloverError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CloverError::new_with_cause(
            "failed to decode value",
            ErrorKind::CodecFailure,
            CloverError::new(&err.to_string(), ErrorKind::CodecFailure),
        )
    }
}

impl From<uuid::Error> for CloverError {
    fn from(err: uuid::Error) -> Self {
        CloverError::new(
            &format!("UUID parsing error: {}", err),
            ErrorKind::InvalidIdentifier,
        )
    }
}

impl From<String> for CloverError {
    fn from(msg: String) -> Self {
        CloverError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for CloverError {
    fn from(msg: &str) -> Self {
        CloverError::new(msg, ErrorKind::InternalError)
    }
}
