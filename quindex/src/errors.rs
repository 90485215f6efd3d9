use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for Quindex operations
///
/// Each kind names one category of failure so callers can branch on the
/// failure class without parsing messages.
///
/// # Examples
///
/// ```rust
/// use quindex::errors::{ErrorKind, QuindexError, QuindexResult};
///
/// fn lookup() -> QuindexResult<()> {
///     Err(QuindexError::new("No tree for chrZ", ErrorKind::LookupError))
/// }
///
/// assert_eq!(lookup().unwrap_err().kind(), &ErrorKind::LookupError);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Index file errors
    /// Magic mismatch, truncated file, schema width mismatch, bad offsets
    FormatError,
    /// A node holds more entries than the on-disk count field can express
    CapacityOverflow,

    // Construction errors
    /// Missing or invalid configuration (bbox, limits, schema type codes)
    ConfigurationError,
    /// An item does not match the index schema
    SchemaMismatch,

    // Query errors
    /// Chromosome without a tree, file not in the registry, coordinate off the curve
    LookupError,
    /// The operation is not valid for the current state of the index
    InvalidOperation,

    // IO errors
    /// Generic IO error
    IOError,
    /// The file was not found
    FileNotFound,
    /// Permission denied for file operation
    PermissionDenied,

    /// Error encoding or decoding sidecar data
    EncodingError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::FormatError => write!(f, "Format error"),
            ErrorKind::CapacityOverflow => write!(f, "Capacity overflow"),
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::SchemaMismatch => write!(f, "Schema mismatch"),
            ErrorKind::LookupError => write!(f, "Lookup error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::FileNotFound => write!(f, "File not found"),
            ErrorKind::PermissionDenied => write!(f, "Permission denied"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

impl ErrorKind {
    /// Returns true for the IO family of kinds.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            ErrorKind::IOError | ErrorKind::FileNotFound | ErrorKind::PermissionDenied
        )
    }
}

#[derive(Clone)]
pub struct QuindexError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<QuindexError>>,
    backtrace: Arc<Backtrace>,
}

impl QuindexError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        QuindexError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: QuindexError) -> Self {
        QuindexError {
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

    pub fn cause(&self) -> Option<&QuindexError> {
        self.cause.as_deref()
    }
}

impl Display for QuindexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for QuindexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}\nCaused by: {:?}", self.error_kind, self.message, cause),
            None => write!(f, "{}: {}\n{:?}", self.error_kind, self.message, self.backtrace),
        }
    }
}

impl Error for QuindexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

pub type QuindexResult<T> = Result<T, QuindexError>;

impl From<std::io::Error> for QuindexError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::UnexpectedEof => ErrorKind::FormatError,
            _ => ErrorKind::IOError,
        };
        QuindexError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<std::string::FromUtf8Error> for QuindexError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        QuindexError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<bincode::error::EncodeError> for QuindexError {
    fn from(err: bincode::error::EncodeError) -> Self {
        QuindexError::new(
            &format!("Failed to encode index metadata: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<bincode::error::DecodeError> for QuindexError {
    fn from(err: bincode::error::DecodeError) -> Self {
        QuindexError::new(
            &format!("Failed to decode index metadata: {}", err),
            ErrorKind::EncodingError,
        )
    }
}
