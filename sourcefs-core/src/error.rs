use thiserror::Error;

pub type FsResult<T> = Result<T, FsError>;

/// Error taxonomy for every fallible capability call.
///
/// Read-family operations report `EndOfStream` only when a required byte
/// count could not be satisfied; a successful zero-length read is not an
/// error. Misuse of a stream (negative seek, oversized UTF string, writing
/// on a closed or read-only stream) is `InvalidArgument`.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("end of stream")]
    EndOfStream,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// Map an OS error onto the taxonomy, keeping the path in the message.
    pub fn from_io(err: std::io::Error, path: &str) -> FsError {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            ErrorKind::PermissionDenied => FsError::AccessDenied(path.to_string()),
            ErrorKind::AlreadyExists => FsError::AlreadyExists(path.to_string()),
            _ => FsError::Io(err),
        }
    }

    pub fn closed(what: &str) -> FsError {
        FsError::InvalidArgument(format!("{what} is closed"))
    }
}
