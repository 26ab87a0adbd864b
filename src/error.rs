use thiserror::Error;

/// Error types that can occur during scheduling operations
#[derive(Debug, Error, uniffi::Error)]
pub enum SrsError {
    #[error("Invalid rating value: {0}")]
    InvalidRating(i64),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Corrupt scheduling state: {0}")]
    CorruptState(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for SrsError {
    fn from(e: std::io::Error) -> Self {
        SrsError::IoError(e.to_string())
    }
}

impl From<rusqlite::Error> for SrsError {
    fn from(e: rusqlite::Error) -> Self {
        SrsError::DatabaseError(e.to_string())
    }
}

impl From<chrono::ParseError> for SrsError {
    fn from(e: chrono::ParseError) -> Self {
        SrsError::InvalidTimestamp(e.to_string())
    }
}
