use std::time::Duration;

use thiserror::Error;

use crate::types::ColumnKind;

/// Local, non-retryable failures raised while building a binary payload.
///
/// Always returned before any byte reaches the wire; no partial payload is
/// ever handed back alongside one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("expected {expected} columns, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("column {column} has {actual} rows, expected {expected}")]
    RowCountMismatch {
        column: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column {column} row {row}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: usize,
        row: usize,
        expected: ColumnKind,
        actual: ColumnKind,
    },

    #[error("row {row}: NCHAR value is not valid UTF-8")]
    InvalidUtf8 { row: usize },

    #[error("null mask has {mask} entries for {values} values")]
    NullMaskLength { values: usize, mask: usize },

    #[error("value of {len} bytes exceeds the {max} byte limit")]
    ValueTooLong { len: usize, max: usize },

    #[error("write of {len} bytes at offset {offset} overruns buffer of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("timestamp out of range for the requested precision")]
    TimestampOutOfRange,

    #[error("no bind data")]
    EmptyData,

    #[error("bind data {index}: expected {expected} tags, got {actual}")]
    TagCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("bind data {index}: expected {expected} columns, got {actual}")]
    ColCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{rows} rows do not fit in one block")]
    TooManyRows { rows: usize },

    #[error("table name of {len} bytes is too long")]
    TableNameTooLong { len: usize },

    #[error("bind data {index}: table name is required")]
    TableNameMissing { index: usize },

    #[error("invalid query bind: {0}")]
    InvalidQueryBind(String),

    #[error("unsupported query parameter type: {0}")]
    UnsupportedParamType(String),

    #[error("statement fields are required for insert binds")]
    MissingFields,
}

/// Crate-wide error surfaced by the driver.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Non-zero `code` returned by the server, carried verbatim.
    #[error("Server error [0x{code:x}]: {message}")]
    Protocol { code: i32, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request {req_id} timed out after {after:?}")]
    Timeout { req_id: u64, after: Duration },

    #[error("Connection closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

impl DriverError {
    /// True when the connection that produced this error is no longer usable.
    pub fn is_transport(&self) -> bool {
        matches!(self, DriverError::Transport(_) | DriverError::Closed)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DriverError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        DriverError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EncodeError::ColumnCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "expected 3 columns, got 2");

        let err = EncodeError::TypeMismatch {
            column: 1,
            row: 4,
            expected: ColumnKind::Int,
            actual: ColumnKind::Binary,
        };
        assert_eq!(err.to_string(), "column 1 row 4: expected INT, got BINARY");

        let err = DriverError::Protocol {
            code: 0x2603,
            message: "Table does not exist".to_string(),
        };
        assert_eq!(err.to_string(), "Server error [0x2603]: Table does not exist");
    }

    #[test]
    fn test_error_classes() {
        assert!(DriverError::Closed.is_transport());
        assert!(DriverError::Transport("reset".into()).is_transport());
        let timeout = DriverError::Timeout {
            req_id: 7,
            after: Duration::from_millis(10),
        };
        assert!(!timeout.is_transport());
        assert!(timeout.is_timeout());
        assert!(!DriverError::from(EncodeError::EmptyData).is_transport());
    }
}
