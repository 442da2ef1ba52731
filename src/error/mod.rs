use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Memo error: {0}")]
    Memo(#[from] MemoError),

    #[error("Geocoder error: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Memo store errors
#[derive(Debug, Error)]
pub enum MemoError {
    #[error("Memo unavailable at {path}: {message}")]
    Unavailable { path: String, message: String },

    #[error("Invalid location payload: {message}")]
    InvalidLocation { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Geocoding provider errors
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoder unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Batch table (CSV) errors
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Column '{column}' not found in {path}")]
    MissingColumn { column: String, path: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for memo operations
pub type MemoResult<T> = Result<T, MemoError>;

/// Result type alias for geocoder operations
pub type GeocodeResult<T> = Result<T, GeocodeError>;

/// Result type alias for table operations
pub type TableResult<T> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "USER_AGENTS is required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: USER_AGENTS is required"
        );

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_memo_error_display() {
        let err = MemoError::Unavailable {
            path: "memo.json".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Memo unavailable at memo.json: permission denied"
        );

        let err = MemoError::InvalidLocation {
            message: "missing lat".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid location payload: missing lat");
    }

    #[test]
    fn test_geocode_error_display() {
        let err = GeocodeError::Unavailable {
            message: "connection refused".to_string(),
            retries: 2,
        };
        assert_eq!(
            err.to_string(),
            "Geocoder unavailable: connection refused (retries: 2)"
        );

        let err = GeocodeError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 - rate limited");

        let err = GeocodeError::Timeout { timeout_secs: 15 };
        assert_eq!(err.to_string(), "Request timeout after 15s");
    }

    #[test]
    fn test_table_error_display() {
        let err = TableError::MissingColumn {
            column: "location".to_string(),
            path: "in.csv".to_string(),
        };
        assert_eq!(err.to_string(), "Column 'location' not found in in.csv");
    }

    #[test]
    fn test_memo_error_conversion_to_app_error() {
        let memo_err = MemoError::InvalidLocation {
            message: "bad".to_string(),
        };
        let app_err: AppError = memo_err.into();
        assert!(matches!(app_err, AppError::Memo(_)));
    }

    #[test]
    fn test_geocode_error_conversion_to_app_error() {
        let geocode_err = GeocodeError::Timeout { timeout_secs: 1 };
        let app_err: AppError = geocode_err.into();
        assert!(matches!(app_err, AppError::Geocode(_)));
    }

    #[test]
    fn test_io_error_conversion_to_memo_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let memo_err: MemoError = io_err.into();
        assert!(matches!(memo_err, MemoError::Io(_)));
    }
}
