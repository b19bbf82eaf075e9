use mongodb::error::{ErrorKind, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("api server failed: {0}")]
    Server(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("mongodb connection failed: {0}")]
    Connection(#[source] mongodb::error::Error),

    #[error("mongodb connection not established within {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("{op} failed: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: mongodb::error::Error,
    },

    #[error("{op} timed out after {after:?}")]
    Timeout {
        op: &'static str,
        after: std::time::Duration,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DatabaseError {
    /// Whether retrying the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectTimeout(_) | Self::Timeout { .. } => true,
            Self::Connection(e) | Self::Operation { source: e, .. } => is_transient(e),
            Self::InvalidInput(_) => false,
        }
    }
}

fn is_transient(error: &mongodb::error::Error) -> bool {
    if error.contains_label(RETRYABLE_WRITE_ERROR) || error.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return true;
    }

    matches!(
        *error.kind,
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeouts_are_retryable() {
        let err = DatabaseError::Timeout { op: "find", after: Duration::from_secs(1) };
        assert!(err.is_retryable());
        assert!(DatabaseError::ConnectTimeout(Duration::from_secs(10)).is_retryable());
    }

    #[test]
    fn invalid_input_is_terminal() {
        let err = DatabaseError::InvalidInput("empty batch".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn errors_convert_into_app_error() {
        let app: AppError = DatabaseError::InvalidInput("bad".to_string()).into();
        assert!(matches!(app, AppError::Database(_)));
        assert_eq!(app.to_string(), "invalid input: bad");

        let app: AppError = ConfigError::Invalid("database.host is empty".to_string()).into();
        assert_eq!(app.to_string(), "invalid configuration: database.host is empty");
    }
}
