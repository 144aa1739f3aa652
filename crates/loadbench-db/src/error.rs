use thiserror::Error;

/// Errors raised while talking to the application database.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("could not connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data needed for a test run is missing or inconsistent.
    #[error("data check failed: {0}")]
    Verification(String),
}

impl DbError {
    #[must_use]
    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification(message.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;
