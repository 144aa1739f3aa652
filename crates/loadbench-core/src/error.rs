use thiserror::Error;

/// Canonical error type for orchestration steps that do not touch the
/// database or the REST API directly.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A named item (environment, file, column) was not found.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Kind of the missing item (e.g. `"environment"`).
        entity: &'static str,
        /// Identifier of the missing item.
        id: String,
    },

    /// Configuration could not be read or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An external tool could not be started or exited abnormally.
    #[error("{tool} failed: {message}")]
    Tool {
        /// Name of the tool (`jmeter`, `typeperf`).
        tool: &'static str,
        /// Human-readable details.
        message: String,
    },

    /// A CSV input or output could not be processed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A file could not be decoded with any supported text encoding.
    #[error("could not decode {0} as UTF-8 or UTF-16")]
    Encoding(String),

    /// I/O error occurred during file or process operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error for input data.
    #[error("validation error: {0}")]
    Validation(String),
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a `Tool` variant.
    #[must_use]
    pub fn tool(tool: &'static str, message: impl Into<String>) -> Self {
        Self::Tool {
            tool,
            message: message.into(),
        }
    }

    /// Creates a `Validation` variant.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
