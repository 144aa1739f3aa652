use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid header `{name}`: {message}")]
    InvalidHeader { name: String, message: String },

    /// The API did not answer its health probe.
    #[error("application is not running at {url}")]
    Unavailable { url: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type HttpResult<T> = Result<T, HttpError>;
