#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error on {uri}: {message}")]
    Io { uri: String, message: String },
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn io(uri: impl ToString, err: impl std::fmt::Display) -> Self {
        ApiError::Io {
            uri: uri.to_string(),
            message: err.to_string(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
