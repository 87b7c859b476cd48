use thiserror::Error;

/// Anything other than a 401 that kept a request from producing its value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Connection refused, timeout, TLS failure and the like.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("registry answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// The explicit result of every registry call.
///
/// A 401 is split out so the caller can decide to end the session; nothing
/// reacts to it behind the caller's back.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T> {
    Success(T),
    Unauthorized,
    Failed(ApiError),
}

impl<T> ApiOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiOutcome::Unauthorized)
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ApiOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        match self {
            ApiOutcome::Success(value) => ApiOutcome::Success(f(value)),
            ApiOutcome::Unauthorized => ApiOutcome::Unauthorized,
            ApiOutcome::Failed(e) => ApiOutcome::Failed(e),
        }
    }

    /// Collapses into a `Result`, turning a 401 into a `Status` error.
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            ApiOutcome::Success(value) => Ok(value),
            ApiOutcome::Unauthorized => Err(ApiError::Status {
                status: 401,
                message: "unauthorized".to_string(),
            }),
            ApiOutcome::Failed(e) => Err(e),
        }
    }
}
