use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Invalid API response: {0}")]
    ParseError(String),

    #[error("Backend error: {code} - {message}")]
    BackendError { code: String, message: String },

    #[error("No signed-in user")]
    NotSignedIn,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}
