use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gemini API key is not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("invalid gateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP request to model gateway failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model gateway returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode gateway response: {0}")]
    Decode(#[from] serde_json::Error),
}
