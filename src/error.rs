use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Bad or missing capability arguments. Displayed verbatim to callers.
    #[error("{0}")]
    Validation(String),

    #[error("Request failed with status code {0}")]
    UpstreamStatus(u16),

    #[error("{0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl ScrapeError {
    pub fn validation(message: impl Into<String>) -> Self {
        ScrapeError::Validation(message.into())
    }

    /// True for errors caused by the incoming request rather than the capability.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScrapeError::InvalidBody(_))
    }
}

// Conversion implementations for common error types
impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        ScrapeError::Registry(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for ScrapeError {
    fn from(err: toml::de::Error) -> Self {
        ScrapeError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ScrapeError::UpstreamStatus(status.as_u16()),
            None => ScrapeError::Network(err.to_string()),
        }
    }
}
