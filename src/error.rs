use thiserror::Error;

/// A page could not be retrieved. Ends pagination for the run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not connect to WebDriver: {0}")]
    Connect(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("timed out fetching {0}")]
    Timeout(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browser session lost while fetching {0}")]
    SessionLost(String),
}

/// One item node could not be turned into a record. The item is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid product link {href:?}: {reason}")]
    InvalidLink { href: String, reason: String },
}

/// A single field value could not be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("no digits in {0:?}")]
    NoDigits(String),

    #[error("not a number: {0:?}")]
    NotANumber(String),
}

impl FieldError {
    /// Text that failed to parse
    pub fn raw(&self) -> &str {
        match self {
            FieldError::NoDigits(raw) | FieldError::NotANumber(raw) => raw,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown shop {0:?}")]
    UnknownShop(String),

    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}
