//! Error types for the transport layer.

/// Errors that can occur while talking to the site.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The connect or read timeout elapsed.
    #[error("Request timed out")]
    Timeout,
    /// Connection, DNS or protocol failure.
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// The body exceeded the configured cap, either declared or while streaming.
    #[error("Response body exceeds {limit} bytes")]
    TooBig { limit: u64 },
    /// A URL could not be built from the base URL and path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn is_too_big(&self) -> bool {
        matches!(self, Self::TooBig { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e)
        }
    }
}
