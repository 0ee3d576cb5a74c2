//! Error types for the library layer.

use std::fmt;

/// Errors produced by the library layer, wrapping transport errors and
/// adding profile I/O, serialization, login and input failures.
#[derive(Debug)]
pub enum MangaBuffError {
    /// An error from the underlying transport.
    Api(mangabuff_api::Error),
    /// Reading or writing a profile or card file failed.
    Io(std::io::Error),
    /// JSON serialization or deserialization failed.
    Serialization(serde_json::Error),
    /// The site refused the login; carries the collected messages.
    Login(String),
    /// User-provided input failed validation.
    InvalidInput(String),
}

impl fmt::Display for MangaBuffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "API error: {}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::Login(msg) => write!(f, "Login failed: {}", msg),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for MangaBuffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<mangabuff_api::Error> for MangaBuffError {
    fn from(e: mangabuff_api::Error) -> Self {
        Self::Api(e)
    }
}

impl From<std::io::Error> for MangaBuffError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for MangaBuffError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}
