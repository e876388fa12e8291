/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types surfaced by the public API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A configured regular expression could not be compiled
    InvalidPattern { pattern: String, message: String },
    /// No route matches the requested detail id
    NotFound(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InvalidPattern { pattern, message } => {
                write!(f, "invalid pattern `{}`: {}", pattern, message)
            }
            Error::NotFound(id) => write!(f, "route not found: {}", id),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Returns true for the "route/detail not found" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
