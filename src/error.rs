use thiserror::Error;

/// Main error type for kbforge
#[derive(Error, Debug)]
pub enum KbforgeError {
    /// Credentials missing, malformed, or rejected by the remote source.
    /// Aborts the listing step for that source; nothing is fetched.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Failure enumerating a source (network unreachable, bad bucket/space).
    /// Aborts the batch with no partial report.
    #[error("Listing error: {0}")]
    Listing(String),

    /// Failure downloading one specific item. Isolated to that item's
    /// outcome; sibling fetches continue.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The knowledge-base loader rejected or failed on one staged file.
    /// Isolated to that item's outcome.
    #[error("Load error: {0}")]
    Load(String),

    /// Agent service errors (question answering)
    #[error("Agent error: {0}")]
    Agent(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient Result type using KbforgeError
pub type Result<T> = std::result::Result<T, KbforgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KbforgeError::Auth("token rejected".to_string());
        assert!(err.to_string().contains("Authentication error"));
        assert!(err.to_string().contains("token rejected"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KbforgeError = io_err.into();
        assert!(matches!(err, KbforgeError::Io(_)));
    }

    #[test]
    fn test_fetch_and_load_are_distinct() {
        let fetch = KbforgeError::Fetch("timeout".to_string());
        let load = KbforgeError::Load("timeout".to_string());
        assert!(fetch.to_string().starts_with("Fetch error"));
        assert!(load.to_string().starts_with("Load error"));
    }
}
