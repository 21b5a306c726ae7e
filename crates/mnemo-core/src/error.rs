//! Error types for Mnemo

use thiserror::Error;

/// Result type alias using Mnemo's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Mnemo error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Detection errors (E001-E099)
    #[error("Project detection failed: {0}")]
    Detection(String),

    #[error("Path '{0}' is not a recognizable project root.")]
    NotAProject(String),

    // Graph store errors (E100-E199)
    #[error("Graph service error: {0}")]
    Service(String),

    #[error("Network error: {0}. Check your internet connection.")]
    Network(#[from] reqwest::Error),

    #[error("Graph service rejected the credentials (HTTP {0}). Check MNEMO_API_KEY.")]
    Unauthorized(u16),

    // Session cache errors (E200-E299)
    #[error("Session cache unreadable: {0}")]
    CacheRead(String),

    #[error("Session cache write failed: {0}")]
    CacheWrite(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Detection(_) => "E001",
            Self::NotAProject(_) => "E002",
            Self::Service(_) => "E100",
            Self::Network(_) => "E101",
            Self::Unauthorized(_) => "E102",
            Self::CacheRead(_) => "E200",
            Self::CacheWrite(_) => "E201",
            Self::Config(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Serialization(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NotAProject(path) => {
                Some(format!("Run from a project directory instead of {}", path))
            }
            Self::Network(_) => Some("Check internet connection".to_string()),
            Self::Unauthorized(_) => Some("export MNEMO_API_KEY=<key>".to_string()),
            Self::Config(_) => Some("Check ~/.config/mnemo/config.toml".to_string()),
            _ => None,
        }
    }

    /// Whether the error came from project or technology detection
    pub fn is_detection(&self) -> bool {
        matches!(self, Self::Detection(_) | Self::NotAProject(_))
    }

    /// Whether the error came from the remote graph store
    ///
    /// Callers may retry these on a later invocation; the engine never does.
    pub fn is_service(&self) -> bool {
        matches!(
            self,
            Self::Service(_) | Self::Network(_) | Self::Unauthorized(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_errors() {
        let error = Error::Detection("manifest unreadable".to_string());
        assert_eq!(error.code(), "E001");
        assert!(error.is_detection());
        assert!(!error.is_service());
        assert!(error.to_string().contains("manifest unreadable"));

        let error = Error::NotAProject("/tmp/nowhere".to_string());
        assert_eq!(error.code(), "E002");
        assert!(error.is_detection());
        assert!(error.suggestion().unwrap().contains("/tmp/nowhere"));
    }

    #[test]
    fn test_service_errors() {
        let error = Error::Service("empty response".to_string());
        assert_eq!(error.code(), "E100");
        assert!(error.is_service());
        assert_eq!(error.suggestion(), None);

        let error = Error::Unauthorized(401);
        assert_eq!(error.code(), "E102");
        assert!(error.is_service());
        assert!(error.to_string().contains("401"));
    }

    #[test]
    fn test_cache_errors() {
        let error = Error::CacheRead("missing sessionId".to_string());
        assert_eq!(error.code(), "E200");
        assert!(!error.is_service());
        assert!(!error.is_detection());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: Error = io.into();
        assert_eq!(error.code(), "E9999");
        assert_eq!(error.suggestion(), None);
    }
}
