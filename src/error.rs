//! Unified error handling for the market sync core
//!
//! Every failure in this crate is recoverable: transport errors trigger
//! reconnects or endpoint fallback, offload errors switch the merge path to
//! inline, storage errors are swallowed by the best-effort callers. The enum
//! still carries enough context for the logs to say what degraded.

use std::fmt;
use std::io;

/// Main error type for the market sync core
#[derive(Debug)]
pub enum SyncError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),

    // Storage errors
    StorageConnection(String),
    StorageQuery(String),

    // Upstream API errors
    ApiConnection(String),
    ApiResponse(String),
    ApiTimeout(String),
    ApiDecode(String),

    // Streaming errors
    StreamConnection(String),
    StreamClosed(String),
    ReconnectExhausted(u32),

    // Background merge worker
    OffloadUnavailable(String),

    // IO errors
    FileNotFound(String),
    FileRead(String),
    FileWrite(String),

    // General errors
    Internal(String),
}

impl SyncError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            SyncError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: market-sync init\n\
                    2. Edit config.toml (symbols, endpoints)\n\
                    3. Try again",
                    path
                )
            }
            SyncError::ConfigValidation(msg) => {
                format!(
                    "Configuration validation error: {}\n\n\
                    💡 Check config.toml for:\n\
                    - At least one feed symbol\n\
                    - Positive intervals and timeouts\n\
                    - Non-zero history length",
                    msg
                )
            }
            SyncError::StorageConnection(msg) => {
                format!(
                    "Local storage unavailable: {}\n\n\
                    💡 Price history and warm start are disabled.\n\
                    Check the data/ directory permissions and free disk space.",
                    msg
                )
            }
            SyncError::ReconnectExhausted(attempts) => {
                format!(
                    "Live stream gave up after {} reconnect attempts\n\n\
                    💡 Prices are paused until the leader tab restarts\n\
                    or another tab takes over.",
                    attempts
                )
            }
            _ => self.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ApiTimeout(_)
                | SyncError::ApiConnection(_)
                | SyncError::StreamConnection(_)
                | SyncError::StreamClosed(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::ConfigNotFound(_)
            | SyncError::ConfigParse(_)
            | SyncError::ConfigValidation(_) => "config",

            SyncError::StorageConnection(_) | SyncError::StorageQuery(_) => "storage",

            SyncError::ApiConnection(_)
            | SyncError::ApiResponse(_)
            | SyncError::ApiTimeout(_)
            | SyncError::ApiDecode(_) => "api",

            SyncError::StreamConnection(_)
            | SyncError::StreamClosed(_)
            | SyncError::ReconnectExhausted(_) => "stream",

            SyncError::OffloadUnavailable(_) => "offload",

            SyncError::FileNotFound(_) | SyncError::FileRead(_) | SyncError::FileWrite(_) => "io",

            SyncError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            SyncError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            SyncError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }

            SyncError::StorageConnection(msg) => {
                write!(f, "Storage connection error: {}", msg)
            }
            SyncError::StorageQuery(msg) => {
                write!(f, "Storage query error: {}", msg)
            }

            SyncError::ApiConnection(msg) => {
                write!(f, "API connection error: {}", msg)
            }
            SyncError::ApiResponse(msg) => {
                write!(f, "API response error: {}", msg)
            }
            SyncError::ApiTimeout(msg) => {
                write!(f, "API timeout: {}", msg)
            }
            SyncError::ApiDecode(msg) => {
                write!(f, "API payload could not be decoded: {}", msg)
            }

            SyncError::StreamConnection(msg) => {
                write!(f, "Stream connection error: {}", msg)
            }
            SyncError::StreamClosed(msg) => {
                write!(f, "Stream closed: {}", msg)
            }
            SyncError::ReconnectExhausted(attempts) => {
                write!(f, "Reconnect attempts exhausted after {} tries", attempts)
            }

            SyncError::OffloadUnavailable(msg) => {
                write!(f, "Merge worker unavailable: {}", msg)
            }

            SyncError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            SyncError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            SyncError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }

            SyncError::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SyncError {}

// Conversion implementations for common error types

impl From<io::Error> for SyncError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SyncError::FileNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => SyncError::FileRead(err.to_string()),
            io::ErrorKind::TimedOut => SyncError::ApiTimeout(err.to_string()),
            io::ErrorKind::ConnectionRefused => SyncError::ApiConnection(err.to_string()),
            _ => SyncError::Internal(format!("IO error: {}", err)),
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => SyncError::StorageQuery(msg),
            rusqlite::Error::QueryReturnedNoRows => {
                SyncError::StorageQuery("Query returned no rows".to_string())
            }
            _ => SyncError::StorageQuery(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::ApiDecode(format!("JSON parse error: {}", err))
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::ApiTimeout(err.to_string())
        } else if err.is_status() {
            SyncError::ApiResponse(err.to_string())
        } else if err.is_decode() {
            SyncError::ApiDecode(err.to_string())
        } else {
            SyncError::ApiConnection(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                SyncError::StreamClosed(err.to_string())
            }
            _ => SyncError::StreamConnection(err.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for SyncError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::FileRead(msg) => SyncError::ConfigNotFound(msg),
            ConfigError::FileWrite(msg) => SyncError::FileWrite(msg),
            ConfigError::Parse(msg) => SyncError::ConfigParse(msg),
            ConfigError::Serialize(msg) => SyncError::Internal(msg),
            ConfigError::Validation(msg) => SyncError::ConfigValidation(msg),
        }
    }
}

impl From<String> for SyncError {
    fn from(msg: String) -> Self {
        SyncError::Internal(msg)
    }
}

impl From<&str> for SyncError {
    fn from(msg: &str) -> Self {
        SyncError::Internal(msg.to_string())
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::ConfigNotFound("config.toml".to_string());
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_error_category() {
        let err = SyncError::ConfigValidation("test".to_string());
        assert_eq!(err.category(), "config");

        let err = SyncError::StorageQuery("test".to_string());
        assert_eq!(err.category(), "storage");

        let err = SyncError::ApiTimeout("test".to_string());
        assert_eq!(err.category(), "api");

        let err = SyncError::ReconnectExhausted(8);
        assert_eq!(err.category(), "stream");
    }

    #[test]
    fn test_retryable() {
        let err = SyncError::ApiTimeout("test".to_string());
        assert!(err.is_retryable());

        let err = SyncError::OffloadUnavailable("test".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_message() {
        let err = SyncError::ReconnectExhausted(8);
        let msg = err.user_message();
        assert!(msg.contains("8 reconnect attempts"));
        assert!(msg.contains("💡"));
    }

    #[test]
    fn test_config_errors_keep_their_hints() {
        let err = SyncError::from(crate::config::ConfigError::Validation("no symbols".to_string()));
        assert_eq!(err.category(), "config");
        assert!(err.user_message().contains("At least one feed symbol"));

        let err = SyncError::ConfigNotFound("config.toml".to_string());
        assert!(err.user_message().contains("market-sync init"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let sync_err: SyncError = io_err.into();
        assert!(matches!(sync_err, SyncError::FileNotFound(_)));
    }
}
