//! Central error types for Zoomcast.
//!
//! This module provides typed errors for better error handling across the codebase.
//! All errors implement `Serialize` so control-surface callers receive them as
//! plain strings.

use serde::Serialize;
use thiserror::Error;

/// Main error type for Zoomcast operations.
#[derive(Error, Debug)]
pub enum ZoomcastError {
    /// Capture was declined by the user or source
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    /// A session already exists for the requested capture target
    #[error("A recording is already active for target {target}")]
    AlreadyActive { target: String },

    /// Operation is not legal from the session's current state
    #[error("Invalid state for {operation}: session is {actual}")]
    InvalidState { operation: String, actual: String },

    /// Bounded wait exceeded
    #[error("Timed out after {millis}ms waiting for {waiting_for}")]
    Timeout { waiting_for: String, millis: u64 },

    /// Session, project or blob missing
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Timeline was already sealed
    #[error("Timeline for session {session_id} is already sealed")]
    AlreadySealed { session_id: String },

    /// Storage over limit after an eviction attempt
    #[error("Storage quota exceeded: {used} of {capacity} bytes in use")]
    QuotaExceeded { used: u64, capacity: u64 },

    /// Underlying persistence failure
    #[error("Storage error: {0}")]
    StorageIo(#[from] std::io::Error),

    /// Capture collaborator failed
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Input-telemetry collaborator failed
    #[error("Input tracking failed: {0}")]
    TrackingError(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Persisted record carries a schema version newer than this build understands
    #[error("Unsupported schema version {found} (supported up to {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Serialize as the error message string so responses stay flat.
impl Serialize for ZoomcastError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<String> for ZoomcastError {
    fn from(msg: String) -> Self {
        ZoomcastError::Other(msg)
    }
}

impl From<&str> for ZoomcastError {
    fn from(msg: &str) -> Self {
        ZoomcastError::Other(msg.to_string())
    }
}

impl ZoomcastError {
    /// Build an `InvalidState` error for a named operation.
    pub fn invalid_state(operation: &str, actual: impl std::fmt::Display) -> Self {
        ZoomcastError::InvalidState {
            operation: operation.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Build a `NotFound` error for a record kind and id.
    pub fn not_found(kind: &str, id: &str) -> Self {
        ZoomcastError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}

/// Extension trait for adding context to Results.
///
/// Allows chaining context information onto errors for better debugging.
///
/// # Example
/// ```ignore
/// use crate::error::{ResultExt, ZoomcastResult};
///
/// fn load_index() -> ZoomcastResult<Index> {
///     std::fs::read_to_string("recent_projects.json")
///         .context("failed to read recent projects index")?;
///     // ...
/// }
/// ```
pub trait ResultExt<T> {
    /// Add context to an error, converting it to ZoomcastError::Other.
    fn context(self, msg: &str) -> ZoomcastResult<T>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> ZoomcastResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> ZoomcastResult<T> {
        self.map_err(|e| ZoomcastError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> ZoomcastResult<T> {
        self.map_err(|e| ZoomcastError::Other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types.
pub trait OptionExt<T> {
    /// Convert None to ZoomcastError::Other with the given message.
    fn context(self, msg: &str) -> ZoomcastResult<T>;

    /// Convert None to ZoomcastError::Other with a lazily evaluated message.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> ZoomcastResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> ZoomcastResult<T> {
        self.ok_or_else(|| ZoomcastError::Other(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> ZoomcastResult<T> {
        self.ok_or_else(|| ZoomcastError::Other(f()))
    }
}

/// Type alias for Results using ZoomcastError.
pub type ZoomcastResult<T> = Result<T, ZoomcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZoomcastError::PermissionDenied("user declined the picker".to_string());
        assert_eq!(
            err.to_string(),
            "Capture permission denied: user declined the picker"
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = ZoomcastError::AlreadyActive {
            target: "tab:42".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("already active"));
        assert!(json.contains("tab:42"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ZoomcastError = io_err.into();
        assert!(matches!(err, ZoomcastError::StorageIo(_)));
    }

    #[test]
    fn test_from_string() {
        let err: ZoomcastError = "test error".into();
        assert!(matches!(err, ZoomcastError::Other(_)));
    }

    #[test]
    fn test_invalid_state_helper() {
        let err = ZoomcastError::invalid_state("pause", "stopped");
        let msg = err.to_string();
        assert!(msg.contains("pause"));
        assert!(msg.contains("stopped"));
    }

    #[test]
    fn test_timeout_display() {
        let err = ZoomcastError::Timeout {
            waiting_for: "capture initialization".to_string(),
            millis: 15_000,
        };
        assert!(err.to_string().contains("15000ms"));
        assert!(err.to_string().contains("capture initialization"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<(), &str> = Err("original error");
        let with_context = result.context("operation failed");

        assert!(matches!(with_context, Err(ZoomcastError::Other(_))));
        let msg = with_context.unwrap_err().to_string();
        assert!(msg.contains("operation failed"));
        assert!(msg.contains("original error"));
    }

    #[test]
    fn test_result_ext_with_context() {
        let result: Result<(), &str> = Err("inner");
        let with_context = result.with_context(|| format!("ctx-{}", 42));

        let msg = with_context.unwrap_err().to_string();
        assert!(msg.contains("ctx-42"));
        assert!(msg.contains("inner"));
    }

    #[test]
    fn test_option_ext_context() {
        let opt: Option<i32> = None;
        let result = opt.context("value was missing");

        assert!(matches!(result, Err(ZoomcastError::Other(_))));
        assert!(result.unwrap_err().to_string().contains("value was missing"));
    }

    #[test]
    fn test_option_ext_some_passthrough() {
        let opt: Option<i32> = Some(42);
        let result = opt.context("should not appear");

        assert_eq!(result.unwrap(), 42);
    }
}
