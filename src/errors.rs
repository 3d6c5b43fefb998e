//! Error Types
//!
//! The main error type [`StrataError`] covers the failure modes that are
//! allowed to propagate: persisted shader-cache I/O, cache format problems
//! and task-pool shutdown.
//!
//! Shader *compile* failures are deliberately not represented here. Per the
//! render-loop error policy they are captured as diagnostic strings at the
//! point of failure, logged, and surfaced as a `None` program handle so that
//! one bad material never blanks the whole frame.

use thiserror::Error;

/// The main error type for the Strata renderer core.
#[derive(Error, Debug)]
pub enum StrataError {
    // ========================================================================
    // Persisted shader cache
    // ========================================================================
    /// The persisted cache file was written by an incompatible format version.
    #[error("Shader cache version mismatch: found {found}, expected {expected}")]
    CacheVersionMismatch {
        /// Version found in the file
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// The persisted cache was produced against a different backend.
    #[error("Shader cache backend mismatch: found '{found}', expected '{expected}'")]
    CacheBackendMismatch {
        /// Backend tag found in the file
        found: String,
        /// Backend tag of the current device
        expected: String,
    },

    // ========================================================================
    // I/O & serialization
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ========================================================================
    // Async tasks
    // ========================================================================
    /// The task pool has been shut down and can no longer accept work.
    #[error("Task pool has shut down")]
    TaskPoolShutDown,
}

/// Alias for `Result<T, StrataError>`.
pub type Result<T> = std::result::Result<T, StrataError>;
