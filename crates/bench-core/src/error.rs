//! Error types for the bench abstraction layer.
//!
//! `BenchError` is the single error type returned by resources, drivers and
//! staging backends. Each variant carries enough context (driver name, local
//! path, destination, host) to diagnose a failure from the message alone.
//!
//! ## Error Categories
//!
//! 1. **Lifecycle violations** - `NotBound`, `NotActive`
//!    - Programming-contract errors; never retried.
//! 2. **Configuration errors** - `PathViolation`, `BindingMismatch`, `Configuration`
//!    - Permanent; fix the bench description and restart.
//!    - `PathViolation` is always raised before any filesystem mutation.
//! 3. **Runtime errors** - `SourceUnreadable`, `Transfer`, `CommandFailed`,
//!    `ResourceUnavailable`, `Io`
//!    - `Transfer` and `CommandFailed` may be transient. This layer does not
//!      retry them; callers may consult [`BenchError::is_retryable`].

use crate::resource::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the bench error type.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Primary error type for bench resources and drivers.
#[derive(Error, Debug)]
pub enum BenchError {
    /// The operation needs a bound resource but the driver has none.
    #[error("Driver '{driver}' is not bound to a resource")]
    NotBound {
        /// Driver instance name
        driver: String,
    },

    /// The operation needs an active driver.
    #[error("Driver '{driver}' is not active")]
    NotActive {
        /// Driver instance name
        driver: String,
    },

    /// The local source file is missing or cannot be read.
    #[error("Cannot read source file '{}': {reason}", path.display())]
    SourceUnreadable {
        /// Local file that was requested
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// A computed destination would escape the managed root.
    #[error("Path '{}' escapes managed root '{}'", path.display(), root.display())]
    PathViolation {
        /// Root every staged path must stay under
        root: PathBuf,
        /// Offending path (as requested or as computed)
        path: PathBuf,
    },

    /// A transfer to a staging destination failed.
    #[error("Transfer of '{}' to {host}:{} failed: {reason}", local.display(), destination.display())]
    Transfer {
        /// Local source file
        local: PathBuf,
        /// Destination path on the provider
        destination: PathBuf,
        /// Provider host (`localhost` for local providers)
        host: String,
        /// Underlying cause
        reason: String,
    },

    /// A dynamically matched resource is currently not present.
    #[error("Resource '{resource}' is currently unavailable: {reason}")]
    ResourceUnavailable {
        /// Resource name
        resource: String,
        /// Why the resource has no identity
        reason: String,
    },

    /// An external command exited unsuccessfully or could not be started.
    #[error("Command `{command}` failed: {reason}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit status and stderr, or the spawn error
        reason: String,
    },

    /// A driver was bound to a resource kind it does not accept.
    #[error("Driver '{driver}' cannot bind resource '{resource}' of kind '{kind}' (accepts: {accepted})")]
    BindingMismatch {
        /// Driver instance name
        driver: String,
        /// Resource name
        resource: String,
        /// Kind of the offered resource
        kind: ResourceKind,
        /// Comma-separated list of accepted kinds
        accepted: String,
    },

    /// Semantic configuration error.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Build a [`BenchError::Transfer`], rendering an empty host as `localhost`.
    pub fn transfer(
        local: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        host: &str,
        reason: impl ToString,
    ) -> Self {
        let host = if host.is_empty() { "localhost" } else { host };
        Self::Transfer {
            local: local.into(),
            destination: destination.into(),
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`BenchError::SourceUnreadable`].
    pub fn source_unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a caller-level retry policy could reasonably retry this error.
    ///
    /// Lifecycle and configuration errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::CommandFailed { .. })
    }
}
