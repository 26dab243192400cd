//! Error types for gosyms operations.
//!
//! Errors are split the same way resolution failures are handled:
//!
//! - **`Error`**: failures that stop the resolution of one package (cycles,
//!   missing packages, malformed source) or the whole run (unreadable root)
//! - **`PackageError`**: per-package failures collected during a scan; the
//!   scan itself continues
//!
//! Type-check problems are neither: they are [`Diagnostic`](crate::Diagnostic)
//! values delivered to a sink and never abort anything.
//!
//! `Error` is `Clone` because a failed outcome is remembered in the resolution
//! session and handed back to every later importer of the same path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Result type for gosyms operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for gosyms operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The import graph reachable from a package loops back onto itself.
    #[error("import cycle not allowed: {}", .stack.join(" -> "))]
    Cycle {
        /// Import path that was requested while already in progress
        import_path: String,
        /// In-progress import chain, ending with the repeated path
        stack: Vec<String>,
    },

    /// No search root holds a directory for the import path.
    #[error("cannot find package {import_path:?} in any of: {}", display_paths(.searched))]
    NotFound {
        /// Import path that could not be located
        import_path: String,
        /// Candidate directories that were tried, in order
        searched: Vec<PathBuf>,
    },

    /// A source file is syntactically malformed.
    #[error("{}:{}:{}: {message}", .path.display(), .line + 1, .column + 1)]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Line of the first error (0-indexed)
        line: usize,
        /// Column of the first error (0-indexed)
        column: usize,
        /// Description of the problem
        message: String,
    },

    /// Files in one directory declare different package names.
    #[error("found packages {first} and {second} in {}", .dir.display())]
    MultiplePackages {
        /// Directory holding the conflicting files
        dir: PathBuf,
        /// First package name seen
        first: String,
        /// Conflicting package name
        second: String,
    },

    /// File system operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being read when the error occurred
        path: PathBuf,
        /// Underlying error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Tree-sitter parsing infrastructure failed.
    #[error("parser error: {0}")]
    Parser(String),

    /// The worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// Invalid configuration or arguments.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal failure: a poisoned lock or a panicking worker.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an I/O error together with the path that caused it.
    #[must_use]
    pub fn io(path: &Path, error: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source: Arc::new(error),
        }
    }

    /// Returns `true` for an import cycle.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<no search roots>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error encountered while processing a specific package during a scan.
///
/// These errors are collected but don't halt the scan. The remaining packages
/// are still processed and all errors are reported at the end.
#[derive(Debug, Clone)]
pub struct PackageError {
    /// Directory of the package that failed
    pub dir: PathBuf,
    /// Import path the package was requested under
    pub import_path: String,
    /// Category of the error
    pub kind: PackageErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {} ({})",
            self.import_path,
            self.dir.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for PackageError {}

/// Categorization of per-package errors.
///
/// Uses a 4xx/5xx style pattern:
/// - Input problems are issues with the source tree (user can fix)
/// - Internal problems are issues reading it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageErrorKind {
    // === Input Problems (analogous to HTTP 4xx) ===
    /// Import graph cycle
    Cycle,

    /// Import path not found in any search root
    NotFound,

    /// Source file has syntax errors
    ParseFailed,

    /// Directory mixes package names
    MultiplePackages,

    // === Internal Problems (analogous to HTTP 5xx) ===
    /// Could not read files from disk
    IoError,

    /// Anything else (parser setup, configuration)
    Internal,
}

impl std::fmt::Display for PackageErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle => write!(f, "import cycle"),
            Self::NotFound => write!(f, "not found"),
            Self::ParseFailed => write!(f, "parse failed"),
            Self::MultiplePackages => write!(f, "multiple packages"),
            Self::IoError => write!(f, "I/O error"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl PackageErrorKind {
    /// Returns `true` if this is an input problem (4xx-style).
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Cycle | Self::NotFound | Self::ParseFailed | Self::MultiplePackages
        )
    }

    /// Returns `true` if this is an internal problem (5xx-style).
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::IoError | Self::Internal)
    }
}

impl From<&Error> for PackageErrorKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::Cycle { .. } => Self::Cycle,
            Error::NotFound { .. } => Self::NotFound,
            Error::Parse { .. } => Self::ParseFailed,
            Error::MultiplePackages { .. } => Self::MultiplePackages,
            Error::Io { .. } => Self::IoError,
            Error::Parser(_) | Error::ThreadPool(_) | Error::Config(_) | Error::Internal(_) => {
                Self::Internal
            }
        }
    }
}

impl PackageError {
    /// Create a new package error.
    #[must_use]
    pub fn new(
        dir: PathBuf,
        import_path: impl Into<String>,
        kind: PackageErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            dir,
            import_path: import_path.into(),
            kind,
            message: message.into(),
        }
    }

    /// Record a resolution failure for the package in `dir`.
    #[must_use]
    pub fn from_error(dir: &Path, import_path: &str, error: &Error) -> Self {
        Self::new(
            dir.to_path_buf(),
            import_path,
            PackageErrorKind::from(error),
            error.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_error_kind_categorization() {
        assert!(PackageErrorKind::Cycle.is_input_error());
        assert!(PackageErrorKind::NotFound.is_input_error());
        assert!(PackageErrorKind::ParseFailed.is_input_error());
        assert!(!PackageErrorKind::ParseFailed.is_internal_error());

        assert!(PackageErrorKind::IoError.is_internal_error());
        assert!(PackageErrorKind::Internal.is_internal_error());
        assert_eq!(
            PackageErrorKind::from(&Error::Internal("mutex poisoned".to_string())),
            PackageErrorKind::Internal
        );
        assert!(!PackageErrorKind::IoError.is_input_error());
    }

    #[test]
    fn cycle_error_shows_import_chain() {
        let error = Error::Cycle {
            import_path: "a".to_string(),
            stack: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };

        assert_eq!(error.to_string(), "import cycle not allowed: a -> b -> a");
        assert!(error.is_cycle());
    }

    #[test]
    fn parse_error_positions_are_one_indexed_in_display() {
        let error = Error::Parse {
            path: PathBuf::from("pkg/a.go"),
            line: 2,
            column: 0,
            message: "syntax error".to_string(),
        };

        assert_eq!(error.to_string(), "pkg/a.go:3:1: syntax error");
    }

    #[test]
    fn package_error_display_includes_path_and_kind() {
        let error = Error::NotFound {
            import_path: "example.com/missing".to_string(),
            searched: vec![PathBuf::from("/src/example.com/missing")],
        };
        let package_error = PackageError::from_error(
            Path::new("/src/app"),
            "example.com/app",
            &error,
        );

        let display = package_error.to_string();
        assert!(display.contains("example.com/app"));
        assert!(display.contains("example.com/missing"));
        assert!(display.contains("not found"));
        assert_eq!(package_error.kind, PackageErrorKind::NotFound);
    }

    #[test]
    fn io_error_is_cloneable() {
        let error = Error::io(
            Path::new("/root"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let cloned = error.clone();

        assert!(cloned.to_string().contains("/root"));
        assert!(std::error::Error::source(&cloned).is_some());
    }
}
