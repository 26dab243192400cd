//! Non-fatal type-check diagnostics and the sink that collects them.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// A type-check problem found in one file.
///
/// Diagnostics never abort resolution; the package is still cached and its
/// declarations are still searchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// File the problem was found in
    pub path: PathBuf,
    /// Line (0-indexed)
    pub line: usize,
    /// Column (0-indexed)
    pub column: usize,
    /// Human-readable description
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path.display(),
            self.line + 1,
            self.column + 1,
            self.message
        )
    }
}

/// Thread-safe collector for diagnostics.
///
/// Clones share the same underlying storage, so one sink can be handed to the
/// resolver and read back by whoever created it.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn push(&self, diagnostic: Diagnostic) {
        tracing::debug!(
            file = %diagnostic.path.display(),
            line = diagnostic.line + 1,
            message = %diagnostic.message,
            "Type-check diagnostic"
        );
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    /// Copy of everything recorded so far, in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take everything recorded so far, leaving the sink empty.
    #[must_use]
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(
            &mut *self
                .diagnostics
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Number of recorded diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
