//! Domain types for gosyms.
//!
//! These types represent the public result model:
//! - **Records**: `Symbol`, `SymbolKind` (what a query returns)
//! - **Classification**: `Category` (what the checker records per declaration)
//! - **Input**: `Query` (normalized search string), `Strategy`
//! - **Results**: `SearchResults`, `SearchStats`, `ResultOrder`
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Kind | Four-value enum | Matches the output schema exactly |
//! | Category | `Option<Category>` | Functions carry no category; `classify` maps `None` to `func` |
//! | Positions | 0-indexed line and column | Matches the output schema |
//! | Package | Package clause name | What a reader sees in source |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::checker::Diagnostic;
use crate::error::PackageError;

// ============================================================================
// Enums
// ============================================================================

/// Symbol kinds reported in results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    /// Function, method, or interface method
    Func,
    /// Named type or alias
    Type,
    /// Package-level variable or struct field
    Var,
    /// Constant
    Const,
}

impl SymbolKind {
    /// Classify a checked declaration.
    ///
    /// The checker attaches a category to every declaration it can name a
    /// category for. Function and method declarations never get one, because
    /// their bodies are not analyzed and the signature is all there is. So a
    /// declaration without a category is a function.
    #[must_use]
    pub fn classify(category: Option<Category>) -> Self {
        match category {
            Some(Category::TypeName) => Self::Type,
            Some(Category::Var | Category::Field) => Self::Var,
            Some(Category::Const) => Self::Const,
            None => Self::Func,
        }
    }

    /// Convert to the output string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Func => "func",
            Self::Type => "type",
            Self::Var => "var",
            Self::Const => "const",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a declaration in a checked package's declaration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// `type T ...` or `type T = ...`
    TypeName,
    /// Package-level `var`
    Var,
    /// Package-level `const`
    Const,
    /// Named struct field
    Field,
}

/// Which extraction pipeline a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Sequential resolution with declaration-level type checking.
    ///
    /// Reports funcs, types, vars and consts, in discovery order.
    Typed,
    /// Parallel syntax-only extraction.
    ///
    /// Reports funcs and types only, in no particular order.
    #[default]
    SyntaxOnly,
}

/// Ordering guarantee of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Insertion order follows package discovery order and is stable.
    Discovery,
    /// Order depends on worker scheduling.
    Unspecified,
}

// ============================================================================
// Records
// ============================================================================

/// A symbol matching a query.
///
/// Serializes with exactly the field names of the output schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    /// Declared identifier
    pub name: String,
    /// Kind of declaration
    pub kind: SymbolKind,
    /// Name of the owning package (from its package clause)
    pub package: String,
    /// Absolute path of the declaring file
    pub path: PathBuf,
    /// Line of the identifier (0-indexed)
    pub line: usize,
    /// Column of the identifier (0-indexed, in bytes)
    pub character: usize,
}

/// A normalized, case-insensitive substring query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    needle: String,
}

impl Query {
    /// Normalize `query` for matching.
    #[must_use]
    pub fn new(query: &str) -> Self {
        Self {
            needle: query.to_lowercase(),
        }
    }

    /// Returns `true` if the query is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Returns `true` if `name` contains the query, ignoring case.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        name.to_lowercase().contains(&self.needle)
    }

    /// The lower-cased query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.needle
    }
}

// ============================================================================
// Results
// ============================================================================

/// Statistics from one search run.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    /// Package directories found under the root
    pub packages_discovered: usize,
    /// Packages processed successfully (including ones with no sources)
    pub packages_processed: usize,
    /// Packages that failed and were skipped
    pub packages_skipped: usize,
    /// Packages marked local (non-empty, under the root)
    pub local_packages: usize,
    /// Highest number of packages in flight at once (parallel pipeline only)
    pub peak_concurrency: usize,
    /// Time taken for the run
    pub duration: Duration,
    /// Directories that could not be read, with the reason
    pub directories_skipped: Vec<(PathBuf, String)>,
    /// Per-package failures
    pub errors: Vec<PackageError>,
    /// Type-check diagnostics (typed pipeline only)
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Matching symbols
    pub symbols: Vec<Symbol>,
    /// Ordering guarantee of `symbols`
    pub order: ResultOrder,
    /// Run statistics
    pub stats: SearchStats,
}

impl SearchResults {
    /// An empty result set that did no work.
    #[must_use]
    pub fn empty(order: ResultOrder) -> Self {
        Self {
            symbols: Vec::new(),
            order,
            stats: SearchStats::default(),
        }
    }

    /// Symbols sorted by (path, line, name), for order-independent comparison.
    #[must_use]
    pub fn sorted_symbols(&self) -> Vec<Symbol> {
        let mut symbols = self.symbols.clone();
        symbols.sort_by(|a, b| {
            (&a.path, a.line, a.character, &a.name).cmp(&(&b.path, b.line, b.character, &b.name))
        });
        symbols
    }
}
