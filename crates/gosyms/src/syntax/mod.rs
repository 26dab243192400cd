//! Go source parsing and the per-file parse cache.
//!
//! Files are parsed with tree-sitter's Go grammar into a [`SyntaxTree`] that
//! keeps the source bytes alongside the tree. Parsed trees are immutable and
//! memoized per absolute path in a [`FileCache`], so a file shared by several
//! resolutions of the same directory (different tag keys) is parsed once.
//!
//! ## Design
//!
//! Tree-sitter is error tolerant and always produces a tree. A tree containing
//! error or missing nodes is reported as [`Error::Parse`] at the first such
//! node, matching a conventional parser that stops at the first syntax error.

pub mod tree_sitter_utils;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use tree_sitter_utils::{field_children, first_error, named_children, node_position, node_text};

/// Tree-sitter node kind constants for the Go grammar.
///
/// These match the node types defined in tree-sitter-go.
pub(crate) mod node_kinds {
    // Top level
    pub const PACKAGE_CLAUSE: &str = "package_clause";
    pub const IMPORT_DECLARATION: &str = "import_declaration";
    pub const IMPORT_SPEC: &str = "import_spec";
    pub const IMPORT_SPEC_LIST: &str = "import_spec_list";
    pub const FUNCTION_DECLARATION: &str = "function_declaration";
    pub const METHOD_DECLARATION: &str = "method_declaration";
    pub const TYPE_DECLARATION: &str = "type_declaration";
    pub const TYPE_SPEC: &str = "type_spec";
    pub const TYPE_ALIAS: &str = "type_alias";
    pub const VAR_DECLARATION: &str = "var_declaration";
    pub const VAR_SPEC: &str = "var_spec";
    pub const VAR_SPEC_LIST: &str = "var_spec_list";
    pub const CONST_DECLARATION: &str = "const_declaration";
    pub const CONST_SPEC: &str = "const_spec";

    // Import names
    pub const DOT: &str = "dot";
    pub const BLANK_IDENTIFIER: &str = "blank_identifier";

    // Types
    pub const TYPE_IDENTIFIER: &str = "type_identifier";
    pub const QUALIFIED_TYPE: &str = "qualified_type";
    pub const GENERIC_TYPE: &str = "generic_type";
    pub const POINTER_TYPE: &str = "pointer_type";
    pub const PARENTHESIZED_TYPE: &str = "parenthesized_type";
    pub const ARRAY_TYPE: &str = "array_type";
    pub const IMPLICIT_LENGTH_ARRAY_TYPE: &str = "implicit_length_array_type";
    pub const STRUCT_TYPE: &str = "struct_type";
    pub const INTERFACE_TYPE: &str = "interface_type";
    pub const FUNCTION_TYPE: &str = "function_type";
    pub const TYPE_ELEM: &str = "type_elem";

    // Struct and interface members
    pub const FIELD_DECLARATION_LIST: &str = "field_declaration_list";
    pub const FIELD_DECLARATION: &str = "field_declaration";
    pub const METHOD_ELEM: &str = "method_elem";
    pub const METHOD_SPEC: &str = "method_spec";

    // Signatures
    pub const PARAMETER_LIST: &str = "parameter_list";
    pub const PARAMETER_DECLARATION: &str = "parameter_declaration";
    pub const VARIADIC_PARAMETER_DECLARATION: &str = "variadic_parameter_declaration";
    pub const TYPE_PARAMETER_DECLARATION: &str = "type_parameter_declaration";
}

/// One `import` spec of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Unquoted import path
    pub path: String,
    /// How the import is bound in the file
    pub binding: ImportBinding,
    /// Line of the import spec (0-indexed)
    pub line: usize,
    /// Column of the import spec (0-indexed)
    pub column: usize,
}

/// Name an import introduces into its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    /// `import "p"`: the imported package's own name
    Default,
    /// `import q "p"`
    Named(String),
    /// `import . "p"`: exported names merge into the file scope
    Dot,
    /// `import _ "p"`: imported for side effects only
    Blank,
}

/// Immutable parse result for one Go file.
pub struct SyntaxTree {
    path: PathBuf,
    source: Vec<u8>,
    tree: tree_sitter::Tree,
}

impl std::fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("path", &self.path)
            .field("bytes", &self.source.len())
            .finish_non_exhaustive()
    }
}

impl SyntaxTree {
    /// Parse `source` as the contents of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parser`] if the grammar cannot be loaded and
    /// [`Error::Parse`] if the source has a syntax error.
    pub fn parse(path: &Path, source: Vec<u8>) -> Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| Error::Parser(e.to_string()))?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| Error::Parser("parser returned no tree".to_string()))?;

        if let Some(bad) = first_error(&tree.root_node()) {
            let (line, column) = node_position(&bad);
            let message = if bad.is_missing() {
                format!("syntax error: missing {}", bad.kind())
            } else {
                let snippet = node_text(&bad, &source)
                    .map(|s| s.lines().next().unwrap_or_default().trim().to_string())
                    .unwrap_or_default();
                format!("syntax error near {snippet:?}")
            };
            return Err(Error::Parse {
                path: path.to_path_buf(),
                line,
                column,
                message,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            source,
            tree,
        })
    }

    /// Absolute path of the parsed file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw source bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Root `source_file` node.
    #[must_use]
    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Text of `node` within this file.
    #[must_use]
    pub fn text(&self, node: &tree_sitter::Node<'_>) -> Option<&str> {
        node_text(node, &self.source)
    }

    /// Name from the package clause.
    #[must_use]
    pub fn package_name(&self) -> Option<&str> {
        let clause = self
            .top_level()
            .into_iter()
            .find(|n| n.kind() == node_kinds::PACKAGE_CLAUSE)?;
        let name = clause.named_child(0)?;
        self.text(&name)
    }

    /// Top-level nodes of the file: package clause, imports, declarations.
    #[must_use]
    pub fn top_level(&self) -> Vec<tree_sitter::Node<'_>> {
        named_children(&self.root())
    }

    /// Every import spec of the file, in source order.
    #[must_use]
    pub fn imports(&self) -> Vec<ImportSpec> {
        let mut specs = Vec::new();
        for decl in self.top_level() {
            if decl.kind() != node_kinds::IMPORT_DECLARATION {
                continue;
            }
            for child in named_children(&decl) {
                match child.kind() {
                    node_kinds::IMPORT_SPEC => specs.extend(self.import_spec(&child)),
                    node_kinds::IMPORT_SPEC_LIST => {
                        for spec in named_children(&child) {
                            if spec.kind() == node_kinds::IMPORT_SPEC {
                                specs.extend(self.import_spec(&spec));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        specs
    }

    fn import_spec(&self, spec: &tree_sitter::Node<'_>) -> Option<ImportSpec> {
        let path_node = spec.child_by_field_name("path")?;
        let path = unquote(self.text(&path_node)?);

        let binding = match spec.child_by_field_name("name") {
            None => ImportBinding::Default,
            Some(name) => match name.kind() {
                node_kinds::DOT => ImportBinding::Dot,
                node_kinds::BLANK_IDENTIFIER => ImportBinding::Blank,
                _ => ImportBinding::Named(self.text(&name)?.to_string()),
            },
        };

        let (line, column) = node_position(spec);
        Some(ImportSpec {
            path,
            binding,
            line,
            column,
        })
    }

    /// Specs inside a grouped or single `var`/`const`/`type` declaration.
    #[must_use]
    pub fn specs<'t>(&self, decl: &tree_sitter::Node<'t>, spec_kinds: &[&str]) -> Vec<tree_sitter::Node<'t>> {
        let mut out = Vec::new();
        for child in named_children(decl) {
            if spec_kinds.contains(&child.kind()) {
                out.push(child);
            } else if child.kind() == node_kinds::VAR_SPEC_LIST {
                out.extend(
                    named_children(&child)
                        .into_iter()
                        .filter(|n| spec_kinds.contains(&n.kind())),
                );
            }
        }
        out
    }

    /// All nodes under `field` of `node`.
    #[must_use]
    pub fn field<'t>(&self, node: &tree_sitter::Node<'t>, field: &str) -> Vec<tree_sitter::Node<'t>> {
        field_children(node, field)
    }
}

fn unquote(literal: &str) -> String {
    literal
        .trim_matches(|c| c == '"' || c == '`')
        .to_string()
}

/// Process-scoped memo of parsed files, keyed by absolute path.
///
/// Thread-safe; the parallel pipeline shares one instance across workers.
/// Entries are never invalidated: the source tree is assumed not to change
/// during a run.
#[derive(Debug, Default)]
pub struct FileCache {
    trees: Mutex<HashMap<PathBuf, Arc<SyntaxTree>>>,
    parses: AtomicUsize,
}

impl FileCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `path`, or return the cached tree.
    ///
    /// Failed parses are not cached; every caller sees the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Parse`]
    /// on a syntax error, and [`Error::Internal`] if the cache lock is
    /// poisoned.
    pub fn parse(&self, path: &Path) -> Result<Arc<SyntaxTree>> {
        if let Some(tree) = self.get(path) {
            trace!(file = %path.display(), "Parse cache hit");
            return Ok(tree);
        }

        let source = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        self.parses.fetch_add(1, Ordering::Relaxed);
        let tree = Arc::new(SyntaxTree::parse(path, source)?);
        debug!(file = %path.display(), "Parsed file");

        // Parse happens outside the lock; keep whichever tree landed first.
        let mut trees = self.lock()?;
        Ok(Arc::clone(trees.entry(path.to_path_buf()).or_insert(tree)))
    }

    /// Acquire the tree map, converting poison errors to our error type.
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<PathBuf, Arc<SyntaxTree>>>> {
        self.trees
            .lock()
            .map_err(|e| Error::Internal(format!("mutex poisoned: {e}")))
    }

    /// Cached tree for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<SyntaxTree>> {
        self.trees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Number of files actually parsed (cache misses).
    #[must_use]
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    /// Number of cached trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse_str(source: &str) -> SyntaxTree {
        SyntaxTree::parse(Path::new("/test/a.go"), source.as_bytes().to_vec())
            .expect("source should parse")
    }

    #[test]
    fn reads_package_name() {
        let tree = parse_str("package widgets\n\nfunc A() {}\n");
        assert_eq!(tree.package_name(), Some("widgets"));
    }

    #[test]
    fn reads_import_bindings() {
        let tree = parse_str(
            "package p\n\nimport (\n\t\"fmt\"\n\tstr \"strings\"\n\t. \"math\"\n\t_ \"embed\"\n)\n\nimport \"os\"\n",
        );

        let imports = tree.imports();
        let summary: Vec<(&str, &ImportBinding)> =
            imports.iter().map(|i| (i.path.as_str(), &i.binding)).collect();

        assert_eq!(
            summary,
            vec![
                ("fmt", &ImportBinding::Default),
                ("strings", &ImportBinding::Named("str".to_string())),
                ("math", &ImportBinding::Dot),
                ("embed", &ImportBinding::Blank),
                ("os", &ImportBinding::Default),
            ]
        );
    }

    #[test]
    fn syntax_error_is_parse_error_with_position() {
        let err = SyntaxTree::parse(
            Path::new("/test/bad.go"),
            b"package p\n\nfunc A( {\n".to_vec(),
        )
        .unwrap_err();

        match err {
            Error::Parse { path, line, .. } => {
                assert_eq!(path, PathBuf::from("/test/bad.go"));
                assert_eq!(line, 2);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn specs_flattens_grouped_declarations() {
        let tree = parse_str("package p\n\nvar (\n\ta = 1\n\tb = 2\n)\n\nconst c = 3\n");

        let decls = tree.top_level();
        let var_decl = decls
            .iter()
            .find(|n| n.kind() == node_kinds::VAR_DECLARATION)
            .unwrap();
        let const_decl = decls
            .iter()
            .find(|n| n.kind() == node_kinds::CONST_DECLARATION)
            .unwrap();

        assert_eq!(tree.specs(var_decl, &[node_kinds::VAR_SPEC]).len(), 2);
        assert_eq!(tree.specs(const_decl, &[node_kinds::CONST_SPEC]).len(), 1);
    }

    #[test]
    fn cache_parses_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.go");
        fs::write(&path, "package p\n").unwrap();
        let cache = FileCache::new();

        let first = cache.parse(&path).unwrap();
        let second = cache.parse(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.parse_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_does_not_keep_failed_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.go");
        fs::write(&path, "package p\n\nfunc (\n").unwrap();
        let cache = FileCache::new();

        assert!(cache.parse(&path).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_reports_missing_file_as_io_error() {
        let cache = FileCache::new();
        let err = cache.parse(Path::new("/nonexistent/gosyms/a.go")).unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(cache.parse_count(), 0);
    }

    #[test]
    fn poisoned_cache_reports_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.go");
        fs::write(&path, "package p\n").unwrap();
        let cache = FileCache::new();

        let poisoned = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let trees = cache.trees.lock().unwrap();
                    assert!(!trees.is_empty(), "parser thread failed");
                })
                .join()
        });
        assert!(poisoned.is_err());

        let err = cache.parse(&path).unwrap_err();

        assert!(matches!(err, Error::Internal(ref message) if message.contains("poisoned")));
        assert_eq!(cache.len(), 0);
        assert!(cache.get(&path).is_none());
    }
}
