//! Symbol extraction from resolved packages.
//!
//! Two [`Extractor`]s share one interface:
//!
//! - [`TypedExtractor`] sweeps a checked package's declaration table and
//!   reports funcs, types, vars and consts, but only for local packages.
//! - [`SyntaxExtractor`] walks the top-level declarations of raw syntax trees
//!   and reports funcs and types. It never descends into function bodies.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::resolver::Package;
use crate::syntax::tree_sitter_utils::node_position;
use crate::syntax::{SyntaxTree, node_kinds};
use crate::types::{Query, Symbol, SymbolKind};

/// Emits the symbols of one package that match a query.
pub trait Extractor {
    /// Append every symbol of `package` matching `query` to `out`.
    fn extract(&self, package: &Package, query: &Query, out: &mut Vec<Symbol>);
}

/// Extractor over checked declaration tables.
#[derive(Debug, Clone, Default)]
pub struct TypedExtractor {
    local: HashSet<PathBuf>,
}

impl TypedExtractor {
    /// Extractor reporting packages whose directory is in `local`.
    #[must_use]
    pub fn new(local: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            local: local.into_iter().collect(),
        }
    }

    /// Returns `true` if symbols of the package in `dir` are reported.
    #[must_use]
    pub fn is_local(&self, dir: &Path) -> bool {
        self.local.contains(dir)
    }
}

impl Extractor for TypedExtractor {
    fn extract(&self, package: &Package, query: &Query, out: &mut Vec<Symbol>) {
        if !self.is_local(&package.dir) {
            trace!(import_path = %package.import_path, "Skipping non-local package");
            return;
        }
        let Some(decls) = &package.decls else {
            return;
        };

        out.extend(
            decls
                .iter()
                .filter(|decl| query.matches(&decl.name))
                .map(|decl| Symbol {
                    name: decl.name.clone(),
                    kind: SymbolKind::classify(decl.category),
                    package: package.name.clone(),
                    path: decl.path.clone(),
                    line: decl.line,
                    character: decl.column,
                }),
        );
    }
}

/// Extractor over raw syntax trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxExtractor;

impl SyntaxExtractor {
    /// Append matching top-level funcs and types of one file to `out`.
    pub fn extract_tree(tree: &SyntaxTree, query: &Query, out: &mut Vec<Symbol>) {
        let package = tree.package_name().unwrap_or_default();

        let mut emit = |ident: Option<tree_sitter::Node<'_>>, kind: SymbolKind| {
            let Some(ident) = ident else {
                return;
            };
            let Some(name) = tree.text(&ident) else {
                return;
            };
            if !query.matches(name) {
                return;
            }
            let (line, character) = node_position(&ident);
            out.push(Symbol {
                name: name.to_string(),
                kind,
                package: package.to_string(),
                path: tree.path().to_path_buf(),
                line,
                character,
            });
        };

        for decl in tree.top_level() {
            match decl.kind() {
                node_kinds::FUNCTION_DECLARATION | node_kinds::METHOD_DECLARATION => {
                    emit(decl.child_by_field_name("name"), SymbolKind::Func);
                }
                node_kinds::TYPE_DECLARATION => {
                    for spec in tree.specs(&decl, &[node_kinds::TYPE_SPEC, node_kinds::TYPE_ALIAS]) {
                        emit(spec.child_by_field_name("name"), SymbolKind::Type);
                    }
                }
                _ => {}
            }
        }
    }
}

impl Extractor for SyntaxExtractor {
    fn extract(&self, package: &Package, query: &Query, out: &mut Vec<Symbol>) {
        for tree in &package.trees {
            Self::extract_tree(tree, query, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Declaration;
    use crate::types::Category;
    use std::sync::Arc;

    fn tree(source: &str) -> Arc<SyntaxTree> {
        Arc::new(
            SyntaxTree::parse(Path::new("/src/p/a.go"), source.as_bytes().to_vec())
                .expect("test source should parse"),
        )
    }

    fn declaration(name: &str, category: Option<Category>, line: usize) -> Declaration {
        Declaration {
            name: name.to_string(),
            category,
            path: PathBuf::from("/src/p/a.go"),
            line,
            column: 0,
        }
    }

    fn checked_package(dir: &str, decls: Vec<Declaration>) -> Package {
        Package {
            import_path: "p".to_string(),
            name: "p".to_string(),
            dir: PathBuf::from(dir),
            decls: Some(decls),
            ..Package::default()
        }
    }

    #[test]
    fn syntax_extractor_reports_only_top_level_funcs_and_types() {
        let package = Package {
            trees: vec![tree(
                "package p\n\nvar Bar = 1\nconst BarConst = 2\n\ntype Bar2 struct{ BarField int }\ntype BarAlias = Bar2\n\nfunc BarFunc() {\n\ttype BarLocal int\n\tBarVar := 1\n\t_ = BarVar\n}\n\nfunc (Bar2) BarMethod() {}\n",
            )],
            ..Package::default()
        };
        let mut out = Vec::new();

        SyntaxExtractor.extract(&package, &Query::new("bar"), &mut out);

        let found: Vec<(&str, SymbolKind)> = out.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            found,
            vec![
                ("Bar2", SymbolKind::Type),
                ("BarAlias", SymbolKind::Type),
                ("BarFunc", SymbolKind::Func),
                ("BarMethod", SymbolKind::Func),
            ]
        );
    }

    #[test]
    fn syntax_extractor_records_package_and_position() {
        let package = Package {
            trees: vec![tree("package widgets\n\nfunc  Spin() {}\n")],
            ..Package::default()
        };
        let mut out = Vec::new();

        SyntaxExtractor.extract(&package, &Query::new("spin"), &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].package, "widgets");
        assert_eq!(out[0].path, PathBuf::from("/src/p/a.go"));
        assert_eq!((out[0].line, out[0].character), (2, 6));
    }

    #[test]
    fn typed_extractor_classifies_and_filters() {
        let package = checked_package(
            "/src/p",
            vec![
                declaration("Foo", None, 1),
                declaration("Bar", Some(Category::TypeName), 2),
                declaration("Baz", Some(Category::Const), 3),
                declaration("barField", Some(Category::Field), 4),
            ],
        );
        let extractor = TypedExtractor::new([PathBuf::from("/src/p")]);
        let mut out = Vec::new();

        extractor.extract(&package, &Query::new("BA"), &mut out);

        let found: Vec<(&str, SymbolKind)> = out.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            found,
            vec![
                ("Bar", SymbolKind::Type),
                ("Baz", SymbolKind::Const),
                ("barField", SymbolKind::Var),
            ]
        );
    }

    #[test]
    fn typed_extractor_skips_non_local_packages() {
        let package = checked_package("/goroot/src/fmt", vec![declaration("Bar", None, 0)]);
        let extractor = TypedExtractor::new([PathBuf::from("/src/p")]);
        let mut out = Vec::new();

        extractor.extract(&package, &Query::new("bar"), &mut out);

        assert!(out.is_empty());
    }
}
