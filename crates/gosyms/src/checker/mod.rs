//! Declaration-level type checker.
//!
//! Checks one package's file set as a unit and produces:
//!
//! - the package scope (what importers can look up),
//! - the declaration table (every package-level object, method, struct field
//!   and interface method, with its category and position),
//! - non-fatal diagnostics.
//!
//! Function bodies and initializer expressions are never analyzed; only the
//! type expressions that make up declarations are resolved. Imports are
//! resolved through an [`Importer`], which is how the resolver recurses into
//! dependencies.
//!
//! ## Error policy
//!
//! Only an import cycle aborts checking. A failed import becomes a diagnostic
//! at the import spec and the import name is bound to an unavailable package,
//! so selectors on it do not cascade into further diagnostics.

pub mod diagnostics;
pub mod scope;
pub mod universe;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, trace};
use tree_sitter::Node;

use crate::error::Result;
use crate::resolver::Package;
use crate::syntax::tree_sitter_utils::{named_children, node_position};
use crate::syntax::{ImportBinding, SyntaxTree, node_kinds};
use crate::types::Category;

pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use scope::{Object, ObjectKind, Scope, is_exported};

/// Resolves import paths to packages while checking.
pub trait Importer {
    /// Resolve `import_path` to its package.
    ///
    /// # Errors
    ///
    /// Any resolution failure. Only [`Error::Cycle`](crate::Error::Cycle)
    /// aborts the importing package's check.
    fn import(&mut self, import_path: &str) -> Result<Arc<Package>>;
}

/// One entry in a package's declaration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Declared identifier
    pub name: String,
    /// Category, `None` for functions, methods and interface methods
    pub category: Option<Category>,
    /// Declaring file
    pub path: PathBuf,
    /// Line of the identifier (0-indexed)
    pub line: usize,
    /// Column of the identifier (0-indexed)
    pub column: usize,
}

/// Output of checking one package.
#[derive(Debug, Clone, Default)]
pub struct CheckedPackage {
    /// Package clause name
    pub name: String,
    /// Package-level objects
    pub scope: Scope,
    /// Declaration table, ordered by file then position
    pub decls: Vec<Declaration>,
    /// Problems found while checking
    pub diagnostics: Vec<Diagnostic>,
}

/// Check the files of one package.
///
/// Diagnostics are both returned on the [`CheckedPackage`] and pushed to
/// `sink` as they are found.
///
/// # Errors
///
/// Returns [`Error::Cycle`](crate::Error::Cycle) if resolving an import
/// reports a cycle.
pub fn check(
    import_path: &str,
    trees: &[Arc<SyntaxTree>],
    importer: &mut dyn Importer,
    sink: &DiagnosticSink,
) -> Result<CheckedPackage> {
    let mut checker = Checker::new(sink);

    for (index, tree) in trees.iter().enumerate() {
        checker.collect_objects(index, tree);
    }
    for (index, tree) in trees.iter().enumerate() {
        let file = checker.resolve_imports(tree, importer)?;
        checker.check_file(FileCtx {
            index,
            tree,
            file: &file,
        });
    }

    let name = trees
        .first()
        .and_then(|t| t.package_name())
        .unwrap_or_default()
        .to_string();

    let mut decls = checker.decls;
    decls.sort_by_key(|(index, d)| (*index, d.line, d.column));

    debug!(
        import_path,
        package = %name,
        objects = checker.scope.len(),
        decls = decls.len(),
        diagnostics = checker.diagnostics.len(),
        "Checked package"
    );

    Ok(CheckedPackage {
        name,
        scope: checker.scope,
        decls: decls.into_iter().map(|(_, d)| d).collect(),
        diagnostics: checker.diagnostics,
    })
}

/// What an import name in a file refers to.
enum PkgRef {
    Package(Arc<Package>),
    /// The cgo pseudo package `"C"`; any selector is accepted.
    Fake,
    /// The import failed; selectors are not checked.
    Unavailable,
}

#[derive(Default)]
struct FileScope {
    imports: HashMap<String, PkgRef>,
    dot: HashMap<String, ObjectKind>,
    unavailable_dot: bool,
}

#[derive(Clone, Copy)]
struct FileCtx<'c> {
    index: usize,
    tree: &'c SyntaxTree,
    file: &'c FileScope,
}

type TypeParams = HashSet<String>;

enum Lookup {
    Object(ObjectKind),
    Package,
    Missing,
    /// Could come from an unavailable dot import.
    Unknown,
}

struct Checker<'s> {
    sink: &'s DiagnosticSink,
    scope: Scope,
    decls: Vec<(usize, Declaration)>,
    diagnostics: Vec<Diagnostic>,
    struct_fields: HashMap<String, HashSet<String>>,
    methods: HashSet<(String, String)>,
}

impl<'s> Checker<'s> {
    fn new(sink: &'s DiagnosticSink) -> Self {
        Self {
            sink,
            scope: Scope::new(),
            decls: Vec::new(),
            diagnostics: Vec::new(),
            struct_fields: HashMap::new(),
            methods: HashSet::new(),
        }
    }

    fn error_at(&mut self, tree: &SyntaxTree, line: usize, column: usize, message: String) {
        let diagnostic = Diagnostic {
            path: tree.path().to_path_buf(),
            line,
            column,
            message,
        };
        self.sink.push(diagnostic.clone());
        self.diagnostics.push(diagnostic);
    }

    fn error(&mut self, tree: &SyntaxTree, node: &Node<'_>, message: String) {
        let (line, column) = node_position(node);
        self.error_at(tree, line, column, message);
    }

    // ------------------------------------------------------------------
    // Package-level objects
    // ------------------------------------------------------------------

    fn collect_objects(&mut self, index: usize, tree: &SyntaxTree) {
        for decl in tree.top_level() {
            match decl.kind() {
                node_kinds::FUNCTION_DECLARATION => {
                    let Some(ident) = decl.child_by_field_name("name") else {
                        continue;
                    };
                    if tree.text(&ident) == Some("init") {
                        let has_params = decl
                            .child_by_field_name("parameters")
                            .is_some_and(|p| p.named_child_count() > 0);
                        if has_params || decl.child_by_field_name("result").is_some() {
                            self.error(
                                tree,
                                &ident,
                                "func init must have no arguments and no return values".to_string(),
                            );
                        }
                        self.record(index, tree, &ident, None);
                    } else if self.declare(tree, &ident, ObjectKind::Func) {
                        self.record(index, tree, &ident, None);
                    }
                }
                node_kinds::METHOD_DECLARATION => {
                    if let Some(ident) = decl.child_by_field_name("name") {
                        self.record(index, tree, &ident, None);
                    }
                }
                node_kinds::TYPE_DECLARATION => {
                    for spec in tree.specs(&decl, &[node_kinds::TYPE_SPEC, node_kinds::TYPE_ALIAS]) {
                        let Some(ident) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        if self.declare(tree, &ident, ObjectKind::TypeName) {
                            self.record(index, tree, &ident, Some(Category::TypeName));
                            self.remember_struct_fields(tree, &ident, &spec);
                        }
                    }
                }
                node_kinds::VAR_DECLARATION => {
                    self.collect_values(index, tree, &decl, node_kinds::VAR_SPEC, ObjectKind::Var);
                }
                node_kinds::CONST_DECLARATION => {
                    self.collect_values(index, tree, &decl, node_kinds::CONST_SPEC, ObjectKind::Const);
                }
                _ => {}
            }
        }
    }

    fn collect_values(
        &mut self,
        index: usize,
        tree: &SyntaxTree,
        decl: &Node<'_>,
        spec_kind: &str,
        kind: ObjectKind,
    ) {
        let category = if kind == ObjectKind::Const {
            Category::Const
        } else {
            Category::Var
        };
        for spec in tree.specs(decl, &[spec_kind]) {
            for ident in tree.field(&spec, "name") {
                if self.declare(tree, &ident, kind) {
                    self.record(index, tree, &ident, Some(category));
                }
            }
        }
    }

    /// Insert a package-level object. Returns `false` if nothing was declared.
    fn declare(&mut self, tree: &SyntaxTree, ident: &Node<'_>, kind: ObjectKind) -> bool {
        let Some(name) = tree.text(ident) else {
            return false;
        };
        if name == "_" {
            return false;
        }
        if name == "init" && kind != ObjectKind::Func {
            self.error(tree, ident, "cannot declare init - must be func".to_string());
            return false;
        }

        let (line, column) = node_position(ident);
        let object = Object {
            name: name.to_string(),
            kind,
            path: Some(tree.path().to_path_buf()),
            line,
            column,
        };
        let Some(existing) = self.scope.insert(object).cloned() else {
            return true;
        };

        let other = existing
            .path
            .map(|p| format!(" (other declaration at {}:{})", p.display(), existing.line + 1))
            .unwrap_or_default();
        self.error(tree, ident, format!("{name} redeclared in this block{other}"));
        false
    }

    fn record(
        &mut self,
        index: usize,
        tree: &SyntaxTree,
        ident: &Node<'_>,
        category: Option<Category>,
    ) {
        let Some(name) = tree.text(ident) else {
            return;
        };
        if name == "_" {
            return;
        }
        let (line, column) = node_position(ident);
        self.decls.push((
            index,
            Declaration {
                name: name.to_string(),
                category,
                path: tree.path().to_path_buf(),
                line,
                column,
            },
        ));
    }

    fn remember_struct_fields(&mut self, tree: &SyntaxTree, ident: &Node<'_>, spec: &Node<'_>) {
        let Some(ty) = spec.child_by_field_name("type") else {
            return;
        };
        if ty.kind() != node_kinds::STRUCT_TYPE {
            return;
        }
        let Some(type_name) = tree.text(ident) else {
            return;
        };

        let mut names = HashSet::new();
        for list in named_children(&ty) {
            if list.kind() != node_kinds::FIELD_DECLARATION_LIST {
                continue;
            }
            for field in named_children(&list) {
                if field.kind() != node_kinds::FIELD_DECLARATION {
                    continue;
                }
                let mut idents = tree.field(&field, "name");
                if idents.is_empty() {
                    idents.extend(field.child_by_field_name("type").and_then(|t| embedded_name(&t)));
                }
                names.extend(idents.iter().filter_map(|i| tree.text(i)).map(str::to_string));
            }
        }
        self.struct_fields.insert(type_name.to_string(), names);
    }

    // ------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------

    fn resolve_imports(
        &mut self,
        tree: &SyntaxTree,
        importer: &mut dyn Importer,
    ) -> Result<FileScope> {
        let mut file = FileScope::default();

        for spec in tree.imports() {
            let target = if spec.path == "C" {
                PkgRef::Fake
            } else {
                match importer.import(&spec.path) {
                    Ok(package) if package.is_empty() => {
                        self.error_at(
                            tree,
                            spec.line,
                            spec.column,
                            format!(
                                "could not import {} (no buildable Go source files in {})",
                                spec.path,
                                package.dir.display()
                            ),
                        );
                        PkgRef::Unavailable
                    }
                    Ok(package) => PkgRef::Package(package),
                    Err(e) if e.is_cycle() => return Err(e),
                    Err(e) => {
                        self.error_at(
                            tree,
                            spec.line,
                            spec.column,
                            format!("could not import {} ({e})", spec.path),
                        );
                        PkgRef::Unavailable
                    }
                }
            };

            let name = match &spec.binding {
                ImportBinding::Blank => continue,
                ImportBinding::Dot => {
                    match &target {
                        PkgRef::Package(package) => {
                            for object in package.scope.exported() {
                                file.dot.insert(object.name.clone(), object.kind);
                            }
                        }
                        PkgRef::Fake => {
                            self.error_at(tree, spec.line, spec.column, "cannot dot-import \"C\"".to_string());
                        }
                        PkgRef::Unavailable => file.unavailable_dot = true,
                    }
                    continue;
                }
                ImportBinding::Named(name) => name.clone(),
                ImportBinding::Default => match &target {
                    PkgRef::Package(package) => package.name.clone(),
                    PkgRef::Fake => "C".to_string(),
                    PkgRef::Unavailable => spec
                        .path
                        .rsplit('/')
                        .next()
                        .unwrap_or(spec.path.as_str())
                        .to_string(),
                },
            };

            if self.scope.lookup(&name).is_some() {
                self.error_at(
                    tree,
                    spec.line,
                    spec.column,
                    format!("{name} already declared through import of package {}", spec.path),
                );
            } else if file.imports.contains_key(&name) {
                self.error_at(tree, spec.line, spec.column, format!("{name} redeclared in this block"));
            }
            trace!(file = %tree.path().display(), name, import_path = %spec.path, "Bound import");
            file.imports.insert(name, target);
        }

        Ok(file)
    }

    // ------------------------------------------------------------------
    // Type expressions
    // ------------------------------------------------------------------

    fn check_file(&mut self, ctx: FileCtx<'_>) {
        let tree = ctx.tree;
        for decl in tree.top_level() {
            match decl.kind() {
                node_kinds::FUNCTION_DECLARATION => {
                    let params = self.type_params(
                        ctx,
                        decl.child_by_field_name("type_parameters"),
                        TypeParams::new(),
                    );
                    self.check_signature(ctx, &decl, &params);
                }
                node_kinds::METHOD_DECLARATION => self.check_method(ctx, &decl),
                node_kinds::TYPE_DECLARATION => {
                    for spec in tree.specs(&decl, &[node_kinds::TYPE_SPEC, node_kinds::TYPE_ALIAS]) {
                        let params = self.type_params(
                            ctx,
                            spec.child_by_field_name("type_parameters"),
                            TypeParams::new(),
                        );
                        if let Some(ty) = spec.child_by_field_name("type") {
                            self.check_type(ctx, &ty, &params);
                        }
                    }
                }
                node_kinds::VAR_DECLARATION | node_kinds::CONST_DECLARATION => {
                    let specs =
                        tree.specs(&decl, &[node_kinds::VAR_SPEC, node_kinds::CONST_SPEC]);
                    for spec in specs {
                        if let Some(ty) = spec.child_by_field_name("type") {
                            self.check_type(ctx, &ty, &TypeParams::new());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn type_params(
        &mut self,
        ctx: FileCtx<'_>,
        list: Option<Node<'_>>,
        mut params: TypeParams,
    ) -> TypeParams {
        let Some(list) = list else {
            return params;
        };
        let decls: Vec<Node<'_>> = named_children(&list)
            .into_iter()
            .filter(|n| n.kind() == node_kinds::TYPE_PARAMETER_DECLARATION)
            .collect();

        for decl in &decls {
            for ident in ctx.tree.field(decl, "name") {
                let Some(name) = ctx.tree.text(&ident) else {
                    continue;
                };
                if !params.insert(name.to_string()) && name != "_" {
                    self.error(ctx.tree, &ident, format!("{name} redeclared in this block"));
                }
            }
        }
        // Constraints may refer to any parameter of the list.
        for decl in &decls {
            if let Some(constraint) = decl.child_by_field_name("type") {
                self.check_type(ctx, &constraint, &params);
            }
        }
        params
    }

    fn check_signature(&mut self, ctx: FileCtx<'_>, node: &Node<'_>, params: &TypeParams) {
        if let Some(list) = node.child_by_field_name("parameters") {
            self.check_parameters(ctx, &list, params);
        }
        if let Some(result) = node.child_by_field_name("result") {
            if result.kind() == node_kinds::PARAMETER_LIST {
                self.check_parameters(ctx, &result, params);
            } else {
                self.check_type(ctx, &result, params);
            }
        }
    }

    fn check_parameters(&mut self, ctx: FileCtx<'_>, list: &Node<'_>, params: &TypeParams) {
        for param in named_children(list) {
            if matches!(
                param.kind(),
                node_kinds::PARAMETER_DECLARATION | node_kinds::VARIADIC_PARAMETER_DECLARATION
            ) {
                if let Some(ty) = param.child_by_field_name("type") {
                    self.check_type(ctx, &ty, params);
                }
            }
        }
    }

    fn check_method(&mut self, ctx: FileCtx<'_>, decl: &Node<'_>) {
        let receiver_type = decl
            .child_by_field_name("receiver")
            .and_then(|list| {
                named_children(&list)
                    .into_iter()
                    .find(|n| n.kind() == node_kinds::PARAMETER_DECLARATION)
            })
            .and_then(|param| param.child_by_field_name("type"));
        let Some(receiver_type) = receiver_type else {
            return;
        };

        let mut params = TypeParams::new();
        if let Some(base) = receiver_base(ctx.tree, receiver_type, &mut params) {
            self.check_receiver_base(ctx, &base, decl);
        }
        self.check_signature(ctx, decl, &params);
    }

    fn check_receiver_base(&mut self, ctx: FileCtx<'_>, base: &Node<'_>, decl: &Node<'_>) {
        let tree = ctx.tree;
        let base_text = tree.text(base).unwrap_or_default();

        if base.kind() != node_kinds::TYPE_IDENTIFIER {
            let message = if base.kind() == node_kinds::QUALIFIED_TYPE {
                format!("cannot define new methods on non-local type {base_text}")
            } else {
                format!("invalid receiver type {base_text}")
            };
            self.error(tree, base, message);
            return;
        }

        match self.scope.lookup(base_text).map(|o| o.kind) {
            Some(ObjectKind::TypeName) => {}
            Some(_) => {
                self.error(tree, base, format!("{base_text} is not a type"));
                return;
            }
            None if universe::universe().lookup(base_text).is_some() => {
                self.error(
                    tree,
                    base,
                    format!("cannot define new methods on non-local type {base_text}"),
                );
                return;
            }
            None => {
                self.error(tree, base, format!("undefined: {base_text}"));
                return;
            }
        }

        let Some(ident) = decl.child_by_field_name("name") else {
            return;
        };
        let Some(method) = tree.text(&ident) else {
            return;
        };
        if method == "_" {
            return;
        }
        if !self
            .methods
            .insert((base_text.to_string(), method.to_string()))
        {
            self.error(
                tree,
                &ident,
                format!("method {base_text}.{method} already declared"),
            );
        } else if self
            .struct_fields
            .get(base_text)
            .is_some_and(|fields| fields.contains(method))
        {
            self.error(
                tree,
                &ident,
                format!("field and method with the same name {method}"),
            );
        }
    }

    fn check_type(&mut self, ctx: FileCtx<'_>, node: &Node<'_>, params: &TypeParams) {
        match node.kind() {
            node_kinds::TYPE_IDENTIFIER => self.check_type_name(ctx, node, params),
            node_kinds::QUALIFIED_TYPE => self.check_qualified(ctx, node),
            node_kinds::STRUCT_TYPE => self.check_struct(ctx, node, params),
            node_kinds::INTERFACE_TYPE => self.check_interface(ctx, node, params),
            node_kinds::FUNCTION_TYPE => self.check_signature(ctx, node, params),
            node_kinds::ARRAY_TYPE | node_kinds::IMPLICIT_LENGTH_ARRAY_TYPE => {
                // The length is an expression, not a type.
                if let Some(element) = node.child_by_field_name("element") {
                    self.check_type(ctx, &element, params);
                }
            }
            _ => {
                for child in named_children(node) {
                    self.check_type(ctx, &child, params);
                }
            }
        }
    }

    fn lookup(&self, file: &FileScope, name: &str) -> Lookup {
        if file.imports.contains_key(name) {
            return Lookup::Package;
        }
        if let Some(kind) = file.dot.get(name) {
            return Lookup::Object(*kind);
        }
        if let Some(object) = self.scope.lookup(name) {
            return Lookup::Object(object.kind);
        }
        if let Some(object) = universe::universe().lookup(name) {
            return Lookup::Object(object.kind);
        }
        if file.unavailable_dot {
            Lookup::Unknown
        } else {
            Lookup::Missing
        }
    }

    fn check_type_name(&mut self, ctx: FileCtx<'_>, node: &Node<'_>, params: &TypeParams) {
        let Some(name) = ctx.tree.text(node) else {
            return;
        };
        if params.contains(name) {
            return;
        }
        let message = match self.lookup(ctx.file, name) {
            Lookup::Object(ObjectKind::TypeName) | Lookup::Unknown => return,
            Lookup::Object(_) => format!("{name} is not a type"),
            Lookup::Package => format!("use of package {name} without selector"),
            Lookup::Missing if name == "_" => "cannot use _ as value or type".to_string(),
            Lookup::Missing => format!("undefined: {name}"),
        };
        self.error(ctx.tree, node, message);
    }

    fn check_qualified(&mut self, ctx: FileCtx<'_>, node: &Node<'_>) {
        let tree = ctx.tree;
        let (Some(pkg_node), Some(name_node)) = (
            node.child_by_field_name("package"),
            node.child_by_field_name("name"),
        ) else {
            return;
        };
        let (Some(pkg), Some(name)) = (tree.text(&pkg_node), tree.text(&name_node)) else {
            return;
        };

        match ctx.file.imports.get(pkg) {
            Some(PkgRef::Fake | PkgRef::Unavailable) => {}
            Some(PkgRef::Package(package)) => {
                let message = if !is_exported(name) {
                    format!("name {name} not exported by package {pkg}")
                } else {
                    match package.scope.lookup(name).map(|o| o.kind) {
                        Some(ObjectKind::TypeName) => return,
                        Some(_) => format!("{pkg}.{name} is not a type"),
                        None => format!("undefined: {pkg}.{name}"),
                    }
                };
                self.error(tree, &name_node, message);
            }
            None => match self.lookup(ctx.file, pkg) {
                Lookup::Unknown | Lookup::Package => {}
                Lookup::Missing => self.error(tree, &pkg_node, format!("undefined: {pkg}")),
                Lookup::Object(_) => {
                    self.error(tree, &pkg_node, format!("{pkg} is not a package"));
                }
            },
        }
    }

    fn check_struct(&mut self, ctx: FileCtx<'_>, node: &Node<'_>, params: &TypeParams) {
        let tree = ctx.tree;
        let mut seen = HashSet::new();

        for list in named_children(node) {
            if list.kind() != node_kinds::FIELD_DECLARATION_LIST {
                continue;
            }
            for field in named_children(&list) {
                if field.kind() != node_kinds::FIELD_DECLARATION {
                    continue;
                }
                let ty = field.child_by_field_name("type");
                let mut idents = tree.field(&field, "name");
                if idents.is_empty() {
                    idents.extend(ty.and_then(|t| embedded_name(&t)));
                }

                for ident in &idents {
                    let Some(name) = tree.text(ident) else {
                        continue;
                    };
                    if name != "_" && !seen.insert(name.to_string()) {
                        self.error(tree, ident, format!("{name} redeclared"));
                    } else {
                        self.record(ctx.index, tree, ident, Some(Category::Field));
                    }
                }
                if let Some(ty) = ty {
                    self.check_type(ctx, &ty, params);
                }
            }
        }
    }

    fn check_interface(&mut self, ctx: FileCtx<'_>, node: &Node<'_>, params: &TypeParams) {
        let tree = ctx.tree;
        let mut seen = HashSet::new();

        for child in named_children(node) {
            match child.kind() {
                node_kinds::METHOD_ELEM | node_kinds::METHOD_SPEC => {
                    if let Some(ident) = child.child_by_field_name("name") {
                        let name = tree.text(&ident).unwrap_or_default();
                        if seen.insert(name.to_string()) {
                            self.record(ctx.index, tree, &ident, None);
                        } else {
                            self.error(tree, &ident, format!("duplicate method {name}"));
                        }
                    }
                    self.check_signature(ctx, &child, params);
                }
                _ => self.check_type(ctx, &child, params),
            }
        }
    }
}

/// Base type name of a method receiver.
///
/// Type arguments on the receiver (`List[T]`) declare the method's type
/// parameters; they are added to `params`.
fn receiver_base<'t>(
    tree: &SyntaxTree,
    node: Node<'t>,
    params: &mut TypeParams,
) -> Option<Node<'t>> {
    match node.kind() {
        node_kinds::POINTER_TYPE | node_kinds::PARENTHESIZED_TYPE => {
            receiver_base(tree, node.named_child(0)?, params)
        }
        node_kinds::GENERIC_TYPE => {
            if let Some(args) = node.child_by_field_name("type_arguments") {
                for arg in named_children(&args) {
                    let ident = if arg.kind() == node_kinds::TYPE_ELEM {
                        arg.named_child(0)
                    } else {
                        Some(arg)
                    };
                    if let Some(name) = ident.and_then(|i| tree.text(&i)) {
                        params.insert(name.to_string());
                    }
                }
            }
            receiver_base(tree, node.child_by_field_name("type")?, params)
        }
        _ => Some(node),
    }
}

/// Identifier naming an embedded field (`T`, `*T`, `p.T`, `T[int]`).
fn embedded_name<'t>(ty: &Node<'t>) -> Option<Node<'t>> {
    match ty.kind() {
        node_kinds::TYPE_IDENTIFIER => Some(*ty),
        node_kinds::QUALIFIED_TYPE => ty.child_by_field_name("name"),
        node_kinds::GENERIC_TYPE => embedded_name(&ty.child_by_field_name("type")?),
        node_kinds::POINTER_TYPE => embedded_name(&ty.named_child(0)?),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::Path;

    /// Importer over a fixed set of packages.
    #[derive(Default)]
    struct MapImporter {
        packages: HashMap<String, Arc<Package>>,
        cycle_on: Option<String>,
    }

    impl MapImporter {
        fn with(mut self, import_path: &str, name: &str, exports: &[(&str, ObjectKind)]) -> Self {
            let mut scope = Scope::new();
            for (export, kind) in exports {
                scope.insert(Object::predeclared(export, *kind));
            }
            self.packages.insert(
                import_path.to_string(),
                Arc::new(Package::from_scope(import_path, name, scope)),
            );
            self
        }
    }

    impl Importer for MapImporter {
        fn import(&mut self, import_path: &str) -> Result<Arc<Package>> {
            if self.cycle_on.as_deref() == Some(import_path) {
                return Err(Error::Cycle {
                    import_path: import_path.to_string(),
                    stack: vec![import_path.to_string()],
                });
            }
            self.packages
                .get(import_path)
                .cloned()
                .ok_or_else(|| Error::NotFound {
                    import_path: import_path.to_string(),
                    searched: Vec::new(),
                })
        }
    }

    fn tree(name: &str, source: &str) -> Arc<SyntaxTree> {
        Arc::new(
            SyntaxTree::parse(&Path::new("/src/p").join(name), source.as_bytes().to_vec())
                .expect("test source should parse"),
        )
    }

    fn check_source(source: &str) -> CheckedPackage {
        check_with(&mut MapImporter::default(), &[tree("a.go", source)])
    }

    fn check_with(importer: &mut MapImporter, trees: &[Arc<SyntaxTree>]) -> CheckedPackage {
        check("example.com/p", trees, importer, &DiagnosticSink::new()).expect("check should succeed")
    }

    fn messages(checked: &CheckedPackage) -> Vec<String> {
        checked.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn classifies_declarations() {
        let checked = check_source(
            "package p\n\ntype T struct {\n\tField int\n}\n\nvar V = 1\n\nconst C = 2\n\nfunc F() {}\n\nfunc (T) M() {}\n",
        );

        let table: Vec<(&str, Option<Category>)> = checked
            .decls
            .iter()
            .map(|d| (d.name.as_str(), d.category))
            .collect();
        assert_eq!(
            table,
            vec![
                ("T", Some(Category::TypeName)),
                ("Field", Some(Category::Field)),
                ("V", Some(Category::Var)),
                ("C", Some(Category::Const)),
                ("F", None),
                ("M", None),
            ]
        );
        assert!(checked.diagnostics.is_empty(), "{:?}", messages(&checked));
    }

    #[test]
    fn declarations_record_identifier_positions() {
        let checked = check_source("package p\n\nfunc   Add(a, b int) int {\n\treturn a + b\n}\n");

        assert_eq!(
            checked.decls,
            vec![Declaration {
                name: "Add".to_string(),
                category: None,
                path: PathBuf::from("/src/p/a.go"),
                line: 2,
                column: 7,
            }]
        );
    }

    #[test]
    fn methods_and_init_stay_out_of_package_scope() {
        let checked = check_source(
            "package p\n\ntype T int\n\nfunc init() {}\nfunc init() {}\n\nfunc (t T) String() string { return \"\" }\n",
        );

        assert!(checked.scope.lookup("init").is_none());
        assert!(checked.scope.lookup("String").is_none());
        assert_eq!(checked.decls.iter().filter(|d| d.name == "init").count(), 2);
        assert!(checked.diagnostics.is_empty());
    }

    #[test]
    fn function_bodies_are_not_analyzed() {
        let checked = check_source(
            "package p\n\nfunc F() {\n\ttype Local struct{}\n\tvar x Undefined\n\t_ = x\n}\n",
        );

        assert!(checked.decls.iter().all(|d| d.name != "Local"));
        assert!(checked.diagnostics.is_empty());
    }

    #[test]
    fn reports_redeclaration_across_files() {
        let checked = check_with(
            &mut MapImporter::default(),
            &[
                tree("a.go", "package p\n\nvar X int\n"),
                tree("b.go", "package p\n\nfunc X() {}\n"),
            ],
        );

        assert_eq!(checked.diagnostics.len(), 1);
        assert!(checked.diagnostics[0].message.starts_with("X redeclared in this block"));
        assert_eq!(checked.diagnostics[0].path, PathBuf::from("/src/p/b.go"));
        assert_eq!(checked.decls.iter().filter(|d| d.name == "X").count(), 1);
    }

    #[test]
    fn reports_undefined_and_not_a_type() {
        let checked = check_source("package p\n\nvar v int\n\ntype A Missing\ntype B v\n");

        assert_eq!(
            messages(&checked),
            vec!["undefined: Missing".to_string(), "v is not a type".to_string()]
        );
    }

    #[test]
    fn resolves_imported_types_and_reports_bad_selectors() {
        let mut importer = MapImporter::default().with(
            "example.com/dep",
            "dep",
            &[("Thing", ObjectKind::TypeName), ("Value", ObjectKind::Var)],
        );
        let checked = check_with(
            &mut importer,
            &[tree(
                "a.go",
                "package p\n\nimport \"example.com/dep\"\n\ntype A dep.Thing\ntype B dep.Value\ntype C dep.Other\ntype D dep.hidden\n",
            )],
        );

        assert_eq!(
            messages(&checked),
            vec![
                "dep.Value is not a type".to_string(),
                "undefined: dep.Other".to_string(),
                "name hidden not exported by package dep".to_string(),
            ]
        );
    }

    #[test]
    fn failed_import_is_a_diagnostic_and_silences_selectors() {
        let checked = check_source(
            "package p\n\nimport \"example.com/missing\"\n\ntype A missing.Thing\n",
        );

        let messages = messages(&checked);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("could not import example.com/missing"));
        assert_eq!(checked.diagnostics[0].line, 2);
    }

    #[test]
    fn cycle_from_import_aborts_the_check() {
        let mut importer = MapImporter {
            cycle_on: Some("example.com/a".to_string()),
            ..MapImporter::default()
        };
        let trees = [tree("a.go", "package p\n\nimport \"example.com/a\"\n")];

        let err = check("example.com/p", &trees, &mut importer, &DiagnosticSink::new()).unwrap_err();

        assert!(err.is_cycle());
    }

    #[test]
    fn fake_c_import_accepts_any_selector() {
        let checked = check_source("package p\n\nimport \"C\"\n\ntype Handle C.struct_handle\n");

        assert!(checked.diagnostics.is_empty(), "{:?}", messages(&checked));
    }

    #[test]
    fn dot_import_brings_exported_names_into_file_scope() {
        let mut importer =
            MapImporter::default().with("example.com/dep", "dep", &[("Thing", ObjectKind::TypeName)]);
        let checked = check_with(
            &mut importer,
            &[tree("a.go", "package p\n\nimport . \"example.com/dep\"\n\ntype A Thing\n")],
        );

        assert!(checked.diagnostics.is_empty(), "{:?}", messages(&checked));
    }

    #[test]
    fn renamed_and_blank_imports() {
        let mut importer = MapImporter::default()
            .with("example.com/dep", "dep", &[("Thing", ObjectKind::TypeName)])
            .with("example.com/side", "side", &[("Register", ObjectKind::Func)]);
        let checked = check_with(
            &mut importer,
            &[tree(
                "a.go",
                "package p\n\nimport (\n\td \"example.com/dep\"\n\t_ \"example.com/side\"\n)\n\ntype A d.Thing\ntype B dep.Thing\n",
            )],
        );

        assert_eq!(messages(&checked), vec!["undefined: dep".to_string()]);
    }

    #[test]
    fn generic_type_parameters_are_in_scope() {
        let checked = check_source(
            "package p\n\ntype List[T any] struct {\n\titems []T\n}\n\nfunc Map[K comparable, V any](m map[K]V) []V { return nil }\n\nfunc (l *List[T]) Push(v T) {}\n",
        );

        assert!(checked.diagnostics.is_empty(), "{:?}", messages(&checked));
    }

    #[test]
    fn duplicate_struct_fields_and_interface_methods() {
        let checked = check_source(
            "package p\n\ntype S struct {\n\tA int\n\tA string\n}\n\ntype I interface {\n\tM()\n\tM()\n}\n",
        );

        assert_eq!(
            messages(&checked),
            vec!["A redeclared".to_string(), "duplicate method M".to_string()]
        );
    }

    #[test]
    fn method_receiver_checks() {
        let checked = check_source(
            "package p\n\ntype T struct {\n\tName string\n}\n\nfunc (T) M() {}\nfunc (T) M() {}\nfunc (T) Name() {}\nfunc (int) X() {}\nfunc (Missing) Y() {}\n",
        );

        assert_eq!(
            messages(&checked),
            vec![
                "method T.M already declared".to_string(),
                "field and method with the same name Name".to_string(),
                "cannot define new methods on non-local type int".to_string(),
                "undefined: Missing".to_string(),
            ]
        );
    }

    #[test]
    fn diagnostics_reach_the_sink() {
        let sink = DiagnosticSink::new();
        let trees = [tree("a.go", "package p\n\ntype A Missing\n")];

        check("example.com/p", &trees, &mut MapImporter::default(), &sink).unwrap();

        assert_eq!(sink.len(), 1);
    }
}
