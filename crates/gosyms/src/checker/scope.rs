//! Named objects and the scopes that hold them.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// What a named object denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Named type, alias, or predeclared type
    TypeName,
    /// Variable
    Var,
    /// Constant
    Const,
    /// Function
    Func,
    /// Predeclared function such as `len`
    Builtin,
    /// The predeclared `nil`
    Nil,
}

/// A named entity in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// Identifier
    pub name: String,
    /// What it denotes
    pub kind: ObjectKind,
    /// Declaring file, `None` for predeclared objects
    pub path: Option<PathBuf>,
    /// Line of the identifier (0-indexed)
    pub line: usize,
    /// Column of the identifier (0-indexed)
    pub column: usize,
}

impl Object {
    /// A predeclared object with no source position.
    #[must_use]
    pub fn predeclared(name: &str, kind: ObjectKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            path: None,
            line: 0,
            column: 0,
        }
    }

    /// Returns `true` if the object is visible to importers.
    #[must_use]
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

/// Returns `true` if `name` starts with an upper-case letter.
#[must_use]
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Name to object mapping for one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    objects: BTreeMap<String, Object>,
}

impl Scope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `object` unless its name is taken.
    ///
    /// Returns the existing object on conflict, leaving the scope unchanged.
    pub fn insert(&mut self, object: Object) -> Option<&Object> {
        use std::collections::btree_map::Entry;
        match self.objects.entry(object.name.clone()) {
            Entry::Occupied(existing) => Some(existing.into_mut()),
            Entry::Vacant(slot) => {
                slot.insert(object);
                None
            }
        }
    }

    /// Object named `name`, if declared here.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    /// Objects visible to importers, in name order.
    pub fn exported(&self) -> impl Iterator<Item = &Object> {
        self.objects.values().filter(|o| o.is_exported())
    }

    /// All objects, in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_conflicts() {
        let mut scope = Scope::new();

        assert!(scope.insert(Object::predeclared("A", ObjectKind::Var)).is_none());
        let existing = scope
            .insert(Object::predeclared("A", ObjectKind::Const))
            .cloned();

        assert_eq!(existing.map(|o| o.kind), Some(ObjectKind::Var));
        assert_eq!(scope.lookup("A").map(|o| o.kind), Some(ObjectKind::Var));
    }

    #[test]
    fn exported_filters_lower_case_names() {
        let mut scope = Scope::new();
        scope.insert(Object::predeclared("Public", ObjectKind::Func));
        scope.insert(Object::predeclared("private", ObjectKind::Func));

        let names: Vec<&str> = scope.exported().map(|o| o.name.as_str()).collect();

        assert_eq!(names, vec!["Public"]);
    }

    #[test]
    fn exported_names_need_upper_case_first_letter() {
        assert!(is_exported("Foo"));
        assert!(is_exported("Ñame"));
        assert!(!is_exported("foo"));
        assert!(!is_exported("_Foo"));
        assert!(!is_exported(""));
    }
}
