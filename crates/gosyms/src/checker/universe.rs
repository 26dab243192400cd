//! Predeclared identifiers and the `unsafe` pseudo package.

use std::sync::OnceLock;

use super::scope::{Object, ObjectKind, Scope};

const TYPES: &[&str] = &[
    "any",
    "bool",
    "byte",
    "comparable",
    "complex64",
    "complex128",
    "error",
    "float32",
    "float64",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "rune",
    "string",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
];

const CONSTS: &[&str] = &["true", "false", "iota"];

const BUILTINS: &[&str] = &[
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make", "max",
    "min", "new", "panic", "print", "println", "real", "recover",
];

const UNSAFE_BUILTINS: &[&str] = &[
    "Add",
    "Alignof",
    "Offsetof",
    "Sizeof",
    "Slice",
    "SliceData",
    "String",
    "StringData",
];

/// The universe scope enclosing every package.
pub fn universe() -> &'static Scope {
    static UNIVERSE: OnceLock<Scope> = OnceLock::new();
    UNIVERSE.get_or_init(|| {
        let mut scope = Scope::new();
        for name in TYPES {
            scope.insert(Object::predeclared(name, ObjectKind::TypeName));
        }
        for name in CONSTS {
            scope.insert(Object::predeclared(name, ObjectKind::Const));
        }
        for name in BUILTINS {
            scope.insert(Object::predeclared(name, ObjectKind::Builtin));
        }
        scope.insert(Object::predeclared("nil", ObjectKind::Nil));
        scope
    })
}

/// Package scope of `unsafe`.
#[must_use]
pub fn unsafe_scope() -> Scope {
    let mut scope = Scope::new();
    scope.insert(Object::predeclared("Pointer", ObjectKind::TypeName));
    for name in UNSAFE_BUILTINS {
        scope.insert(Object::predeclared(name, ObjectKind::Builtin));
    }
    scope
}
