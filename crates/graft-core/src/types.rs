//! Core types for the merge engine.
//!
//! Only a small, closed set of node shapes matters to reconciliation:
//! the program root, import declarations, `const` declarations with their
//! declarators and identifiers. Everything else is kept as opaque source
//! text and is never interpreted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable index of a node inside one [`SyntaxTree`](crate::tree::SyntaxTree) arena.
///
/// Ids are only meaningful for the tree that allocated them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Source dialect handed to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Module syntax with JSX.
    JavaScript,
    /// Typed superset without JSX; supports decorators.
    TypeScript,
    /// Typed superset with JSX and decorators.
    #[default]
    Tsx,
}

impl Dialect {
    /// Infer the dialect from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "js" | "jsx" | "mjs" | "cjs" => Some(Dialect::JavaScript),
            "ts" | "mts" | "cts" => Some(Dialect::TypeScript),
            "tsx" => Some(Dialect::Tsx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::JavaScript => "javascript",
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single import specifier binds its local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecifierKind {
    /// `import x from 'm'`
    Default,
    /// `import { x } from 'm'`
    Named,
    /// `import * as x from 'm'`
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSpecifier {
    pub kind: SpecifierKind,
    /// Exported name on the module side. Absent for default and namespace.
    pub imported: Option<String>,
    pub local: String,
    /// Inline `type` modifier: `import { type X } from 'm'`.
    pub type_only: bool,
}

impl ImportSpecifier {
    pub fn default(local: impl Into<String>) -> Self {
        Self {
            kind: SpecifierKind::Default,
            imported: None,
            local: local.into(),
            type_only: false,
        }
    }

    pub fn namespace(local: impl Into<String>) -> Self {
        Self {
            kind: SpecifierKind::Namespace,
            imported: None,
            local: local.into(),
            type_only: false,
        }
    }

    pub fn named(imported: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            kind: SpecifierKind::Named,
            imported: Some(imported.into()),
            local: local.into(),
            type_only: false,
        }
    }

    /// Specifier identity is the (imported, local) pair.
    pub fn same_binding(&self, other: &ImportSpecifier) -> bool {
        self.imported == other.imported && self.local == other.local
    }

    fn named_source(&self) -> String {
        let prefix = if self.type_only { "type " } else { "" };
        match &self.imported {
            Some(imported) if imported != &self.local => {
                format!("{prefix}{imported} as {}", self.local)
            }
            _ => format!("{prefix}{}", self.local),
        }
    }
}

/// A top-level `import ... from '...'` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDeclaration {
    pub module_path: String,
    pub specifiers: Vec<ImportSpecifier>,
    /// `import type ...` (TypeScript).
    pub type_only: bool,
    /// Quote character used for the module path when reprinting.
    #[serde(skip)]
    pub quote: char,
    /// Raw import attributes clause, e.g. `with { type: 'json' }`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
}

impl ImportDeclaration {
    pub fn new(module_path: impl Into<String>, specifiers: Vec<ImportSpecifier>) -> Self {
        Self {
            module_path: module_path.into(),
            specifiers,
            type_only: false,
            quote: '\'',
            attributes: None,
        }
    }

    pub fn first_kind(&self) -> Option<SpecifierKind> {
        self.specifiers.first().map(|s| s.kind)
    }

    /// Two declarations describe the same import group when they share the
    /// module path, the kind of their first specifier and the type-only marker.
    pub fn same_group(&self, other: &ImportDeclaration) -> bool {
        self.module_path == other.module_path
            && self.first_kind() == other.first_kind()
            && self.type_only == other.type_only
    }

    pub fn has_specifier(&self, spec: &ImportSpecifier) -> bool {
        self.specifiers.iter().any(|s| s.same_binding(spec))
    }

    /// Whether the specifiers form a clause JavaScript accepts: at most one
    /// default, and either one namespace import or named imports, not both.
    pub fn is_well_formed(&self) -> bool {
        let count = |kind| self.specifiers.iter().filter(|s| s.kind == kind).count();
        let namespaces = count(SpecifierKind::Namespace);
        count(SpecifierKind::Default) <= 1
            && namespaces <= 1
            && (namespaces == 0 || count(SpecifierKind::Named) == 0)
    }

    /// Print the declaration in a single canonical line.
    pub fn to_source(&self) -> String {
        let mut out = String::from("import ");
        if self.type_only {
            out.push_str("type ");
        }

        let mut clause: Vec<String> = Vec::new();
        for spec in &self.specifiers {
            if spec.kind == SpecifierKind::Default {
                clause.push(spec.local.clone());
            }
        }
        for spec in &self.specifiers {
            if spec.kind == SpecifierKind::Namespace {
                clause.push(format!("* as {}", spec.local));
            }
        }
        let named: Vec<String> = self
            .specifiers
            .iter()
            .filter(|s| s.kind == SpecifierKind::Named)
            .map(ImportSpecifier::named_source)
            .collect();
        if !named.is_empty() {
            clause.push(format!("{{ {} }}", named.join(", ")));
        }

        if !clause.is_empty() {
            out.push_str(&clause.join(", "));
            out.push_str(" from ");
        }
        out.push(self.quote);
        out.push_str(&self.module_path);
        out.push(self.quote);
        if let Some(attributes) = &self.attributes {
            out.push(' ');
            out.push_str(attributes);
        }
        out.push(';');
        out
    }
}

/// What an opaque node stands for. [`OpaqueRole::DefaultExport`] locates the
/// insertion anchor for new definitions; [`OpaqueRole::Prologue`] marks the
/// leading hashbang and directives that must stay first in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueRole {
    Statement,
    /// `#!...` line or a `'use strict'`-style directive at the top.
    Prologue,
    DefaultExport,
    Expression,
    Pattern,
}

/// The closed set of node shapes the engine knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Program,
    ImportDeclaration(ImportDeclaration),
    /// A `const` statement. Children are its declarators.
    VariableDeclaration,
    /// Children are `[binding, initializer?]`.
    VariableDeclarator {
        /// TypeScript annotation as written, including the colon.
        annotation: Option<String>,
    },
    Identifier(String),
    Opaque { role: OpaqueRole, text: String },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program => "program",
            NodeKind::ImportDeclaration(_) => "import_declaration",
            NodeKind::VariableDeclaration => "variable_declaration",
            NodeKind::VariableDeclarator { .. } => "variable_declarator",
            NodeKind::Identifier(_) => "identifier",
            NodeKind::Opaque { .. } => "opaque",
        }
    }

    pub fn is_default_export(&self) -> bool {
        matches!(
            self,
            NodeKind::Opaque {
                role: OpaqueRole::DefaultExport,
                ..
            }
        )
    }

    pub fn is_prologue(&self) -> bool {
        matches!(
            self,
            NodeKind::Opaque {
                role: OpaqueRole::Prologue,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_extension() {
        assert_eq!(Dialect::from_extension("tsx"), Some(Dialect::Tsx));
        assert_eq!(Dialect::from_extension("mjs"), Some(Dialect::JavaScript));
        assert_eq!(Dialect::from_extension("ts"), Some(Dialect::TypeScript));
        assert_eq!(Dialect::from_extension("py"), None);
    }

    #[test]
    fn test_import_to_source_groups_specifiers() {
        let decl = ImportDeclaration::new(
            "react",
            vec![
                ImportSpecifier::default("React"),
                ImportSpecifier::named("useState", "useState"),
                ImportSpecifier::named("useEffect", "effect"),
            ],
        );
        assert_eq!(
            decl.to_source(),
            "import React, { useState, useEffect as effect } from 'react';"
        );
    }

    #[test]
    fn test_well_formed_clauses() {
        let ok = ImportDeclaration::new(
            "m",
            vec![ImportSpecifier::default("A"), ImportSpecifier::namespace("ns")],
        );
        assert!(ok.is_well_formed());

        let two_defaults = ImportDeclaration::new(
            "m",
            vec![ImportSpecifier::default("A"), ImportSpecifier::default("B")],
        );
        assert!(!two_defaults.is_well_formed());

        let mixed = ImportDeclaration::new(
            "m",
            vec![ImportSpecifier::namespace("ns"), ImportSpecifier::named("a", "a")],
        );
        assert!(!mixed.is_well_formed());
    }

    #[test]
    fn test_side_effect_import() {
        let decl = ImportDeclaration::new("./polyfill", vec![]);
        assert_eq!(decl.to_source(), "import './polyfill';");
        assert_eq!(decl.first_kind(), None);
    }

    #[test]
    fn test_same_group_distinguishes_namespace_from_named() {
        let ns = ImportDeclaration::new("m", vec![ImportSpecifier::namespace("m")]);
        let named = ImportDeclaration::new("m", vec![ImportSpecifier::named("a", "a")]);
        let named_b = ImportDeclaration::new("m", vec![ImportSpecifier::named("b", "b")]);
        assert!(!ns.same_group(&named));
        assert!(named.same_group(&named_b));
    }

    #[test]
    fn test_specifier_identity_uses_imported_and_local() {
        let a = ImportSpecifier::named("a", "a");
        let aliased = ImportSpecifier::named("a", "b");
        assert!(a.same_binding(&ImportSpecifier::named("a", "a")));
        assert!(!a.same_binding(&aliased));
    }
}
