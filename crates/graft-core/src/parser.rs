//! Tree-sitter parser integration.
//!
//! Source text is parsed with the JavaScript, TypeScript or TSX grammar and
//! lowered into the arena [`SyntaxTree`]. Only the program's direct children
//! are inspected: import statements and `const` declarations become
//! structured nodes, every other statement is kept as opaque text. Top-level
//! comments are attached to the following statement (or to the previous one
//! when they share its last line).

use tree_sitter::Node;

use crate::error::SyntaxError;
use crate::tree::SyntaxTree;
use crate::types::{
    Dialect, ImportDeclaration, ImportSpecifier, NodeId, NodeKind, OpaqueRole, SpecifierKind,
};

/// Parse source text into a lowered arena tree.
pub fn parse(source: &str, dialect: Dialect) -> Result<SyntaxTree, SyntaxError> {
    let ts_tree = parse_ts(source, dialect)?;
    let mut lowering = Lowering {
        source,
        tree: SyntaxTree::new(),
        in_prologue: true,
    };
    lowering.lower_program(&ts_tree.root_node());
    Ok(lowering.tree)
}

/// Parse with tree-sitter and reject any tree containing error or missing nodes.
pub(crate) fn parse_ts(source: &str, dialect: Dialect) -> Result<tree_sitter::Tree, SyntaxError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&get_tree_sitter_language(dialect))
        .map_err(|e| SyntaxError::Language {
            dialect: dialect.to_string(),
            message: e.to_string(),
        })?;

    let tree = parser.parse(source, None).ok_or(SyntaxError::NoTree)?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(locate_error(&root, source));
    }
    Ok(tree)
}

fn get_tree_sitter_language(dialect: Dialect) -> tree_sitter::Language {
    match dialect {
        Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    }
}

/// Find the first error or missing node in document order.
fn locate_error(root: &Node, source: &str) -> SyntaxError {
    let offender = first_error(root).unwrap_or(*root);
    let position = offender.start_position();
    let snippet = if offender.is_missing() {
        format!("missing {}", offender.kind())
    } else {
        node_text(&offender, source).chars().take(40).collect()
    };
    SyntaxError::Invalid {
        line: position.row + 1,
        column: position.column + 1,
        snippet,
    }
}

fn first_error<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(*node);
    }
    if !node.has_error() {
        return None;
    }
    let children: Vec<Node<'t>> = node.children(&mut node.walk()).collect();
    children.iter().find_map(first_error)
}

fn node_text<'s>(node: &Node, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

struct Lowering<'s> {
    source: &'s str,
    tree: SyntaxTree,
    /// No statement other than a hashbang or directive seen yet.
    in_prologue: bool,
}

impl<'s> Lowering<'s> {
    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.source)
    }

    fn lower_program(&mut self, root: &Node) {
        let program = self.tree.root();
        let children: Vec<Node> = root.children(&mut root.walk()).collect();

        let mut pending: Vec<String> = Vec::new();
        let mut pending_blank = false;
        let mut prev_end_row: Option<usize> = None;
        let mut last_statement: Option<(NodeId, usize)> = None;

        for child in &children {
            let start_row = child.start_position().row;
            let end_row = child.end_position().row;
            let blank_before = prev_end_row.is_some_and(|row| start_row > row + 1);

            if child.kind() == "comment" {
                let text = self.text(child).to_string();
                let same_line = matches!(last_statement, Some((_, row)) if row == start_row);
                match last_statement {
                    Some((stmt, _)) if same_line && pending.is_empty() => {
                        if let Ok(data) = self.tree.get_mut(stmt) {
                            match &mut data.trailing_comment {
                                Some(existing) => {
                                    existing.push(' ');
                                    existing.push_str(&text);
                                }
                                None => data.trailing_comment = Some(text),
                            }
                        }
                    }
                    _ => {
                        if pending.is_empty() {
                            pending_blank = blank_before;
                        }
                        pending.push(text);
                    }
                }
                prev_end_row = Some(end_row);
                continue;
            }

            let stmt = self.lower_statement(child);
            if let Ok(data) = self.tree.get_mut(stmt) {
                data.blank_line_before = if pending.is_empty() {
                    blank_before
                } else {
                    pending_blank
                };
                data.leading_comments = std::mem::take(&mut pending);
            }
            // The program root always accepts statements.
            let _ = self.tree.push_child(program, stmt);
            last_statement = Some((stmt, end_row));
            prev_end_row = Some(end_row);
        }

        self.tree.dangling_comments = pending;
    }

    fn lower_statement(&mut self, node: &Node) -> NodeId {
        if self.in_prologue && self.is_prologue(node) {
            let id = self.opaque(node, OpaqueRole::Prologue);
            self.tree.set_raw(id, self.text(node).to_string());
            return id;
        }
        self.in_prologue = false;

        let id = match node.kind() {
            "import_statement" => match self.lower_import(node) {
                Some(decl) => self.tree.alloc(NodeKind::ImportDeclaration(decl)),
                None => self.opaque(node, OpaqueRole::Statement),
            },
            "lexical_declaration" if self.is_const(node) => self.lower_const(node),
            "export_statement" => {
                let children: Vec<Node> = node.children(&mut node.walk()).collect();
                let role = if children.iter().any(|c| c.kind() == "default") {
                    OpaqueRole::DefaultExport
                } else {
                    OpaqueRole::Statement
                };
                self.opaque(node, role)
            }
            _ => self.opaque(node, OpaqueRole::Statement),
        };
        self.tree.set_raw(id, self.text(node).to_string());
        id
    }

    fn opaque(&mut self, node: &Node, role: OpaqueRole) -> NodeId {
        self.tree.alloc(NodeKind::Opaque {
            role,
            text: self.text(node).to_string(),
        })
    }

    /// `#!` line, or an expression statement made of a single string literal.
    fn is_prologue(&self, node: &Node) -> bool {
        match node.kind() {
            "hash_bang_line" => true,
            "expression_statement" => {
                let named: Vec<Node> = node.named_children(&mut node.walk()).collect();
                matches!(named.as_slice(), [only] if only.kind() == "string")
            }
            _ => false,
        }
    }

    fn is_const(&self, node: &Node) -> bool {
        node.child_by_field_name("kind")
            .or_else(|| node.children(&mut node.walk()).next())
            .is_some_and(|k| k.kind() == "const")
    }

    /// Lower `import ... from '...'`. Returns `None` for shapes the engine does
    /// not reconcile (`import x = require(...)`, `import typeof`).
    fn lower_import(&self, node: &Node) -> Option<ImportDeclaration> {
        let source_node = node.child_by_field_name("source")?;
        let quoted = self.text(&source_node);
        let quote = quoted.chars().next().unwrap_or('\'');
        let module_path = quoted
            .get(1..quoted.len().saturating_sub(1))
            .unwrap_or_default();

        let mut decl = ImportDeclaration::new(module_path, Vec::new());
        decl.quote = quote;

        let children: Vec<Node> = node.children(&mut node.walk()).collect();
        for child in &children {
            match child.kind() {
                "type" if !child.is_named() => decl.type_only = true,
                "typeof" if !child.is_named() => return None,
                "import_require_clause" => return None,
                "import_clause" => self.lower_import_clause(child, &mut decl.specifiers),
                "import_attribute" => decl.attributes = Some(self.text(child).to_string()),
                _ => {}
            }
        }
        Some(decl)
    }

    fn lower_import_clause(&self, clause: &Node, out: &mut Vec<ImportSpecifier>) {
        let children: Vec<Node> = clause.named_children(&mut clause.walk()).collect();
        for child in &children {
            match child.kind() {
                "identifier" => out.push(ImportSpecifier::default(self.text(child))),
                "namespace_import" => {
                    let locals: Vec<Node> = child.named_children(&mut child.walk()).collect();
                    if let Some(local) = locals.iter().find(|n| n.kind() == "identifier") {
                        out.push(ImportSpecifier::namespace(self.text(local)));
                    }
                }
                "named_imports" => {
                    let specs: Vec<Node> = child.named_children(&mut child.walk()).collect();
                    for spec in specs.iter().filter(|n| n.kind() == "import_specifier") {
                        if let Some(specifier) = self.lower_import_specifier(spec) {
                            out.push(specifier);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn lower_import_specifier(&self, spec: &Node) -> Option<ImportSpecifier> {
        let name = spec.child_by_field_name("name")?;
        let imported = self.text(&name);
        let local = spec
            .child_by_field_name("alias")
            .map(|alias| self.text(&alias))
            .unwrap_or(imported);
        let children: Vec<Node> = spec.children(&mut spec.walk()).collect();
        let type_only = children
            .iter()
            .any(|c| !c.is_named() && c.kind() == "type");
        Some(ImportSpecifier {
            kind: SpecifierKind::Named,
            imported: Some(imported.to_string()),
            local: local.to_string(),
            type_only,
        })
    }

    fn lower_const(&mut self, node: &Node) -> NodeId {
        let decl = self.tree.alloc(NodeKind::VariableDeclaration);
        let declarators: Vec<Node> = node.named_children(&mut node.walk()).collect();
        for declarator in declarators
            .iter()
            .filter(|n| n.kind() == "variable_declarator")
        {
            let id = self.lower_declarator(declarator);
            let _ = self.tree.push_child(decl, id);
        }
        decl
    }

    fn lower_declarator(&mut self, node: &Node) -> NodeId {
        let annotation = node
            .child_by_field_name("type")
            .map(|t| self.text(&t).to_string());
        let declarator = self.tree.alloc(NodeKind::VariableDeclarator { annotation });

        if let Some(name) = node.child_by_field_name("name") {
            let binding = if name.kind() == "identifier" {
                self.tree
                    .alloc(NodeKind::Identifier(self.text(&name).to_string()))
            } else {
                self.opaque(&name, OpaqueRole::Pattern)
            };
            self.tree.set_raw(binding, self.text(&name).to_string());
            let _ = self.tree.push_child(declarator, binding);
        }
        if let Some(value) = node.child_by_field_name("value") {
            let init = self.opaque(&value, OpaqueRole::Expression);
            self.tree.set_raw(init, self.text(&value).to_string());
            let _ = self.tree.push_child(declarator, init);
        }

        self.tree.set_raw(declarator, self.text(node).to_string());
        declarator
    }
}
