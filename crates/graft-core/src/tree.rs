//! Arena syntax tree with explicit structural edits.
//!
//! Every node lives in a flat `Vec` and is addressed by a [`NodeId`]. Edits
//! go through `insert_before`, `insert_after`, `replace_with`, `push_child`
//! and `remove`; nodes copied in from another tree enter via [`SyntaxTree::graft`].
//!
//! Nodes parsed from source remember their original text and print it back
//! verbatim until an edit touches them or one of their descendants.

use crate::error::TreeError;
use crate::types::{ImportDeclaration, NodeId, NodeKind};

#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Comments printed on their own lines before the node, delimiters included.
    pub leading_comments: Vec<String>,
    /// Comment printed after the node on the same line.
    pub trailing_comment: Option<String>,
    /// Source text as parsed; cleared on edit.
    raw: Option<String>,
    /// Whether a blank line separated this statement from the previous one.
    pub blank_line_before: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            leading_comments: Vec::new(),
            trailing_comment: None,
            raw: None,
            blank_line_before: false,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_pristine(&self) -> bool {
        self.raw.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    root: NodeId,
    /// Comments after the last statement.
    pub dangling_comments: Vec<String>,
}

impl Default for SyntaxTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxTree {
    /// Create a tree holding an empty program.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Program)],
            root: NodeId(0),
            dangling_comments: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Top-level statements in source order.
    pub fn statements(&self) -> &[NodeId] {
        &self.nodes[self.root.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements().is_empty()
    }

    pub fn get(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::Unknown(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData, TreeError> {
        self.nodes.get_mut(id.0).ok_or(TreeError::Unknown(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// True when the node is reachable from the program root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    pub(crate) fn set_raw(&mut self, id: NodeId, raw: String) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.raw = Some(raw);
        }
    }

    /// Drop the remembered source text of `id` and all of its ancestors.
    fn invalidate(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get_mut(node_id.0) {
                Some(node) => {
                    node.raw = None;
                    current = node.parent;
                }
                None => break,
            }
        }
    }

    fn check_container(&self, id: NodeId) -> Result<(), TreeError> {
        match self.get(id)?.kind {
            NodeKind::Program | NodeKind::VariableDeclaration | NodeKind::VariableDeclarator { .. } => {
                Ok(())
            }
            _ => Err(TreeError::NotAContainer(id)),
        }
    }

    /// Unlink `id` from its parent. A detached node is left untouched.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.get(id)?.parent else {
            return Ok(());
        };
        self.get_mut(parent)?.children.retain(|c| *c != id);
        self.get_mut(id)?.parent = None;
        self.invalidate(parent);
        Ok(())
    }

    /// Insert `child` at `index` among `parent`'s children, detaching it first.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        self.check_container(parent)?;
        self.get(child)?;
        self.remove(child)?;
        let siblings = &mut self.get_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        self.invalidate(parent);
        Ok(())
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let end = self.get(parent)?.children.len();
        self.insert_child(parent, end, child)
    }

    fn position(&self, id: NodeId) -> Result<(NodeId, usize), TreeError> {
        let parent = self.get(id)?.parent.ok_or(TreeError::Detached(id))?;
        let index = self
            .get(parent)?
            .children
            .iter()
            .position(|c| *c == id)
            .ok_or(TreeError::Detached(id))?;
        Ok((parent, index))
    }

    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.remove(node)?;
        let (parent, index) = self.position(anchor)?;
        self.insert_child(parent, index, node)
    }

    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.remove(node)?;
        let (parent, index) = self.position(anchor)?;
        self.insert_child(parent, index + 1, node)
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) -> Result<(), TreeError> {
        if old == new {
            return Ok(());
        }
        self.remove(new)?;
        let (parent, index) = self.position(old)?;
        self.get_mut(parent)?.children[index] = new;
        self.get_mut(new)?.parent = Some(parent);
        self.get_mut(old)?.parent = None;
        self.invalidate(parent);
        Ok(())
    }

    /// Mutable access to an import declaration's payload. Marks it edited.
    pub fn import_mut(&mut self, id: NodeId) -> Option<&mut ImportDeclaration> {
        if !matches!(self.kind(id), Some(NodeKind::ImportDeclaration(_))) {
            return None;
        }
        self.invalidate(id);
        match &mut self.nodes[id.0].kind {
            NodeKind::ImportDeclaration(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn leading_comments_mut(&mut self, id: NodeId) -> Result<&mut Vec<String>, TreeError> {
        Ok(&mut self.get_mut(id)?.leading_comments)
    }

    /// Deep-copy the subtree at `id` of `source` into this arena. The copy is
    /// detached and keeps the original text of pristine nodes.
    pub fn graft(&mut self, source: &SyntaxTree, id: NodeId) -> Result<NodeId, TreeError> {
        let data = source.get(id)?;
        let copy = self.alloc(data.kind.clone());
        {
            let node = self.get_mut(copy)?;
            node.leading_comments = data.leading_comments.clone();
            node.trailing_comment = data.trailing_comment.clone();
            node.raw = data.raw.clone();
        }
        for child in data.children.clone() {
            let child_copy = self.graft(source, child)?;
            self.get_mut(child_copy)?.parent = Some(copy);
            self.get_mut(copy)?.children.push(child_copy);
        }
        Ok(copy)
    }

    /// Print the whole program.
    pub fn print(&self) -> String {
        let mut out = String::new();
        for (i, stmt) in self.statements().iter().enumerate() {
            if i > 0 {
                out.push('\n');
                if self.nodes[stmt.0].blank_line_before {
                    out.push('\n');
                }
            }
            out.push_str(&self.print_node(*stmt, true));
        }
        for comment in &self.dangling_comments {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(comment);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Print one node, optionally with its attached comments.
    pub fn print_node(&self, id: NodeId, include_comments: bool) -> String {
        let Some(node) = self.nodes.get(id.0) else {
            return String::new();
        };
        let body = self.print_body(id);
        if !include_comments {
            return body;
        }

        let mut out = String::new();
        for comment in &node.leading_comments {
            out.push_str(comment);
            out.push('\n');
        }
        out.push_str(&body);
        if let Some(comment) = &node.trailing_comment {
            out.push(' ');
            out.push_str(comment);
        }
        out
    }

    fn print_body(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        if let Some(raw) = &node.raw {
            return raw.clone();
        }
        match &node.kind {
            NodeKind::Program => self.print(),
            NodeKind::ImportDeclaration(decl) => decl.to_source(),
            NodeKind::VariableDeclaration => {
                let declarators: Vec<String> =
                    node.children.iter().map(|c| self.print_body(*c)).collect();
                format!("const {};", declarators.join(", "))
            }
            NodeKind::VariableDeclarator { annotation } => {
                let mut out = node
                    .children
                    .first()
                    .map(|b| self.print_body(*b))
                    .unwrap_or_default();
                if let Some(annotation) = annotation {
                    out.push_str(annotation);
                }
                if let Some(init) = node.children.get(1) {
                    out.push_str(" = ");
                    out.push_str(&self.print_body(*init));
                }
                out
            }
            NodeKind::Identifier(name) => name.clone(),
            NodeKind::Opaque { text, .. } => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImportSpecifier, OpaqueRole};

    fn statement(tree: &mut SyntaxTree, text: &str) -> NodeId {
        tree.alloc(NodeKind::Opaque {
            role: OpaqueRole::Statement,
            text: text.into(),
        })
    }

    fn const_decl(tree: &mut SyntaxTree, name: &str, init: &str) -> NodeId {
        let decl = tree.alloc(NodeKind::VariableDeclaration);
        let declarator = tree.alloc(NodeKind::VariableDeclarator { annotation: None });
        let ident = tree.alloc(NodeKind::Identifier(name.into()));
        let value = tree.alloc(NodeKind::Opaque {
            role: OpaqueRole::Expression,
            text: init.into(),
        });
        tree.push_child(declarator, ident).unwrap();
        tree.push_child(declarator, value).unwrap();
        tree.push_child(decl, declarator).unwrap();
        decl
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut tree = SyntaxTree::new();
        let root = tree.root();
        let a = statement(&mut tree, "a();");
        let c = statement(&mut tree, "c();");
        tree.push_child(root, a).unwrap();
        tree.push_child(root, c).unwrap();

        let b = statement(&mut tree, "b();");
        tree.insert_after(a, b).unwrap();
        let z = statement(&mut tree, "z();");
        tree.insert_before(a, z).unwrap();

        assert_eq!(tree.print(), "z();\na();\nb();\nc();\n");
    }

    #[test]
    fn test_replace_detaches_old_node() {
        let mut tree = SyntaxTree::new();
        let root = tree.root();
        let old = const_decl(&mut tree, "x", "1");
        tree.push_child(root, old).unwrap();
        let new = const_decl(&mut tree, "x", "2");
        tree.replace_with(old, new).unwrap();

        assert!(!tree.is_attached(old));
        assert!(tree.is_attached(new));
        assert_eq!(tree.print(), "const x = 2;\n");
    }

    #[test]
    fn test_insert_relative_to_detached_node_fails() {
        let mut tree = SyntaxTree::new();
        let loose = statement(&mut tree, "a();");
        let other = statement(&mut tree, "b();");
        assert_eq!(
            tree.insert_before(loose, other),
            Err(TreeError::Detached(loose))
        );
    }

    #[test]
    fn test_opaque_nodes_cannot_hold_children() {
        let mut tree = SyntaxTree::new();
        let a = statement(&mut tree, "a();");
        let b = statement(&mut tree, "b();");
        assert_eq!(tree.push_child(a, b), Err(TreeError::NotAContainer(a)));
    }

    #[test]
    fn test_edit_invalidates_raw_text() {
        let mut tree = SyntaxTree::new();
        let root = tree.root();
        let import = tree.alloc(NodeKind::ImportDeclaration(ImportDeclaration::new(
            "m",
            vec![ImportSpecifier::named("a", "a")],
        )));
        tree.set_raw(import, "import {a} from 'm'".into());
        tree.push_child(root, import).unwrap();
        assert_eq!(tree.print(), "import {a} from 'm'\n");

        tree.import_mut(import)
            .unwrap()
            .specifiers
            .push(ImportSpecifier::named("b", "b"));
        assert_eq!(tree.print(), "import { a, b } from 'm';\n");
    }

    #[test]
    fn test_graft_copies_subtree() {
        let mut source = SyntaxTree::new();
        let decl = const_decl(&mut source, "cfg", "{ a: 1 }");
        source.leading_comments_mut(decl).unwrap().push("// generated".into());

        let mut target = SyntaxTree::new();
        let root = target.root();
        let copy = target.graft(&source, decl).unwrap();
        target.push_child(root, copy).unwrap();

        assert_eq!(target.print(), "// generated\nconst cfg = { a: 1 };\n");
        assert_eq!(source.parent(decl), None);
    }

    #[test]
    fn test_print_node_without_comments() {
        let mut tree = SyntaxTree::new();
        let decl = const_decl(&mut tree, "x", "1");
        tree.leading_comments_mut(decl).unwrap().push("/* note */".into());
        assert_eq!(tree.print_node(decl, false), "const x = 1;");
        assert_eq!(tree.print_node(decl, true), "/* note */\nconst x = 1;");
    }
}
