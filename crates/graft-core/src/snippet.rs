//! Source snippets: parsed text plus cached top-level indices.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{GraftError, MergeError, Result};
use crate::format::{CanonicalFormatter, Formatter, QuoteStyle};
use crate::merger::{MergeReport, Merger};
use crate::parser;
use crate::tree::SyntaxTree;
use crate::types::{Dialect, ImportDeclaration, NodeId, NodeKind};

/// One source unit: its tree, cached import and `const` statement lists,
/// and the chain of earlier generations it was derived from.
///
/// The cached lists are only valid right after [`Snippet::refresh`]; any
/// structural edit through [`Snippet::tree_mut`] leaves them stale.
pub struct Snippet {
    tree: SyntaxTree,
    dialect: Dialect,
    formatter: Arc<dyn Formatter>,
    imports: Vec<NodeId>,
    definitions: Vec<NodeId>,
    history: Vec<Arc<Snippet>>,
}

impl fmt::Debug for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snippet")
            .field("dialect", &self.dialect)
            .field("statements", &self.tree.statements().len())
            .field("imports", &self.imports.len())
            .field("definitions", &self.definitions.len())
            .field("history", &self.history.len())
            .finish()
    }
}

/// Configures how a [`Snippet`] is parsed and rendered.
pub struct SnippetBuilder {
    dialect: Dialect,
    quote_style: QuoteStyle,
    formatter: Option<Arc<dyn Formatter>>,
    history: Vec<Arc<Snippet>>,
}

impl Default for SnippetBuilder {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            quote_style: QuoteStyle::default(),
            formatter: None,
            history: Vec::new(),
        }
    }
}

impl SnippetBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn quote_style(mut self, quote_style: QuoteStyle) -> Self {
        self.quote_style = quote_style;
        self
    }

    /// Replace the canonical formatter used by [`Snippet::render`].
    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Prior generations, oldest first.
    pub fn history(mut self, history: impl IntoIterator<Item = Arc<Snippet>>) -> Self {
        self.history = history.into_iter().collect();
        self
    }

    pub fn build(self, text: &str) -> Result<Snippet> {
        if text.trim().is_empty() {
            return Err(GraftError::EmptySource);
        }
        let tree = parser::parse(text, self.dialect)?;
        let formatter = self
            .formatter
            .unwrap_or_else(|| Arc::new(CanonicalFormatter::new(self.dialect, self.quote_style)));

        let mut snippet = Snippet {
            tree,
            dialect: self.dialect,
            formatter,
            imports: Vec::new(),
            definitions: Vec::new(),
            history: self.history,
        };
        snippet.refresh();
        debug!(
            dialect = %snippet.dialect,
            imports = snippet.imports.len(),
            definitions = snippet.definitions.len(),
            history = snippet.history.len(),
            "Snippet parsed"
        );
        Ok(snippet)
    }
}

/// A binding (declarator) inside a particular snippet.
#[derive(Debug, Clone, Copy)]
pub struct BindingRef<'a> {
    pub snippet: &'a Snippet,
    pub declarator: NodeId,
}

impl<'a> BindingRef<'a> {
    pub fn new(snippet: &'a Snippet, declarator: NodeId) -> Self {
        Self {
            snippet,
            declarator,
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        self.snippet.binding_name(self.declarator)
    }

    pub fn render(&self, include_comments: bool) -> String {
        self.snippet.render(self.declarator, include_comments)
    }
}

/// Two bindings are the same iff their formatted code, comments stripped,
/// is textually identical.
pub fn equal_bindings(a: BindingRef<'_>, b: BindingRef<'_>) -> bool {
    a.render(false) == b.render(false)
}

impl Snippet {
    /// Parse `text` as TSX with no history.
    pub fn new(text: &str) -> Result<Self> {
        Self::builder().build(text)
    }

    pub fn builder() -> SnippetBuilder {
        SnippetBuilder::default()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// Mutable tree access. Call [`Snippet::refresh`] after structural edits.
    pub fn tree_mut(&mut self) -> &mut SyntaxTree {
        &mut self.tree
    }

    pub fn history(&self) -> &[Arc<Snippet>] {
        &self.history
    }

    /// Cached top-level import declarations.
    pub fn imports(&self) -> &[NodeId] {
        &self.imports
    }

    /// Cached top-level `const` statements.
    pub fn definitions(&self) -> &[NodeId] {
        &self.definitions
    }

    pub fn refresh(&mut self) {
        self.refresh_imports();
        self.refresh_definitions();
    }

    pub fn refresh_imports(&mut self) {
        self.imports = self
            .top_level(|kind| matches!(kind, NodeKind::ImportDeclaration(_)));
    }

    pub fn refresh_definitions(&mut self) {
        self.definitions = self.top_level(|kind| matches!(kind, NodeKind::VariableDeclaration));
    }

    fn top_level(&self, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        let root = self.tree.root();
        self.tree
            .statements()
            .iter()
            .copied()
            .filter(|id| self.tree.parent(*id) == Some(root))
            .filter(|id| self.tree.kind(*id).is_some_and(&pred))
            .collect()
    }

    pub fn import(&self, id: NodeId) -> Option<&ImportDeclaration> {
        match self.tree.kind(id) {
            Some(NodeKind::ImportDeclaration(decl)) => Some(decl),
            _ => None,
        }
    }

    /// Declarators of a `const` statement.
    pub fn bindings(&self, statement: NodeId) -> &[NodeId] {
        match self.tree.kind(statement) {
            Some(NodeKind::VariableDeclaration) => self.tree.children(statement),
            _ => &[],
        }
    }

    /// Name of a declarator, when it binds a plain identifier.
    pub fn binding_name(&self, declarator: NodeId) -> Option<&str> {
        let binding = *self.tree.children(declarator).first()?;
        match self.tree.kind(binding)? {
            NodeKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Human-readable label for a declarator, falling back to its pattern text.
    pub fn binding_label(&self, declarator: NodeId) -> String {
        match self.tree.children(declarator).first() {
            Some(binding) => self.tree.print_node(*binding, false),
            None => String::new(),
        }
    }

    /// First top-level declarator binding `name`.
    pub fn find_binding(&self, name: &str) -> Option<NodeId> {
        self.definitions
            .iter()
            .flat_map(|stmt| self.bindings(*stmt).iter().copied())
            .find(|d| self.binding_name(*d) == Some(name))
    }

    /// Insertion anchor for new definitions: the first `export default` statement.
    pub fn anchor(&self) -> Option<NodeId> {
        self.tree
            .statements()
            .iter()
            .copied()
            .find(|id| self.tree.kind(*id).is_some_and(NodeKind::is_default_export))
    }

    /// Number of leading hashbang and directive statements, which must stay
    /// ahead of anything inserted at the top.
    pub fn prologue_len(&self) -> usize {
        self.tree
            .statements()
            .iter()
            .take_while(|id| self.tree.kind(**id).is_some_and(NodeKind::is_prologue))
            .count()
    }

    /// Current source text, reflecting every edit so far.
    pub fn source(&self) -> String {
        self.tree.print()
    }

    /// Canonical text of a statement-level node, for equality checks.
    ///
    /// A declarator renders as a single-binding `const` statement. If the
    /// formatter fails, the unformatted printer output is returned.
    pub fn render(&self, node: NodeId, include_comments: bool) -> String {
        let printed = self.print_statement(node, include_comments);
        match self.formatter.format(&printed, include_comments) {
            Ok(formatted) => formatted,
            Err(e) => {
                debug!(error = %e, node = node.index(), "Formatter failed, using printer output");
                printed
            }
        }
    }

    fn print_statement(&self, node: NodeId, include_comments: bool) -> String {
        match self.tree.kind(node) {
            Some(NodeKind::VariableDeclarator { .. }) => {
                let mut out = String::new();
                if include_comments {
                    if let Some(stmt) = self.tree.parent(node).and_then(|p| self.tree.get(p).ok()) {
                        for comment in &stmt.leading_comments {
                            out.push_str(comment);
                            out.push('\n');
                        }
                    }
                }
                out.push_str("const ");
                out.push_str(&self.tree.print_node(node, false));
                out.push(';');
                out
            }
            _ => self.tree.print_node(node, include_comments),
        }
    }

    /// Merge this snippet into `target` with default options.
    pub fn merge_to(&self, target: &mut Snippet) -> std::result::Result<MergeReport, MergeError> {
        Merger::default().merge(self, target)
    }
}
