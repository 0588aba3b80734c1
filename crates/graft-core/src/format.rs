//! Deterministic source formatter.
//!
//! The canonical formatter reparses the text with tree-sitter and re-emits
//! its tokens with fixed spacing rules: one space between tokens unless a
//! punctuation rule says otherwise, blocks broken over indented lines,
//! missing semicolons added, trailing commas dropped and string quotes
//! normalized. Two fragments that differ only in layout format to the same
//! text, which is what binding equality relies on.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::error::FormatError;
use crate::parser;
use crate::types::Dialect;

/// A formatter turns source text into canonical source text.
pub trait Formatter: Send + Sync {
    fn format(&self, source: &str, keep_comments: bool) -> Result<String, FormatError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    #[default]
    Single,
    Double,
    Preserve,
}

/// Token-level canonical formatter backed by tree-sitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalFormatter {
    pub dialect: Dialect,
    pub quote_style: QuoteStyle,
}

impl CanonicalFormatter {
    pub fn new(dialect: Dialect, quote_style: QuoteStyle) -> Self {
        Self {
            dialect,
            quote_style,
        }
    }
}

impl Formatter for CanonicalFormatter {
    fn format(&self, source: &str, keep_comments: bool) -> Result<String, FormatError> {
        let tree = parser::parse_ts(source, self.dialect)?;
        let mut writer = TokenWriter::new(source, self.quote_style, keep_comments);
        writer.visit(&tree.root_node());
        Ok(writer.finish())
    }
}

/// Leaves printed as a single token, whatever their inner structure.
const ATOMIC_KINDS: &[&str] = &[
    "string",
    "template_string",
    "regex",
    "number",
    "jsx_text",
    "hash_bang_line",
];

/// Nodes whose direct children are printed one per line.
const STATEMENT_PARENTS: &[&str] = &["program", "statement_block", "class_body", "switch_body"];

/// Statements that end with a semicolon.
const SEMICOLON_KINDS: &[&str] = &[
    "lexical_declaration",
    "variable_declaration",
    "expression_statement",
    "import_statement",
    "return_statement",
    "throw_statement",
    "break_statement",
    "continue_statement",
    "debugger_statement",
    "type_alias_declaration",
];

const CLOSERS: &[&str] = &["}", "]", ")", ">"];

#[derive(Debug, Clone)]
struct Token {
    text: String,
    kind: &'static str,
    parent: &'static str,
    end_row: usize,
}

impl Token {
    fn is_word(&self) -> bool {
        matches!(
            self.kind,
            "identifier" | "property_identifier" | "type_identifier" | "private_property_identifier"
        )
    }
}

struct TokenWriter<'s> {
    source: &'s str,
    quote_style: QuoteStyle,
    keep_comments: bool,
    out: String,
    indent: usize,
    newline_pending: bool,
    prev: Option<Token>,
}

impl<'s> TokenWriter<'s> {
    fn new(source: &'s str, quote_style: QuoteStyle, keep_comments: bool) -> Self {
        Self {
            source,
            quote_style,
            keep_comments,
            out: String::new(),
            indent: 0,
            newline_pending: false,
            prev: None,
        }
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }

    fn text(&self, node: &Node) -> &'s str {
        self.source.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }

    fn visit(&mut self, node: &Node) {
        let kind = node.kind();
        if kind == "comment" {
            if self.keep_comments {
                self.comment(node);
            }
            return;
        }
        if ATOMIC_KINDS.contains(&kind) || node.child_count() == 0 {
            self.leaf(node);
            return;
        }

        let children: Vec<Node> = node.children(&mut node.walk()).collect();
        for (i, child) in children.iter().enumerate() {
            if child.kind() == "," && is_trailing_comma(&children[i + 1..]) {
                continue;
            }
            self.visit(child);
        }

        if needs_semicolon(node) && self.prev.as_ref().is_some_and(|p| p.text != ";") {
            self.emit(Token {
                text: ";".into(),
                kind: ";",
                parent: kind,
                end_row: node.end_position().row,
            });
        }
        if node
            .parent()
            .is_some_and(|p| STATEMENT_PARENTS.contains(&p.kind()))
        {
            self.newline_pending = true;
        }
    }

    fn leaf(&mut self, node: &Node) {
        let raw = self.text(node);
        let text = match node.kind() {
            "string" => normalize_quotes(raw, self.quote_style),
            "jsx_text" => raw.split_whitespace().collect::<Vec<_>>().join(" "),
            _ => raw.to_string(),
        };
        if text.is_empty() {
            return;
        }
        let token = Token {
            text,
            kind: node.kind(),
            parent: node.parent().map(|p| p.kind()).unwrap_or(""),
            end_row: node.end_position().row,
        };
        self.emit(token);
    }

    fn comment(&mut self, node: &Node) {
        let text = self.text(node).trim_end().to_string();
        let own_line = self
            .prev
            .as_ref()
            .is_some_and(|p| node.start_position().row > p.end_row);
        let was_pending = self.newline_pending;
        self.newline_pending = own_line;
        let is_line_comment = text.starts_with("//");
        self.emit(Token {
            text,
            kind: "comment",
            parent: node.parent().map(|p| p.kind()).unwrap_or(""),
            end_row: node.end_position().row,
        });
        if is_line_comment || (was_pending && !own_line) {
            self.newline_pending = true;
        }
    }

    fn emit(&mut self, token: Token) {
        let opens_block = token.text == "{" && STATEMENT_PARENTS.contains(&token.parent);
        let closes_block = token.text == "}" && STATEMENT_PARENTS.contains(&token.parent);

        if closes_block {
            self.indent = self.indent.saturating_sub(1);
            let empty = self
                .prev
                .as_ref()
                .is_some_and(|p| p.text == "{" && p.parent == token.parent);
            self.newline_pending = !empty;
        }

        if self.newline_pending && !self.out.is_empty() {
            self.out.push('\n');
            for _ in 0..self.indent {
                self.out.push_str("  ");
            }
        } else if let Some(prev) = &self.prev {
            if needs_space(prev, &token) {
                self.out.push(' ');
            }
        }
        self.newline_pending = false;
        self.out.push_str(&token.text);

        if opens_block {
            self.indent += 1;
            self.newline_pending = true;
        }
        self.prev = Some(token);
    }
}

fn is_trailing_comma(rest: &[Node]) -> bool {
    rest.iter()
        .find(|n| n.kind() != "comment")
        .is_some_and(|n| CLOSERS.contains(&n.kind()))
}

fn needs_semicolon(node: &Node) -> bool {
    let kind = node.kind();
    if SEMICOLON_KINDS.contains(&kind) {
        return true;
    }
    kind == "export_statement" && node.child_by_field_name("declaration").is_none()
}

fn is_jsx(parent: &str) -> bool {
    parent.starts_with("jsx_")
}

fn is_type_brackets(parent: &str) -> bool {
    matches!(parent, "type_arguments" | "type_parameters")
}

fn needs_space(prev: &Token, cur: &Token) -> bool {
    let p = prev.text.as_str();
    let c = cur.text.as_str();

    if matches!(c, "," | ";" | ")" | "]" | "." | "?.") {
        return false;
    }
    if matches!(p, "(" | "[" | "." | "?." | "..." | "@") {
        return false;
    }
    if p == "{" && c == "}" {
        return false;
    }
    if matches!(c, ":" | "?") {
        return matches!(cur.parent, "ternary_expression" | "conditional_type");
    }
    if c == "!" && cur.parent == "non_null_expression" {
        return false;
    }
    if prev.parent == "unary_expression" && !p.chars().all(char::is_alphabetic) {
        return false;
    }
    if cur.parent == "update_expression" || prev.parent == "update_expression" {
        return false;
    }

    // Calls, parameter lists, indexing.
    if c == "(" && matches!(cur.parent, "arguments" | "formal_parameters") {
        return !(prev.is_word() || matches!(p, ")" | "]" | ">"));
    }
    if c == "[" && matches!(cur.parent, "subscript_expression" | "array_type" | "index_type_query") {
        return false;
    }

    // Generics.
    if is_type_brackets(cur.parent) && matches!(c, "<" | ">") {
        return false;
    }
    if is_type_brackets(prev.parent) && p == "<" {
        return false;
    }

    // JSX tags and children.
    if is_jsx(prev.parent) || is_jsx(cur.parent) || cur.kind == "jsx_text" || prev.kind == "jsx_text" {
        if matches!(p, "<" | "/" | "</") && is_jsx(prev.parent) && c != "/" {
            return false;
        }
        if c == ">" && is_jsx(cur.parent) {
            return false;
        }
        if c == "/" && cur.parent == "jsx_closing_element" {
            return false;
        }
        if (c == "=" && cur.parent == "jsx_attribute") || (p == "=" && prev.parent == "jsx_attribute") {
            return false;
        }
        if (c == "{" || p == "{") && cur.parent == "jsx_expression" && prev.parent == "jsx_expression" {
            return false;
        }
        if c == "}" && cur.parent == "jsx_expression" {
            return false;
        }
        if p.ends_with('>') && c.starts_with('<') {
            return false;
        }
        if cur.kind == "jsx_text" || prev.kind == "jsx_text" {
            return false;
        }
        if p == ">" && is_jsx(prev.parent) {
            return false;
        }
        if c == "<" && is_jsx(cur.parent) && matches!(cur.parent, "jsx_closing_element") {
            return false;
        }
    }

    true
}

/// Swap string delimiters to the preferred style when no escaping is needed.
fn normalize_quotes(raw: &str, style: QuoteStyle) -> String {
    let (from, to) = match style {
        QuoteStyle::Single => ('"', '\''),
        QuoteStyle::Double => ('\'', '"'),
        QuoteStyle::Preserve => return raw.to_string(),
    };
    let mut chars = raw.chars();
    if raw.len() < 2 || chars.next() != Some(from) || chars.next_back() != Some(from) {
        return raw.to_string();
    }
    let inner = &raw[1..raw.len() - 1];
    if inner.contains(to) || inner.contains('\\') {
        return raw.to_string();
    }
    format!("{to}{inner}{to}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(src: &str) -> String {
        CanonicalFormatter::new(Dialect::Tsx, QuoteStyle::Single)
            .format(src, false)
            .unwrap()
    }

    #[test]
    fn test_layout_differences_format_identically() {
        let a = fmt("const cfg = {a:1,b:[1,2,],};");
        let b = fmt("const   cfg={ a : 1, b : [ 1 , 2 ] }");
        assert_eq!(a, b);
        assert_eq!(a, "const cfg = { a: 1, b: [1, 2] };");
    }

    #[test]
    fn test_quotes_are_normalized() {
        assert_eq!(fmt("const s = \"x\";"), "const s = 'x';");
        assert_eq!(fmt("const s = \"it's\";"), "const s = \"it's\";");
        let double = CanonicalFormatter::new(Dialect::Tsx, QuoteStyle::Double)
            .format("const s = 'x';", false)
            .unwrap();
        assert_eq!(double, "const s = \"x\";");
    }

    #[test]
    fn test_calls_members_and_generics() {
        assert_eq!(
            fmt("const [v , set] = useState<number>( 0 )"),
            "const [v, set] = useState<number>(0);"
        );
        assert_eq!(fmt("const x = a . b ?. c [ 0 ]"), "const x = a.b?.c[0];");
        assert_eq!(fmt("const y = ! ok"), "const y = !ok;");
    }

    #[test]
    fn test_blocks_are_indented() {
        assert_eq!(
            fmt("function f(a){ if(a){return 1} return 2 }"),
            "function f(a) {\n  if (a) {\n    return 1;\n  }\n  return 2;\n}"
        );
        assert_eq!(fmt("function g() {}"), "function g() {}");
    }

    #[test]
    fn test_comments_kept_or_dropped() {
        let src = "/* keep */ const a = 1; // tail";
        let formatter = CanonicalFormatter::new(Dialect::Tsx, QuoteStyle::Single);
        assert_eq!(formatter.format(src, false).unwrap(), "const a = 1;");
        assert_eq!(
            formatter.format(src, true).unwrap(),
            "/* keep */ const a = 1; // tail"
        );
    }

    #[test]
    fn test_jsx_is_compacted() {
        assert_eq!(
            fmt("const el = <div className = \"x\" >\n  hello  world\n</div>"),
            "const el = <div className='x'>hello world</div>;"
        );
    }

    #[test]
    fn test_unparsable_source_is_an_error() {
        let err = CanonicalFormatter::default().format("const = ;", false);
        assert!(matches!(err, Err(FormatError::Unparsable(_))));
    }
}
