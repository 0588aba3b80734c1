//! Error types for snippet construction and merging.

use thiserror::Error;

use crate::types::NodeId;

/// Parser rejection, located at the first error or missing node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("failed to load {dialect} grammar: {message}")]
    Language { dialect: String, message: String },
    #[error("parser produced no tree")]
    NoTree,
    #[error("syntax error at {line}:{column} near `{snippet}`")]
    Invalid {
        line: usize,
        column: usize,
        snippet: String,
    },
}

/// Formatter failure. Never fatal during a merge: callers fall back to
/// unformatted printer output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("source does not parse: {0}")]
    Unparsable(#[from] SyntaxError),
    #[error("formatter rejected source: {0}")]
    Rejected(String),
}

/// Structural edit failures on the arena tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0:?} does not exist")]
    Unknown(NodeId),
    #[error("node {0:?} is detached from the tree")]
    Detached(NodeId),
    #[error("node {0:?} cannot hold children")]
    NotAContainer(NodeId),
}

/// Errors surfaced by the snippet API.
#[derive(Debug, Error)]
pub enum GraftError {
    #[error("source text is empty")]
    EmptySource,
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Errors that abort a merge midway. The target may be partially modified.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("tree edit failed: {0}")]
    Tree(#[from] TreeError),
    #[error("node {0:?} is not a top-level const declaration")]
    NotADefinition(NodeId),
    #[error("node {0:?} is not an import declaration")]
    NotAnImport(NodeId),
}

pub type Result<T, E = GraftError> = std::result::Result<T, E>;
