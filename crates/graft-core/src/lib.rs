//! History-aware merging of generated JavaScript and TypeScript snippets.
//!
//! A [`Snippet`] wraps a parsed source unit. Merging one snippet into
//! another reconciles imports additively and overwrites top-level `const`
//! bindings, except that a binding the user edited by hand (one that
//! differs from the last generated version in the incoming snippet's
//! history) is kept as a comment above its replacement.
//!
//! ```no_run
//! use std::sync::Arc;
//! use graft_core::Snippet;
//!
//! # fn main() -> anyhow::Result<()> {
//! let previous = Arc::new(Snippet::new("const cfg = { a: 1 };")?);
//! let incoming = Snippet::builder()
//!     .history([previous])
//!     .build("const cfg = { a: 2 };")?;
//! let mut target = Snippet::new("const cfg = { a: 1, manual: true };")?;
//!
//! let report = incoming.merge_to(&mut target)?;
//! assert!(report.has_conflicts());
//! println!("{}", target.source());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod definitions;
pub mod error;
pub mod format;
pub mod imports;
pub mod logging;
pub mod merger;
pub mod parser;
pub mod snippet;
pub mod tree;
pub mod types;

pub use config::Settings;
pub use definitions::{HistoryIndex, MergeConflict};
pub use error::{FormatError, GraftError, MergeError, SyntaxError, TreeError};
pub use format::{CanonicalFormatter, Formatter, QuoteStyle};
pub use merger::{merge_to, AnchorFallback, MergeOptions, MergeReport, Merger};
pub use snippet::{equal_bindings, BindingRef, Snippet, SnippetBuilder};
pub use tree::SyntaxTree;
pub use types::{Dialect, ImportDeclaration, ImportSpecifier, NodeId, NodeKind, SpecifierKind};
