//! Definition reconciliation against the history chain.
//!
//! Every binding of an incoming `const` statement ends up in the target as
//! a single-binding statement. When the target already defines the name, the
//! history baseline decides whether its current value is a generated
//! artifact (overwritten silently) or a manual edit (overwritten, but kept
//! as a leading comment and reported as a [`MergeConflict`]).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MergeError, TreeError};
use crate::merger::{AnchorFallback, MergeOptions};
use crate::snippet::{equal_bindings, BindingRef, Snippet};
use crate::types::{NodeId, NodeKind};

/// Most recent generated binding per name across a history chain.
#[derive(Debug, Default)]
pub struct HistoryIndex<'h> {
    entries: HashMap<String, BindingRef<'h>>,
}

impl<'h> HistoryIndex<'h> {
    /// Index `history`, oldest first; later snippets override earlier ones.
    pub fn build(history: &'h [Arc<Snippet>]) -> Self {
        let mut entries = HashMap::new();
        for snippet in history {
            for stmt in snippet.definitions() {
                for declarator in snippet.bindings(*stmt) {
                    if let Some(name) = snippet.binding_name(*declarator) {
                        entries.insert(name.to_string(), BindingRef::new(snippet, *declarator));
                    }
                }
            }
        }
        Self { entries }
    }

    pub fn baseline(&self, name: &str) -> Option<BindingRef<'h>> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A manual edit that was overwritten by generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub name: String,
    /// Rendered baseline from history, if any.
    pub baseline: Option<String>,
    /// Rendered target code that was replaced, comments included. The
    /// annotation left in the source omits the comments, which stay in place.
    pub existing: String,
    pub incoming: String,
}

/// What happened to one incoming binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionOutcome {
    Inserted { name: String },
    Replaced {
        name: String,
        conflict: Option<MergeConflict>,
    },
    /// No anchor and the fallback says not to insert.
    Skipped { name: String },
}

/// Merge every binding of the `const` statement `statement` of `incoming`
/// into `target`.
pub fn merge_definition(
    target: &mut Snippet,
    incoming: &Snippet,
    statement: NodeId,
    history: &HistoryIndex<'_>,
    options: &MergeOptions,
) -> Result<Vec<DefinitionOutcome>, MergeError> {
    if !matches!(incoming.tree().kind(statement), Some(NodeKind::VariableDeclaration)) {
        return Err(MergeError::NotADefinition(statement));
    }

    let mut outcomes = Vec::new();
    for declarator in incoming.bindings(statement) {
        let incoming_ref = BindingRef::new(incoming, *declarator);
        let existing = incoming_ref.name().and_then(|name| target.find_binding(name));
        let outcome = match existing {
            None => insert_definition(target, incoming_ref, options)?,
            Some(existing) => handle_existing_merge(target, existing, incoming_ref, history, options)?,
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn insert_definition(
    target: &mut Snippet,
    incoming: BindingRef<'_>,
    options: &MergeOptions,
) -> Result<DefinitionOutcome, MergeError> {
    let name = incoming.snippet.binding_label(incoming.declarator);
    let stmt = single_binding_statement(target, incoming)?;

    match target.anchor() {
        Some(anchor) => target.tree_mut().insert_before(anchor, stmt)?,
        None => match options.anchor_fallback {
            AnchorFallback::Append => {
                debug!(name = %name, "No default export, appending definition");
                let root = target.tree().root();
                target.tree_mut().push_child(root, stmt)?;
            }
            AnchorFallback::Skip => {
                warn!(name = %name, "No default export to anchor new definition, skipping");
                return Ok(DefinitionOutcome::Skipped { name });
            }
        },
    }
    target.refresh_definitions();
    debug!(name = %name, "Inserted new definition");
    Ok(DefinitionOutcome::Inserted { name })
}

/// Replace the target's binding with the incoming one, annotating the
/// replacement when the target diverged from both baseline and incoming.
fn handle_existing_merge(
    target: &mut Snippet,
    existing: NodeId,
    incoming: BindingRef<'_>,
    history: &HistoryIndex<'_>,
    options: &MergeOptions,
) -> Result<DefinitionOutcome, MergeError> {
    let name = incoming.snippet.binding_label(incoming.declarator);

    let (conflict, existing_code) = {
        let existing_ref = BindingRef::new(target, existing);
        let baseline = history.baseline(&name);
        let diverged = match baseline {
            Some(h) => !equal_bindings(existing_ref, h) && !equal_bindings(existing_ref, incoming),
            None => options.annotate_without_history && !equal_bindings(existing_ref, incoming),
        };
        let conflict = diverged.then(|| MergeConflict {
            name: name.clone(),
            baseline: baseline.map(|h| h.render(false)),
            existing: existing_ref.render(true),
            incoming: incoming.render(false),
        });
        (conflict, existing_ref.render(false))
    };

    let old_stmt = target
        .tree()
        .parent(existing)
        .ok_or(TreeError::Detached(existing))?;
    let replacement = single_binding_statement(target, incoming)?;
    let tree = target.tree_mut();

    let siblings = tree.children(old_stmt).to_vec();
    let index = siblings
        .iter()
        .position(|c| *c == existing)
        .ok_or(TreeError::Detached(existing))?;

    if siblings.len() == 1 {
        let old = tree.get_mut(old_stmt)?;
        let leading = std::mem::take(&mut old.leading_comments);
        let trailing = old.trailing_comment.take();
        let blank = old.blank_line_before;
        tree.replace_with(old_stmt, replacement)?;
        let new = tree.get_mut(replacement)?;
        new.leading_comments = leading;
        new.trailing_comment = trailing;
        new.blank_line_before = blank;
    } else if index == 0 {
        // Later siblings keep the original statement, right after the replacement.
        tree.remove(existing)?;
        tree.insert_before(old_stmt, replacement)?;
        let old = tree.get_mut(old_stmt)?;
        let leading = std::mem::take(&mut old.leading_comments);
        let blank = std::mem::replace(&mut old.blank_line_before, false);
        let new = tree.get_mut(replacement)?;
        new.leading_comments = leading;
        new.blank_line_before = blank;
    } else {
        // Split so earlier siblings still precede the replacement and later
        // ones still follow it.
        tree.remove(existing)?;
        tree.insert_after(old_stmt, replacement)?;
        let later = &siblings[index + 1..];
        let last = if later.is_empty() {
            replacement
        } else {
            let tail = tree.alloc(NodeKind::VariableDeclaration);
            for declarator in later {
                tree.push_child(tail, *declarator)?;
            }
            tree.insert_after(replacement, tail)?;
            tail
        };
        let trailing = tree.get_mut(old_stmt)?.trailing_comment.take();
        tree.get_mut(last)?.trailing_comment = trailing;
    }

    if let Some(conflict) = &conflict {
        if options.annotate_conflicts {
            tree.leading_comments_mut(replacement)?
                .push(annotation(&existing_code));
        }
        warn!(name = %name, "Target diverged from generated baseline, preserving manual edit");
    } else {
        debug!(name = %name, "Replaced generated definition");
    }

    target.refresh_definitions();
    Ok(DefinitionOutcome::Replaced { name, conflict })
}

/// Build a detached `const` statement in `target` holding a copy of `binding`.
fn single_binding_statement(
    target: &mut Snippet,
    binding: BindingRef<'_>,
) -> Result<NodeId, MergeError> {
    let tree = target.tree_mut();
    let stmt = tree.alloc(NodeKind::VariableDeclaration);
    let declarator = tree.graft(binding.snippet.tree(), binding.declarator)?;
    tree.push_child(stmt, declarator)?;
    Ok(stmt)
}

/// Wrap code in a block comment that cannot be closed early.
fn annotation(code: &str) -> String {
    let body = code.replace("*/", "*\\/");
    if body.contains('\n') {
        format!("/*\n{body}\n*/")
    } else {
        format!("/* {body} */")
    }
}
