//! Import reconciliation.
//!
//! An incoming import either extends the target's declaration for the same
//! module and specifier shape with the specifiers it lacks, or is copied in
//! as a new statement after the target's last import. Nothing is removed.

use tracing::{debug, warn};

use crate::error::MergeError;
use crate::snippet::Snippet;
use crate::types::NodeId;

/// What happened to one incoming import declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Copied into the target as a new statement.
    Inserted,
    /// Matched an existing declaration; this many specifiers were appended.
    Extended(usize),
    /// Matched and already complete.
    Unchanged,
}

/// Merge the import declaration `import` of `incoming` into `target`.
pub fn merge_import(
    target: &mut Snippet,
    incoming: &Snippet,
    import: NodeId,
) -> Result<ImportOutcome, MergeError> {
    let decl = incoming
        .import(import)
        .ok_or(MergeError::NotAnImport(import))?;

    let matched = target
        .imports()
        .iter()
        .copied()
        .find(|id| target.import(*id).is_some_and(|t| t.same_group(decl)));

    let Some(existing) = matched else {
        let copy = target.tree_mut().graft(incoming.tree(), import)?;
        {
            let data = target.tree_mut().get_mut(copy)?;
            data.leading_comments.clear();
            data.trailing_comment = None;
        }
        match target.imports().last().copied() {
            Some(last) => target.tree_mut().insert_after(last, copy)?,
            None => {
                let root = target.tree().root();
                let index = target.prologue_len();
                target.tree_mut().insert_child(root, index, copy)?;
            }
        }
        target.refresh_imports();
        debug!(module = %decl.module_path, "Inserted new import declaration");
        return Ok(ImportOutcome::Inserted);
    };

    let missing: Vec<_> = match target.import(existing) {
        Some(current) => decl
            .specifiers
            .iter()
            .filter(|spec| !current.has_specifier(spec))
            .cloned()
            .collect(),
        None => return Err(MergeError::NotAnImport(existing)),
    };
    if missing.is_empty() {
        return Ok(ImportOutcome::Unchanged);
    }

    let added = missing.len();
    let current = target
        .tree_mut()
        .import_mut(existing)
        .ok_or(MergeError::NotAnImport(existing))?;
    current.specifiers.extend(missing);
    if !current.is_well_formed() {
        warn!(
            module = %decl.module_path,
            import = %current.to_source(),
            "Merged import mixes specifiers JavaScript does not accept together"
        );
    }
    debug!(module = %decl.module_path, added, "Extended import declaration");
    Ok(ImportOutcome::Extended(added))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_all(incoming: &Snippet, target: &mut Snippet) -> Vec<ImportOutcome> {
        incoming
            .imports()
            .iter()
            .map(|id| merge_import(target, incoming, *id).unwrap())
            .collect()
    }

    #[test]
    fn test_existing_specifiers_are_kept() {
        let incoming = Snippet::new("import { a } from 'm';\n").unwrap();
        let mut target = Snippet::new("import { a, b } from 'm';\nfoo();\n").unwrap();
        assert_eq!(merge_all(&incoming, &mut target), vec![ImportOutcome::Unchanged]);
        assert_eq!(target.source(), "import { a, b } from 'm';\nfoo();\n");
    }

    #[test]
    fn test_missing_specifiers_are_appended() {
        let incoming = Snippet::new("import { c, a as x } from 'm';\n").unwrap();
        let mut target = Snippet::new("import { a, b } from 'm';\n").unwrap();
        assert_eq!(merge_all(&incoming, &mut target), vec![ImportOutcome::Extended(2)]);
        assert_eq!(target.source(), "import { a, b, c, a as x } from 'm';\n");
    }

    #[test]
    fn test_new_import_goes_after_last_import() {
        let incoming = Snippet::new("import x from 'n';\n").unwrap();
        let mut target =
            Snippet::new("import a from 'a';\nimport b from 'b';\nconst c = 1;\n").unwrap();
        assert_eq!(merge_all(&incoming, &mut target), vec![ImportOutcome::Inserted]);
        assert_eq!(
            target.source(),
            "import a from 'a';\nimport b from 'b';\nimport x from 'n';\nconst c = 1;\n"
        );
        assert_eq!(target.imports().len(), 3);
    }

    #[test]
    fn test_new_import_becomes_first_statement_without_imports() {
        let incoming = Snippet::new("// header\nimport x from 'n';\n").unwrap();
        let mut target = Snippet::new("const c = 1;\n").unwrap();
        merge_all(&incoming, &mut target);
        assert_eq!(target.source(), "import x from 'n';\nconst c = 1;\n");
    }

    #[test]
    fn test_new_import_stays_below_hashbang_and_directives() {
        let incoming = Snippet::new("import x from 'n';\n").unwrap();
        let mut target =
            Snippet::new("#!/usr/bin/env node\n'use client';\nrun();\n").unwrap();
        merge_all(&incoming, &mut target);

        let merged = target.source();
        assert_eq!(
            merged,
            "#!/usr/bin/env node\n'use client';\nimport x from 'n';\nrun();\n"
        );
        assert!(Snippet::new(&merged).is_ok());
    }

    #[test]
    fn test_conflicting_defaults_are_still_merged() {
        let incoming = Snippet::new("import Bar from 'm';\n").unwrap();
        let mut target = Snippet::new("import Foo from 'm';\n").unwrap();
        assert_eq!(merge_all(&incoming, &mut target), vec![ImportOutcome::Extended(1)]);
        let decl = target.import(target.imports()[0]).unwrap();
        assert!(!decl.is_well_formed());
    }

    #[test]
    fn test_namespace_and_named_stay_separate() {
        let incoming = Snippet::new("import * as m from 'm';\n").unwrap();
        let mut target = Snippet::new("import { a } from 'm';\n").unwrap();
        assert_eq!(merge_all(&incoming, &mut target), vec![ImportOutcome::Inserted]);
        assert_eq!(
            target.source(),
            "import { a } from 'm';\nimport * as m from 'm';\n"
        );
    }

    #[test]
    fn test_default_group_absorbs_named_specifiers() {
        let incoming = Snippet::new("import React, { useState } from 'react';\n").unwrap();
        let mut target = Snippet::new("import React from 'react';\n").unwrap();
        assert_eq!(merge_all(&incoming, &mut target), vec![ImportOutcome::Extended(1)]);
        assert_eq!(
            target.source(),
            "import React, { useState } from 'react';\n"
        );
    }

    #[test]
    fn test_non_import_node_is_rejected() {
        let incoming = Snippet::new("const a = 1;\n").unwrap();
        let mut target = Snippet::new("const b = 1;\n").unwrap();
        let stmt = incoming.definitions()[0];
        assert!(matches!(
            merge_import(&mut target, &incoming, stmt),
            Err(MergeError::NotAnImport(_))
        ));
    }
}
