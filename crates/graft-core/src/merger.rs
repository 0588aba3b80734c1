//! Top-level merge driver.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::definitions::{merge_definition, DefinitionOutcome, HistoryIndex, MergeConflict};
use crate::error::MergeError;
use crate::imports::{merge_import, ImportOutcome};
use crate::snippet::Snippet;

/// Where a new definition goes when the target has no `export default`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorFallback {
    /// Append at the end of the program.
    #[default]
    Append,
    /// Leave the binding out.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Keep overwritten manual edits as a leading block comment.
    pub annotate_conflicts: bool,
    /// Treat every differing binding as a manual edit when history has no
    /// baseline for it.
    pub annotate_without_history: bool,
    pub anchor_fallback: AnchorFallback,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            annotate_conflicts: true,
            annotate_without_history: false,
            anchor_fallback: AnchorFallback::Append,
        }
    }
}

/// Summary of one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub imports_added: usize,
    pub specifiers_added: usize,
    pub inserted: Vec<String>,
    pub replaced: Vec<String>,
    pub skipped: Vec<String>,
    pub conflicts: Vec<MergeConflict>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.imports_added == 0
            && self.specifiers_added == 0
            && self.inserted.is_empty()
            && self.skipped.is_empty()
            && self.replaced.is_empty()
    }

    fn record_import(&mut self, outcome: ImportOutcome) {
        match outcome {
            ImportOutcome::Inserted => self.imports_added += 1,
            ImportOutcome::Extended(n) => self.specifiers_added += n,
            ImportOutcome::Unchanged => {}
        }
    }

    fn record_definition(&mut self, outcome: DefinitionOutcome) {
        match outcome {
            DefinitionOutcome::Inserted { name } => self.inserted.push(name),
            DefinitionOutcome::Replaced { name, conflict } => {
                self.replaced.push(name);
                self.conflicts.extend(conflict);
            }
            DefinitionOutcome::Skipped { name } => self.skipped.push(name),
        }
    }
}

/// Merges incoming snippets into targets.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    options: MergeOptions,
}

impl Merger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge `incoming` into `target` in place.
    ///
    /// Imports are processed first, in source order, then every `const`
    /// statement. The baseline for each binding name comes from the
    /// incoming snippet's history, where later generations win. The target's
    /// cached lists are refreshed before returning.
    pub fn merge(&self, incoming: &Snippet, target: &mut Snippet) -> Result<MergeReport, MergeError> {
        let mut report = MergeReport::default();

        for import in incoming.imports() {
            report.record_import(merge_import(target, incoming, *import)?);
        }

        let history = HistoryIndex::build(incoming.history());
        debug!(baselines = history.len(), "Built history index");
        for statement in incoming.definitions() {
            for outcome in merge_definition(target, incoming, *statement, &history, &self.options)? {
                report.record_definition(outcome);
            }
        }

        target.refresh();
        info!(
            imports_added = report.imports_added,
            specifiers_added = report.specifiers_added,
            inserted = report.inserted.len(),
            replaced = report.replaced.len(),
            skipped = report.skipped.len(),
            conflicts = report.conflicts.len(),
            "Merge complete"
        );
        Ok(report)
    }
}

/// Merge `incoming` into `target` with default options.
pub fn merge_to(incoming: &Snippet, target: &mut Snippet) -> Result<MergeReport, MergeError> {
    Merger::default().merge(incoming, target)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: MergeOptions = serde_json::from_str(r#"{"anchor_fallback":"skip"}"#).unwrap();
        assert!(opts.annotate_conflicts);
        assert!(!opts.annotate_without_history);
        assert_eq!(opts.anchor_fallback, AnchorFallback::Skip);
    }

    #[test]
    fn test_report_collects_every_outcome() {
        let previous = Arc::new(Snippet::new("const cfg = 1;\n").unwrap());
        let incoming = Snippet::builder()
            .history([previous])
            .build("import { a, b } from 'm';\nimport x from 'x';\nconst cfg = 2;\nconst extra = 3;\n")
            .unwrap();
        let mut target = Snippet::new(
            "import { a } from 'm';\nconst cfg = 5;\nexport default function App() {}\n",
        )
        .unwrap();

        let report = merge_to(&incoming, &mut target).unwrap();
        assert_eq!(report.imports_added, 1);
        assert_eq!(report.specifiers_added, 1);
        assert_eq!(report.inserted, vec!["extra".to_string()]);
        assert_eq!(report.replaced, vec!["cfg".to_string()]);
        assert!(report.has_conflicts());
        assert_eq!(report.conflicts[0].existing, "const cfg = 5;");
        assert_eq!(
            target.source(),
            "import { a, b } from 'm';\nimport x from 'x';\n/* const cfg = 5; */\nconst cfg = 2;\nconst extra = 3;\nexport default function App() {}\n"
        );
    }

    #[test]
    fn test_merge_twice_is_stable() {
        let previous = Arc::new(Snippet::new("const cfg = 1;\n").unwrap());
        let incoming = Snippet::builder()
            .history([previous])
            .build("import { a } from 'm';\nconst cfg = 2;\n")
            .unwrap();
        let mut target = Snippet::new("const cfg = 5;\n").unwrap();

        incoming.merge_to(&mut target).unwrap();
        let once = target.source();
        let report = incoming.merge_to(&mut target).unwrap();
        assert_eq!(target.source(), once);
        assert!(!report.has_conflicts());
        assert_eq!(report.imports_added, 0);
    }

    #[test]
    fn test_cached_lists_are_current_after_merge() {
        let incoming = Snippet::new("import x from 'x';\nconst b = 2, c = 3;\n").unwrap();
        let mut target = Snippet::new("const a = 1, b = 1;\n").unwrap();
        merge_to(&incoming, &mut target).unwrap();

        assert_eq!(target.imports().len(), 1);
        assert_eq!(target.definitions().len(), 3);
        for name in ["a", "b", "c"] {
            assert!(target.find_binding(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_report_serializes() {
        let incoming = Snippet::new("const a = 1;\n").unwrap();
        let mut target = Snippet::new("const b = 1;\n").unwrap();
        let report = merge_to(&incoming, &mut target).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["inserted"][0], "a");
        assert_eq!(json["conflicts"].as_array().map(Vec::len), Some(0));
    }
}
