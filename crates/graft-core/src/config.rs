use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::format::QuoteStyle;
use crate::merger::MergeOptions;
use crate::types::Dialect;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Forced dialect; inferred from file extensions when unset.
    #[serde(default)]
    pub dialect: Option<Dialect>,
    #[serde(default)]
    pub merge: MergeOptions,
    #[serde(default)]
    pub format: FormatSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSettings {
    #[serde(default)]
    pub quote_style: QuoteStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_history_enabled")]
    pub enabled: bool,
    /// Snapshots kept per target.
    #[serde(default = "default_history_keep")]
    pub keep: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            enabled: default_history_enabled(),
            keep: default_history_keep(),
        }
    }
}

fn default_history_enabled() -> bool {
    true
}
fn default_history_keep() -> usize {
    20
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Explicit dialect, else the one implied by `path`, else TSX.
    pub fn dialect_for(&self, path: &Path) -> Dialect {
        self.dialect
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(Dialect::from_extension)
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::AnchorFallback;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"merge":{"annotate_conflicts":false},"history":{"keep":3}}"#)
                .unwrap();
        assert!(!settings.merge.annotate_conflicts);
        assert_eq!(settings.merge.anchor_fallback, AnchorFallback::Append);
        assert!(settings.history.enabled);
        assert_eq!(settings.history.keep, 3);
        assert_eq!(settings.format.quote_style, QuoteStyle::Single);
        assert_eq!(settings.dialect, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.dialect = Some(Dialect::TypeScript);
        settings.format.quote_style = QuoteStyle::Double;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(Settings::load(&dir.path().join("settings.json")).is_err());
    }

    #[test]
    fn test_dialect_for_path() {
        let settings = Settings::default();
        assert_eq!(settings.dialect_for(Path::new("a.js")), Dialect::JavaScript);
        assert_eq!(settings.dialect_for(Path::new("a.ts")), Dialect::TypeScript);
        assert_eq!(settings.dialect_for(Path::new("README")), Dialect::Tsx);

        let forced = Settings {
            dialect: Some(Dialect::JavaScript),
            ..Settings::default()
        };
        assert_eq!(forced.dialect_for(Path::new("a.tsx")), Dialect::JavaScript);
    }
}
