use std::path::{Path, PathBuf};

/// Generated snapshots recorded per merge target.
///
/// Each target gets a directory under `<base>/history/` holding one
/// `<millis>.snap` file per generation. Writes go through tmp+rename so a
/// half-written snapshot is never listed.
pub struct HistoryDir {
    pub root: PathBuf,
}

impl HistoryDir {
    pub fn new(base: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = base.as_ref().join("history");
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory name for a target path.
    ///
    /// The path is canonicalized when it exists, so every spelling of the
    /// same file shares one key. Bytes outside `[A-Za-z0-9.-]` are written
    /// as `_XX` hex, which keeps distinct paths distinct.
    pub fn key(target: &Path) -> String {
        let resolved = std::fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());
        let mut key = String::new();
        for byte in resolved.to_string_lossy().bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
                key.push(char::from(byte));
            } else {
                key.push_str(&format!("_{:02X}", byte));
            }
        }
        key
    }

    fn dir_for(&self, target: &Path) -> PathBuf {
        self.root.join(Self::key(target))
    }

    /// Snapshot files for `target`, oldest first.
    pub fn list(&self, target: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.dir_for(target);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(i64, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("snap") {
                continue;
            }
            let stamp = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i64>().ok());
            match stamp {
                Some(stamp) => entries.push((stamp, path)),
                None => tracing::warn!(path = %path.display(), "Ignoring unrecognized history file"),
            }
        }
        entries.sort_by_key(|(stamp, _)| *stamp);
        Ok(entries.into_iter().map(|(_, p)| p).collect())
    }

    /// Contents of every snapshot for `target`, oldest first.
    pub fn load(&self, target: &Path) -> anyhow::Result<Vec<String>> {
        self.list(target)?
            .iter()
            .map(|p| Ok(std::fs::read_to_string(p)?))
            .collect()
    }

    /// Record a new generation for `target` and trim to `keep` entries.
    pub fn record(&self, target: &Path, content: &str, keep: usize) -> anyhow::Result<PathBuf> {
        let dir = self.dir_for(target);
        std::fs::create_dir_all(&dir)?;

        // Never reuse a stamp, even within the same millisecond.
        let latest = self
            .list(target)?
            .last()
            .and_then(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .and_then(|s| s.parse::<i64>().ok());
        let mut stamp = chrono::Utc::now().timestamp_millis();
        if let Some(latest) = latest {
            stamp = stamp.max(latest + 1);
        }

        let filename = format!("{}.snap", stamp);
        let path = dir.join(&filename);
        let tmp = dir.join(format!(".{}.tmp", filename));
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), "Recorded history snapshot");

        self.trim(target, keep)?;
        Ok(path)
    }

    /// Delete the oldest snapshots beyond `keep`. Returns how many went.
    pub fn trim(&self, target: &Path, keep: usize) -> anyhow::Result<usize> {
        let entries = self.list(target)?;
        let excess = entries.len().saturating_sub(keep);
        for path in &entries[..excess] {
            std::fs::remove_file(path)?;
        }
        Ok(excess)
    }
}
