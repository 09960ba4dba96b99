//! Walk a local directory tree into file records.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use xdbp_core::FileRecord;

/// Which entries to include.
#[derive(Debug, Clone, Default)]
pub struct WalkConfig {
    /// Include hidden files and directories (dotfiles/dotdirs)
    pub include_hidden: bool,
    /// Glob patterns matched against entry names
    pub exclude_patterns: Vec<String>,
}

/// Collect directories and regular files under `root`, sorted so that a
/// directory always precedes its contents.
pub fn collect_paths(root: &Path, config: &WalkConfig) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let excludes: Vec<glob::Pattern> = config
        .exclude_patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();
    collect_inner(root, &mut paths, config, &excludes)?;
    paths.sort();
    Ok(paths)
}

fn collect_inner(
    dir: &Path,
    out: &mut Vec<PathBuf>,
    config: &WalkConfig,
    excludes: &[glob::Pattern],
) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading dir: {}", dir.display()))? {
        let entry = entry.context("reading dir entry")?;
        let path = entry.path();
        let meta = entry.metadata().context("stat dir entry")?;

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if excludes.iter().any(|p| p.matches(name)) {
            debug!(path = %path.display(), "excluded");
            continue;
        }
        if name.starts_with('.') && !config.include_hidden {
            continue;
        }

        if meta.is_dir() {
            out.push(path.clone());
            collect_inner(&path, out, config, excludes)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Load every collected path under `root` as a record.
pub async fn collect_records(root: &Path, config: &WalkConfig) -> Result<Vec<FileRecord>> {
    let paths = collect_paths(root, config)?;
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let record = FileRecord::load(root, &path)
            .await
            .with_context(|| format!("loading: {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}
