//! Directory scanning and ordering for captured media.
//!
//! Keeps a catalog of every file discovered under the watched root, ordered
//! by capture time, plus the set of files already handled by the loop.

use crate::Result;
use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "avif"];

/// Still image, as opposed to a clip, by file extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

/// Human-readable capture timestamp for logs.
pub fn human_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[derive(Default)]
pub struct MediaCatalog {
    files: HashMap<PathBuf, SystemTime>,
    seen: HashSet<PathBuf>,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the tree under `root` and record any files not yet cataloged.
    /// Returns how many new files were discovered.
    pub fn scan(&mut self, root: &Path) -> Result<usize> {
        let mut found = 0;
        self.scan_dir(root, &mut found)?;
        Ok(found)
    }

    fn scan_dir(&mut self, dir: &Path, found: &mut usize) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                self.scan_dir(&path, found)?;
            } else if !self.files.contains_key(&path) {
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };
                let time = metadata
                    .created()
                    .or_else(|_| metadata.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                tracing::debug!("found new file: {} ({})", path.display(), human_time(time));
                self.files.insert(path, time);
                *found += 1;
            }
        }
        Ok(())
    }

    /// All cataloged files, oldest first. Path is the tiebreak so ordering
    /// stays stable when timestamps collide.
    pub fn ordered(&self) -> Vec<PathBuf> {
        let mut entries: Vec<(&PathBuf, &SystemTime)> = self.files.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(path, _)| path.clone()).collect()
    }

    /// The newest `lookback` files.
    pub fn latest(&self, lookback: usize) -> Vec<PathBuf> {
        let ordered = self.ordered();
        let skip = ordered.len().saturating_sub(lookback);
        ordered[skip..].to_vec()
    }

    /// Still images among the newest `tail` files, oldest first.
    pub fn latest_images(&self, tail: usize) -> Vec<PathBuf> {
        let ordered = self.ordered();
        let skip = ordered.len().saturating_sub(tail);
        ordered[skip..]
            .iter()
            .filter(|path| is_image(path))
            .cloned()
            .collect()
    }

    pub fn unseen(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths
            .iter()
            .filter(|path| !self.seen.contains(*path))
            .cloned()
            .collect()
    }

    pub fn mark_seen(&mut self, path: &Path) {
        self.seen.insert(path.to_path_buf());
    }
}
