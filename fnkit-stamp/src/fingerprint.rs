//! Path + mtime fingerprint of a function's source tree.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use fnkit_core::paths::RUN_DATA_DIR;

use crate::error::{io_err, StampError};

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[RUN_DATA_DIR, ".git", ".hg", ".svn"];

/// SHA-256 over the ordered `(relative path, mtime)` sequence, plus the
/// human-readable log of entries that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub log: String,
}

/// Fingerprint the tree rooted at `root`.
///
/// Entries are visited depth-first in lexical order so the result is stable
/// across platforms. Directories contribute their own mtime, which is what
/// makes additions and removals visible.
pub fn fingerprint(root: &Path) -> Result<Fingerprint, StampError> {
    let mut hasher = Sha256::new();
    let mut log = String::new();

    for (rel, mtime) in walk(root)? {
        let rel = rel.to_string_lossy().replace('\\', "/");
        hasher.update(format!("{rel}:{mtime}:").as_bytes());
        log.push_str(&format!("{rel}:{mtime}\n"));
    }

    Ok(Fingerprint {
        hash: hex::encode(hasher.finalize()),
        log,
    })
}

fn walk(root: &Path) -> Result<Vec<(PathBuf, u128)>, StampError> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut children: Vec<_> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .collect::<Result<_, _>>()
            .map_err(|e| io_err(&dir, e))?;
        children.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for child in children {
            let path = child.path();
            let meta = std::fs::symlink_metadata(&path).map_err(|e| io_err(&path, e))?;
            let name = child.file_name();
            if meta.is_dir() && IGNORED_DIRS.iter().any(|d| name == *d) {
                continue;
            }
            let mtime = meta.modified().map_err(|e| io_err(&path, e))?;
            let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            entries.push((rel, unix_nanos(mtime)));
            if meta.is_dir() {
                subdirs.push(path);
            }
        }
        // Reverse so the stack pops subdirectories in lexical order.
        stack.extend(subdirs.into_iter().rev());
    }
    Ok(entries)
}

fn unix_nanos(timestamp: SystemTime) -> u128 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
