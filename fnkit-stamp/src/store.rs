//! Stamp store: the fingerprint recorded at the last successful build.
//!
//! Persists a [`StampFile`] JSON document at `<root>/.func/built-hash` and,
//! when journaling, the fingerprint log at `<root>/.func/built-log`.
//! Writes use the atomic `.tmp` + rename pattern. A bare hash left at
//! `<root>/.func/built` by older tooling is still read when no
//! `built-hash` exists.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fnkit_core::paths::run_data_dir;

use crate::error::{io_err, StampError};
use crate::fingerprint::fingerprint;

pub const STAMP_FILE: &str = "built-hash";
pub const JOURNAL_FILE: &str = "built-log";
pub const LEGACY_STAMP_FILE: &str = "built";

/// On-disk stamp payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StampFile {
    pub hash: String,
    pub stamped_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StampCompat {
    Structured(StampStructuredCompat),
    Legacy(String),
}

#[derive(Debug, Deserialize)]
struct StampStructuredCompat {
    pub hash: String,
    pub stamped_at: Option<DateTime<Utc>>,
}

/// `<root>/.func/built-hash`
pub fn stamp_path(root: &Path) -> PathBuf {
    run_data_dir(root).join(STAMP_FILE)
}

/// `<root>/.func/built`
pub fn legacy_stamp_path(root: &Path) -> PathBuf {
    run_data_dir(root).join(LEGACY_STAMP_FILE)
}

/// `<root>/.func/built-log`
pub fn journal_path(root: &Path) -> PathBuf {
    run_data_dir(root).join(JOURNAL_FILE)
}

/// Load the stamp for the function at `root`, if one was ever written.
///
/// Falls back to the legacy `built` file; bare hex digests are accepted in
/// either.
pub fn load(root: &Path) -> Result<Option<StampFile>, StampError> {
    match read_stamp(&stamp_path(root))? {
        Some(stamp) => Ok(Some(stamp)),
        None => read_stamp(&legacy_stamp_path(root)),
    }
}

fn read_stamp(path: &Path) -> Result<Option<StampFile>, StampError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let compat = match serde_json::from_str::<StampCompat>(trimmed) {
        Ok(compat) => compat,
        Err(_) if is_hex_digest(trimmed) => StampCompat::Legacy(trimmed.to_string()),
        Err(err) => return Err(err.into()),
    };
    let stamp = match compat {
        StampCompat::Structured(stamp) => StampFile {
            hash: stamp.hash,
            stamped_at: stamp.stamped_at.unwrap_or_else(|| modified_at(path)),
        },
        StampCompat::Legacy(hash) => StampFile {
            stamped_at: modified_at(path),
            hash,
        },
    };
    Ok(Some(stamp))
}

/// Fingerprint `root` and persist the result as its stamp.
///
/// With `journal`, the fingerprint log is written alongside for debugging
/// unexpected rebuilds; otherwise any stale journal is removed.
pub fn stamp(root: &Path, journal: bool) -> Result<StampFile, StampError> {
    let fp = fingerprint(root)?;
    let dir = run_data_dir(root);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let stamp = StampFile {
        hash: fp.hash,
        stamped_at: Utc::now(),
    };
    let json = serde_json::to_string_pretty(&stamp)?;
    write_atomic(&stamp_path(root), &json)?;

    let journal_file = journal_path(root);
    if journal {
        write_atomic(&journal_file, &fp.log)?;
    } else {
        match std::fs::remove_file(&journal_file) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&journal_file, err)),
        }
    }

    tracing::debug!("stamped {} with {}", root.display(), stamp.hash);
    Ok(stamp)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), StampError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{name}.tmp"));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

fn is_hex_digest(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}
