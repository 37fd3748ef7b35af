//! Build staleness signal.
//!
//! Signal precedence:
//! 1. `NeverBuilt` (no stamp recorded)
//! 2. `Stale` (the tree's fingerprint no longer matches the stamp)
//! 3. `Current`

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::fingerprint::fingerprint;
use crate::store;
use crate::StampError;

/// Build staleness classification for a function root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StalenessSignal {
    NeverBuilt,
    Current,
    Stale { reason: String },
}

/// Whether the function at `root` was built and has not changed since.
pub fn built(root: &Path) -> Result<bool, StampError> {
    Ok(check(root)? == StalenessSignal::Current)
}

/// Compare the recorded stamp at `root` against a fresh fingerprint.
pub fn check(root: &Path) -> Result<StalenessSignal, StampError> {
    let Some(recorded) = store::load(root)? else {
        return Ok(StalenessSignal::NeverBuilt);
    };
    let current = fingerprint(root)?;
    if current.hash == recorded.hash {
        return Ok(StalenessSignal::Current);
    }
    tracing::debug!(
        "{} changed since last build ({} -> {})",
        root.display(),
        recorded.hash,
        current.hash
    );
    Ok(StalenessSignal::Stale {
        reason: format!(
            "sources changed since the build {} ago",
            format_datetime_age(recorded.stamped_at)
        ),
    })
}

/// Format age from a chrono timestamp (stamp `stamped_at`).
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let now = Utc::now();
    let age = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_duration(Duration::from_secs(age))
}

fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
