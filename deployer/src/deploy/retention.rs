//! Release retention
//!
//! Keeps the most recently modified releases and deletes the rest, one at a
//! time, stopping at the first failed deletion.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::deploy::executor::{run_command, RemoteExecutor};
use crate::errors::RetentionError;
use crate::filesys::dir::RemoteDir;

/// Releases kept when nothing else is configured
pub const DEFAULT_KEEP: usize = 5;

/// Entry names from `ls -1At` output, newest first
///
/// Blank lines and anything that is not a plain directory entry name are
/// dropped.
pub fn parse_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != ".." && !name.contains('/'))
        .map(str::to_string)
        .collect()
}

/// Entries to delete, in deletion order
///
/// `entries` must be newest first. The first `keep` are retained; `pinned`
/// (the live release) is always retained and counts toward `keep`.
pub fn select_evictions(entries: &[String], keep: usize, pinned: Option<&str>) -> Vec<String> {
    let pinned = pinned.filter(|p| entries.iter().any(|e| e == p));
    let mut budget = keep.saturating_sub(usize::from(pinned.is_some()));

    let mut evicted = Vec::new();
    for entry in entries {
        if Some(entry.as_str()) == pinned {
            continue;
        }
        if budget > 0 {
            budget -= 1;
        } else {
            evicted.push(entry.clone());
        }
    }
    evicted
}

/// List `releases_dir` and delete everything past the newest `keep`
///
/// Returns the names that were removed.
pub async fn enforce(
    executor: &dyn RemoteExecutor,
    releases_dir: &Path,
    keep: usize,
    pinned: Option<&str>,
    timeout: Duration,
) -> Result<Vec<String>, RetentionError> {
    let releases = RemoteDir::new(releases_dir);

    let listing = run_command(executor, &releases.list_by_mtime(), timeout).await?;
    if !listing.success() {
        return Err(RetentionError::List {
            exit_code: listing.exit_code,
        });
    }

    let entries = parse_listing(&listing.output);
    let evicted = select_evictions(&entries, keep, pinned);
    debug!(
        "Found {} releases, keeping {}, evicting {}",
        entries.len(),
        entries.len() - evicted.len(),
        evicted.len()
    );

    let mut removed = Vec::with_capacity(evicted.len());
    for entry in evicted {
        let result = run_command(executor, &releases.join(&entry).remove(), timeout).await?;
        if !result.success() {
            return Err(RetentionError::Remove {
                entry,
                exit_code: result.exit_code,
            });
        }
        info!("Removed old release {}", entry);
        removed.push(entry);
    }

    Ok(removed)
}
