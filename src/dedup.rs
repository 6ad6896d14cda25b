//! Inter-process deduplication via two-phase filesystem locking.
//!
//! The host can fire the same hook 2-4 times for one logical event. Phase 1
//! is a cheap existence check before any work; phase 2 is an exclusive
//! create right before sending. Locks are never released — they age out,
//! which keeps siblings silenced for the whole window even after the winner
//! has exited.

use std::fs;
use std::path::PathBuf;
#[cfg(test)]
use std::path::Path;

use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::platform;

/// A lock younger than this blocks sibling invocations.
pub const FRESH_LOCK_SECS: i64 = 2;

pub struct DedupManager {
    temp_dir: PathBuf,
}

impl DedupManager {
    pub fn new() -> Self {
        Self { temp_dir: platform::temp_dir() }
    }

    /// Uses an explicit directory instead of the platform temp dir.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { temp_dir: dir.into() }
    }

    fn lock_path(&self, hook_event: &str, session_id: &str) -> PathBuf {
        self.temp_dir
            .join(format!("claude-notification-{hook_event}-{session_id}.lock"))
    }

    /// Phase 1: returns true when a sibling already holds a fresh lock.
    /// An unreadable mtime counts as fresh — the conservative default.
    pub fn check_early_duplicate(&self, hook_event: &str, session_id: &str) -> bool {
        let path = self.lock_path(hook_event, session_id);
        if !platform::file_exists(&path) {
            return false;
        }
        match platform::file_age(&path) {
            None => true,
            Some(age) => age < FRESH_LOCK_SECS,
        }
    }

    /// Phase 2: attempts an exclusive create. A fresh existing lock loses;
    /// a stale one is removed and the create retried once.
    pub fn acquire_lock(&self, hook_event: &str, session_id: &str) -> AppResult<bool> {
        let path = self.lock_path(hook_event, session_id);

        let created = platform::atomic_create_file(&path)
            .map_err(|err| AppError::io(&path, "create lock file", err))?;
        if created {
            return Ok(true);
        }

        if let Some(age) = platform::file_age(&path) {
            if age < FRESH_LOCK_SECS {
                return Ok(false);
            }
        }

        // Stale lock. A sibling may remove it first; the retry below settles
        // who wins.
        let _ = fs::remove_file(&path);
        debug!(lock = %path.display(), "replaced stale lock");

        platform::atomic_create_file(&path)
            .map_err(|err| AppError::io(&path, "create lock file after cleanup", err))
    }

    /// Removes lock files older than `max_age_secs`.
    pub fn cleanup(&self, max_age_secs: i64) -> AppResult<()> {
        platform::cleanup_old_files(&self.temp_dir, "claude-notification-*.lock", max_age_secs)
    }
}

impl Default for DedupManager {
    fn default() -> Self {
        Self::new()
    }
}
