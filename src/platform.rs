//! Thin wrappers over platform facilities: the shared temp directory,
//! file-age queries, atomic create/write primitives, environment expansion,
//! and the glob-based cleanup sweep.
//!
//! Lock and state files from every invocation live in one temp directory and
//! are coordinated purely through these atomic primitives.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::errors::{AppError, AppResult};

/// Platform temp directory shared by all invocations.
pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

/// Modification time of a file as a Unix timestamp. `None` when the file is
/// missing or the mtime cannot be read.
pub fn file_mtime(path: &Path) -> Option<i64> {
    let metadata = fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(since_epoch.as_secs() as i64)
}

/// Age of a file in seconds. `None` when the file is missing or its mtime is
/// unavailable; callers decide whether that counts as fresh or stale.
pub fn file_age(path: &Path) -> Option<i64> {
    file_mtime(path).map(|mtime| current_timestamp() - mtime)
}

/// Creates a file with create-exclusive semantics. Returns `Ok(true)` when
/// this process created it, `Ok(false)` when it already existed.
pub fn atomic_create_file(path: &Path) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    }
}

/// Writes a file atomically: write to a sibling temp file, then rename over
/// the destination.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)
}

/// Removes files in `dir` matching `pattern` whose age exceeds `max_age_secs`.
/// Individual remove failures are ignored; another sweep will get them.
pub fn cleanup_old_files(dir: &Path, pattern: &str, max_age_secs: i64) -> AppResult<()> {
    let full_pattern = dir.join(pattern);
    let entries = glob::glob(&full_pattern.to_string_lossy())
        .map_err(|err| AppError::config(format!("invalid cleanup pattern '{pattern}': {err}")))?;

    for path in entries.flatten() {
        if let Some(age) = file_age(&path) {
            if age > max_age_secs {
                let _ = fs::remove_file(&path);
            }
        }
    }
    Ok(())
}

/// Expands `${VAR}` and `$VAR` references against the process environment.
/// Unset variables expand to the empty string.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
            Some(c) if c.is_ascii_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}
