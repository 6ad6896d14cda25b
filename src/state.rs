//! Per-session state with cooldown bookkeeping.
//!
//! One JSON record per session in the shared temp directory, rewritten
//! atomically on every mutation. Records are ephemeral: anything older than
//! a minute is garbage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analyzer::Status;
use crate::errors::{AppError, AppResult};
use crate::platform;

/// State files older than this are swept opportunistically.
pub const STATE_TTL_SECS: i64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub session_id: String,
    pub last_interactive_tool: String,
    pub last_cwd: String,
    /// Epoch seconds of the most recent state write.
    pub last_ts: i64,
    /// Epoch seconds of the last task_complete classification.
    pub last_task_complete_ts: i64,
    pub last_notification_ts: i64,
    pub last_notification_status: String,
}

pub struct StateManager {
    temp_dir: PathBuf,
}

impl StateManager {
    pub fn new() -> Self {
        Self { temp_dir: platform::temp_dir() }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { temp_dir: dir.into() }
    }

    fn state_path(&self, session_id: &str) -> PathBuf {
        self.temp_dir
            .join(format!("claude-session-state-{session_id}.json"))
    }

    /// Loads the state record for a session. Missing file is `None`; a
    /// corrupt record is treated as absent rather than fatal.
    pub fn load(&self, session_id: &str) -> AppResult<Option<SessionState>> {
        let path = self.state_path(session_id);
        if !platform::file_exists(&path) {
            return Ok(None);
        }

        let data = std::fs::read_to_string(&path)
            .map_err(|err| AppError::io(&path, "read session state", err))?;
        match serde_json::from_str(&data) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding corrupt session state");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &SessionState) -> AppResult<()> {
        let path = self.state_path(&state.session_id);
        let data = serde_json::to_vec(state)
            .map_err(|err| AppError::config(format!("failed to encode session state: {err}")))?;
        platform::atomic_write(&path, &data)
            .map_err(|err| AppError::io(&path, "write session state", err))
    }

    fn load_or_new(&self, session_id: &str) -> AppResult<SessionState> {
        Ok(self.load(session_id)?.unwrap_or_else(|| SessionState {
            session_id: session_id.to_string(),
            ..SessionState::default()
        }))
    }

    /// Records an imminent interactive tool (pre-tool hook path).
    pub fn update_interactive_tool(
        &self,
        session_id: &str,
        tool_name: &str,
        cwd: &str,
    ) -> AppResult<()> {
        let mut state = self.load_or_new(session_id)?;
        state.last_interactive_tool = tool_name.to_string();
        state.last_cwd = cwd.to_string();
        state.last_ts = platform::current_timestamp();
        self.save(&state)
    }

    pub fn update_task_complete(&self, session_id: &str) -> AppResult<()> {
        let mut state = self.load_or_new(session_id)?;
        let now = platform::current_timestamp();
        state.last_task_complete_ts = now;
        state.last_ts = now;
        self.save(&state)
    }

    pub fn update_last_notification(&self, session_id: &str, status: Status) -> AppResult<()> {
        let mut state = self.load_or_new(session_id)?;
        let now = platform::current_timestamp();
        state.last_notification_ts = now;
        state.last_notification_status = status.as_str().to_string();
        state.last_ts = now;
        self.save(&state)
    }

    /// True when a task_complete happened within the window. Must be checked
    /// before `update_last_notification` so an event cannot suppress itself.
    pub fn should_suppress_question_after_task_complete(
        &self,
        session_id: &str,
        window_seconds: i64,
    ) -> AppResult<bool> {
        if window_seconds <= 0 {
            return Ok(false);
        }
        let Some(state) = self.load(session_id)? else {
            return Ok(false);
        };
        if state.last_task_complete_ts == 0 {
            return Ok(false);
        }
        Ok(platform::current_timestamp() - state.last_task_complete_ts < window_seconds)
    }

    /// True when any notification was sent within the window.
    pub fn should_suppress_question_after_any_notification(
        &self,
        session_id: &str,
        window_seconds: i64,
    ) -> AppResult<bool> {
        if window_seconds <= 0 {
            return Ok(false);
        }
        let Some(state) = self.load(session_id)? else {
            return Ok(false);
        };
        if state.last_notification_ts == 0 {
            return Ok(false);
        }
        Ok(platform::current_timestamp() - state.last_notification_ts < window_seconds)
    }

    /// Removes state files older than `max_age_secs`.
    pub fn cleanup(&self, max_age_secs: i64) -> AppResult<()> {
        platform::cleanup_old_files(&self.temp_dir, "claude-session-state-*.json", max_age_secs)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
