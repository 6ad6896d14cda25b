//! Hook dispatcher: one invocation, one classification, one dispatch.
//!
//! Ordering matters throughout `handle`: the phase-1 duplicate check runs
//! before any work, cooldown checks run before the notification-time write
//! (so an event cannot suppress itself), and the phase-2 lock is taken
//! before either. On the suppressed-question path the lock is deliberately
//! kept: it consumes the dedup slot but correctly silences siblings for the
//! full window.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::analyzer::{self, Status};
use crate::config::Config;
use crate::dedup::DedupManager;
use crate::errors::{AppError, AppResult};
use crate::notifier::DesktopNotifier;
use crate::platform;
use crate::session_name;
use crate::state::StateManager;
use crate::summary;
use crate::webhook::WebhookSender;

/// Lock and state files older than this are swept after a dispatch.
const CLEANUP_MAX_AGE_SECS: i64 = 60;

/// How long the process waits for in-flight webhook sends before exiting.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Closed set of hook kinds this binary accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    PreToolUse,
    Notification,
    Stop,
    SubagentStop,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::Notification => "Notification",
            HookEvent::Stop => "Stop",
            HookEvent::SubagentStop => "SubagentStop",
        }
    }
}

impl FromStr for HookEvent {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PreToolUse" => Ok(HookEvent::PreToolUse),
            "Notification" => Ok(HookEvent::Notification),
            "Stop" => Ok(HookEvent::Stop),
            "SubagentStop" => Ok(HookEvent::SubagentStop),
            other => Err(AppError::UnknownHookEvent(other.to_string())),
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The per-invocation record read from stdin. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub hook_event_name: String,
}

pub struct Handler {
    config: Config,
    dedup: DedupManager,
    state: StateManager,
    desktop: DesktopNotifier,
    webhook: WebhookSender,
}

impl Handler {
    /// Loads and validates config from the plugin root, then wires up the
    /// managers and delivery engines.
    pub fn new(plugin_root: &Path) -> AppResult<Self> {
        let config = Config::load_from_plugin_root(plugin_root)?;
        config.validate()?;

        let desktop = DesktopNotifier::new(&config);
        let webhook = WebhookSender::new(&config)?;

        Ok(Self {
            config,
            dedup: DedupManager::new(),
            state: StateManager::new(),
            desktop,
            webhook,
        })
    }

    #[cfg(test)]
    fn with_temp_dir(config: Config, temp_dir: &Path) -> AppResult<Self> {
        let desktop = DesktopNotifier::new(&config);
        let webhook = WebhookSender::new(&config)?;
        Ok(Self {
            config,
            dedup: DedupManager::with_dir(temp_dir),
            state: StateManager::with_dir(temp_dir),
            desktop,
            webhook,
        })
    }

    /// Handles one hook invocation. Returns `Ok(())` for every outcome
    /// except undecodable input and lock-creation IO failures.
    pub async fn handle(&self, hook_event: HookEvent, input: impl Read) -> AppResult<()> {
        let span = tracing::info_span!("hook", pid = std::process::id(), event = %hook_event);
        let _entered = span.enter();
        debug!("hook triggered");

        let mut hook_data: HookInput = serde_json::from_reader(input)
            .map_err(|err| AppError::BadInput(err.to_string()))?;

        if hook_data.session_id.is_empty() {
            warn!("session id is empty, using 'unknown'");
            hook_data.session_id = "unknown".to_string();
        }
        let session_id = hook_data.session_id.clone();
        debug!(
            session = %session_id,
            transcript = %hook_data.transcript_path,
            tool = %hook_data.tool_name,
            "hook data decoded"
        );

        // Phase 1: cheap duplicate rejection before any real work.
        if self.dedup.check_early_duplicate(hook_event.as_str(), &session_id) {
            debug!("early duplicate detected, skipping");
            return Ok(());
        }

        if !self.config.is_any_notification_enabled() {
            debug!("all notification methods disabled, exiting");
            return Ok(());
        }

        let status = match hook_event {
            HookEvent::PreToolUse => self.handle_pre_tool_use(&hook_data),
            // The host only fires Notification when it needs user input.
            HookEvent::Notification => Status::Question,
            HookEvent::Stop | HookEvent::SubagentStop => self.handle_stop(&hook_data),
        };

        if status == Status::Unknown {
            debug!("status unknown, no notification");
            return Ok(());
        }

        // Phase 2: exclusive lock right before the send. Never released;
        // it ages out to keep rapid siblings silenced.
        if !self.dedup.acquire_lock(hook_event.as_str(), &session_id)? {
            debug!("lock already held, duplicate skipped");
            return Ok(());
        }

        if status == Status::Question && self.question_is_suppressed(&session_id) {
            self.cleanup_aged_files();
            return Ok(());
        }

        if status == Status::TaskComplete {
            if let Err(err) = self.state.update_task_complete(&session_id) {
                warn!(error = %err, "failed to record task completion");
            }
        }

        // After the suppression checks, not before.
        if let Err(err) = self.state.update_last_notification(&session_id, status) {
            warn!(error = %err, "failed to record notification time");
        }

        let message = self.build_message(&hook_data, status);
        info!(status = %status, message = %message, "dispatching notification");
        self.dispatch(status, &message, &session_id);

        self.cleanup_aged_files();
        debug!("hook completed");
        Ok(())
    }

    /// Waits for in-flight webhook deliveries before process exit.
    pub async fn shutdown(&self) {
        self.webhook.shutdown(SHUTDOWN_TIMEOUT).await;
    }

    /// Sends a synthetic notification through every enabled channel,
    /// synchronously. Operator verification path for the `test` subcommand.
    pub async fn send_test(&self, status: Status, message: &str) -> AppResult<()> {
        let session_id = "test-session";
        let message = format!("[{}] {message}", session_name::generate(session_id));

        if self.config.is_desktop_enabled() {
            self.desktop.send(status, &message)?;
        }
        if self.config.is_webhook_enabled() {
            self.webhook.send(status, &message, session_id).await?;
        }
        Ok(())
    }

    fn handle_pre_tool_use(&self, hook_data: &HookInput) -> Status {
        let status = analyzer::classify_pretool(&hook_data.tool_name);

        // Written before the notification goes out so a racing Notification
        // hook can observe the interactive tool.
        if status == Status::PlanReady || status == Status::Question {
            if let Err(err) = self.state.update_interactive_tool(
                &hook_data.session_id,
                &hook_data.tool_name,
                &hook_data.cwd,
            ) {
                warn!(error = %err, "failed to record interactive tool");
            }
        }

        status
    }

    fn handle_stop(&self, hook_data: &HookInput) -> Status {
        if hook_data.transcript_path.is_empty() {
            warn!("transcript path is empty, skipping notification");
            return Status::Unknown;
        }
        let path = PathBuf::from(&hook_data.transcript_path);
        if !platform::file_exists(&path) {
            warn!(path = %path.display(), "transcript file not found");
            return Status::Unknown;
        }

        match crate::transcript::parse_file(&path) {
            Ok(records) => {
                let status = analyzer::classify(&records);
                debug!(status = %status, "transcript classified");
                status
            }
            Err(err) => {
                warn!(error = %err, "failed to parse transcript");
                Status::Unknown
            }
        }
    }

    fn question_is_suppressed(&self, session_id: &str) -> bool {
        let notifications = &self.config.notifications;

        match self.state.should_suppress_question_after_any_notification(
            session_id,
            notifications.suppress_question_after_any_notification_seconds,
        ) {
            Ok(true) => {
                debug!("question suppressed: recent notification from this session");
                return true;
            }
            Ok(false) => {}
            Err(err) => warn!(error = %err, "cooldown check failed"),
        }

        match self.state.should_suppress_question_after_task_complete(
            session_id,
            notifications.suppress_question_after_task_complete_seconds,
        ) {
            Ok(true) => {
                debug!("question suppressed: cooldown after task complete");
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(error = %err, "cooldown check failed");
                false
            }
        }
    }

    fn build_message(&self, hook_data: &HookInput, status: Status) -> String {
        let base = if !hook_data.transcript_path.is_empty()
            && platform::file_exists(Path::new(&hook_data.transcript_path))
        {
            summary::generate_from_transcript(
                Path::new(&hook_data.transcript_path),
                status,
                &self.config,
            )
        } else {
            summary::generate_simple(status, &self.config)
        };

        let slug = session_name::generate(&hook_data.session_id);
        format!("[{slug}] {base}")
    }

    fn dispatch(&self, status: Status, message: &str, session_id: &str) {
        if self.config.is_desktop_enabled() {
            if let Err(err) = self.desktop.send(status, message) {
                warn!(error = %err, "desktop notification failed");
            }
        }

        if self.config.is_webhook_enabled() {
            self.webhook
                .send_async(status, message.to_string(), session_id.to_string());
        }
    }

    fn cleanup_aged_files(&self) {
        if let Err(err) = self.dedup.cleanup(CLEANUP_MAX_AGE_SECS) {
            warn!(error = %err, "lock cleanup failed");
        }
        if let Err(err) = self.state.cleanup(CLEANUP_MAX_AGE_SECS) {
            warn!(error = %err, "state cleanup failed");
        }
    }
}
