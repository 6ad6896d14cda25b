//! Configuration loading and validation.
//!
//! Config is read once per invocation from `<plugin_root>/config/config.json`.
//! A missing file yields defaults; a partial file is merged over defaults
//! field by field. Environment variables in path and URL fields are expanded
//! before validation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analyzer::Status;
use crate::errors::{AppError, AppResult};
use crate::platform;

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notifications: NotificationsConfig,
    pub statuses: BTreeMap<String, StatusInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationsConfig {
    pub desktop: DesktopConfig,
    pub webhook: WebhookConfig,
    /// Cooldown (seconds) for `question` after a `task_complete` in the same
    /// session.
    pub suppress_question_after_task_complete_seconds: i64,
    /// Cooldown (seconds) for `question` after any notification from the same
    /// session. Zero disables the check.
    pub suppress_question_after_any_notification_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesktopConfig {
    pub enabled: bool,
    pub sound: bool,
    pub volume: f64,
    pub app_icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookConfig {
    pub enabled: bool,
    pub preset: WebhookPreset,
    pub url: String,
    #[serde(rename = "chat_id")]
    pub chat_id: String,
    pub format: PayloadFormat,
    pub headers: HashMap<String, String>,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
}

/// Outbound wire format for webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookPreset {
    Slack,
    Discord,
    Telegram,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

/// Rendering strings for one status tag.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatusInfo {
    pub title: String,
    pub sound: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            desktop: DesktopConfig::default(),
            webhook: WebhookConfig::default(),
            suppress_question_after_task_complete_seconds: 7,
            suppress_question_after_any_notification_seconds: 5,
        }
    }
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            volume: 1.0,
            app_icon: plugin_root_from_env()
                .join("claude_icon.png")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            preset: WebhookPreset::Custom,
            url: String::new(),
            chat_id: String::new(),
            format: PayloadFormat::Json,
            headers: HashMap::new(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 2,
            timeout_seconds: 30,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notifications: NotificationsConfig::default(),
            statuses: default_statuses(),
        }
    }
}

fn plugin_root_from_env() -> PathBuf {
    match std::env::var("CLAUDE_PLUGIN_ROOT") {
        Ok(root) if !root.is_empty() => PathBuf::from(root),
        _ => PathBuf::from("."),
    }
}

fn default_statuses() -> BTreeMap<String, StatusInfo> {
    let sounds_dir = plugin_root_from_env().join("sounds");
    let sound = |file: &str| sounds_dir.join(file).to_string_lossy().into_owned();

    let mut statuses = BTreeMap::new();
    statuses.insert(
        "task_complete".to_string(),
        StatusInfo { title: "✅ Task Completed".to_string(), sound: sound("task-complete.mp3") },
    );
    statuses.insert(
        "review_complete".to_string(),
        StatusInfo { title: "🔍 Review Completed".to_string(), sound: sound("review-complete.mp3") },
    );
    statuses.insert(
        "question".to_string(),
        StatusInfo { title: "❓ Claude Has Questions".to_string(), sound: sound("question.mp3") },
    );
    statuses.insert(
        "plan_ready".to_string(),
        StatusInfo { title: "📋 Plan Ready for Review".to_string(), sound: sound("plan-ready.mp3") },
    );
    statuses.insert(
        "session_limit_reached".to_string(),
        StatusInfo { title: "⏳ Session Limit Reached".to_string(), sound: sound("session-limit.mp3") },
    );
    statuses.insert(
        "api_error_401".to_string(),
        StatusInfo { title: "🔐 Authentication Required".to_string(), sound: sound("session-limit.mp3") },
    );
    statuses
}

impl Config {
    /// Loads configuration from `<plugin_root>/config/config.json`.
    pub fn load_from_plugin_root(plugin_root: &Path) -> AppResult<Self> {
        Self::load(&plugin_root.join("config").join("config.json"))
    }

    /// Loads configuration from an explicit path. Missing file yields
    /// defaults; an unparseable file is a hard error.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !platform::file_exists(path) {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|err| AppError::io(path, "read config file", err))?;
        let mut config: Config = serde_json::from_str(&data)
            .map_err(|err| AppError::config(format!("failed to parse {}: {err}", path.display())))?;

        config.apply_defaults();
        config.expand_env_fields();
        Ok(config)
    }

    /// Fills status-table entries a partial file left out.
    fn apply_defaults(&mut self) {
        for (tag, info) in default_statuses() {
            self.statuses.entry(tag).or_insert(info);
        }
        for info in self.statuses.values_mut() {
            if info.title.is_empty() {
                info.title = "Claude Code notification".to_string();
            }
        }
    }

    fn expand_env_fields(&mut self) {
        let desktop = &mut self.notifications.desktop;
        desktop.app_icon = platform::expand_env(&desktop.app_icon);
        self.notifications.webhook.url = platform::expand_env(&self.notifications.webhook.url);
        for info in self.statuses.values_mut() {
            info.sound = platform::expand_env(&info.sound);
        }
    }

    /// Validates cross-field constraints the type system cannot express.
    pub fn validate(&self) -> AppResult<()> {
        let notifications = &self.notifications;
        let webhook = &notifications.webhook;

        if webhook.enabled {
            if webhook.url.is_empty() {
                return Err(AppError::config("webhook URL is required when webhooks are enabled"));
            }
            url::Url::parse(&webhook.url)
                .map_err(|err| AppError::config(format!("invalid webhook URL: {err}")))?;
            if webhook.preset == WebhookPreset::Telegram && webhook.chat_id.is_empty() {
                return Err(AppError::config("chat_id is required for the telegram preset"));
            }
        }

        if notifications.suppress_question_after_task_complete_seconds < 0 {
            return Err(AppError::config(
                "suppressQuestionAfterTaskCompleteSeconds must be >= 0",
            ));
        }
        if notifications.suppress_question_after_any_notification_seconds < 0 {
            return Err(AppError::config(
                "suppressQuestionAfterAnyNotificationSeconds must be >= 0",
            ));
        }

        let volume = notifications.desktop.volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(AppError::config(format!("desktop volume must be within [0, 1], got {volume}")));
        }

        if webhook.retry.max_attempts == 0 {
            return Err(AppError::config("retry maxAttempts must be >= 1"));
        }
        if webhook.retry.multiplier < 1.0 {
            return Err(AppError::config("retry multiplier must be >= 1.0"));
        }
        if webhook.circuit_breaker.failure_threshold == 0
            || webhook.circuit_breaker.success_threshold == 0
        {
            return Err(AppError::config("circuit breaker thresholds must be >= 1"));
        }
        if webhook.rate_limit.enabled && webhook.rate_limit.requests_per_minute == 0 {
            return Err(AppError::config("rate limit requestsPerMinute must be >= 1"));
        }

        Ok(())
    }

    /// Title for a status, falling back to the bare tag when the table has
    /// no entry.
    pub fn status_title(&self, status: Status) -> String {
        self.statuses
            .get(status.as_str())
            .map(|info| info.title.clone())
            .unwrap_or_else(|| status.as_str().to_string())
    }

    pub fn status_info(&self, status: Status) -> Option<&StatusInfo> {
        self.statuses.get(status.as_str())
    }

    pub fn is_desktop_enabled(&self) -> bool {
        self.notifications.desktop.enabled
    }

    pub fn is_webhook_enabled(&self) -> bool {
        self.notifications.webhook.enabled
    }

    pub fn is_any_notification_enabled(&self) -> bool {
        self.is_desktop_enabled() || self.is_webhook_enabled()
    }
}
