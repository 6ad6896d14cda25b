//! Desktop notification adapter.
//!
//! Thin, fire-and-forget wrapper over the platform notification service.
//! A leading `[session-name]` in the message is moved into the title so the
//! body stays clean. Failures are returned for the dispatcher to log; they
//! never fail the dispatch. Sound playback is handled by the platform
//! renderer; this adapter only forwards the configured hint.

use crate::analyzer::Status;
use crate::config::Config;
use crate::errors::{AppError, AppResult};

pub struct DesktopNotifier {
    app_icon: String,
    sound_enabled: bool,
    titles: std::collections::BTreeMap<String, String>,
}

impl DesktopNotifier {
    pub fn new(config: &Config) -> Self {
        Self {
            app_icon: config.notifications.desktop.app_icon.clone(),
            sound_enabled: config.notifications.desktop.sound,
            titles: config
                .statuses
                .iter()
                .map(|(tag, info)| (tag.clone(), info.title.clone()))
                .collect(),
        }
    }

    /// Sends a desktop notification for a classified status.
    pub fn send(&self, status: Status, message: &str) -> AppResult<()> {
        let (title, body) = self.compose(status, message);

        let mut notification = notify_rust::Notification::new();
        notification.summary(&title).body(body).appname("Claude Code");
        if !self.app_icon.is_empty() {
            notification.icon(&self.app_icon);
        }
        if self.sound_enabled {
            notification.sound_name("message-new-instant");
        }

        notification
            .show()
            .map(|_| ())
            .map_err(|err| AppError::Desktop(err.to_string()))
    }

    /// Renders the notification title and body: the session name moves from
    /// the message into the title.
    fn compose<'a>(&self, status: Status, message: &'a str) -> (String, &'a str) {
        let (session_name, body) = split_session_name(message);

        let base_title = self
            .titles
            .get(status.as_str())
            .cloned()
            .unwrap_or_else(|| "Claude Code".to_string());
        let title = match session_name {
            Some(name) => format!("{base_title} [{name}]"),
            None => base_title,
        };
        (title, body)
    }
}

/// Splits a leading `[name] ` prefix from a message.
fn split_session_name(message: &str) -> (Option<&str>, &str) {
    let Some(rest) = message.strip_prefix('[') else {
        return (None, message);
    };
    let Some(end) = rest.find(']') else {
        return (None, message);
    };
    let name = &rest[..end];
    if name.is_empty() || name.contains('[') {
        return (None, message);
    }
    (Some(name), rest[end + 1..].trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn title_carries_status_and_session_name() {
        let notifier = DesktopNotifier::new(&Config::default());
        let (title, body) =
            notifier.compose(Status::PlanReady, "[bold-cat] Plan is ready for review");
        assert_eq!(title, "📋 Plan Ready for Review [bold-cat]");
        assert_eq!(body, "Plan is ready for review");
    }

    #[test]
    fn unknown_status_gets_generic_title() {
        let mut config = Config::default();
        config.statuses.clear();
        let notifier = DesktopNotifier::new(&config);
        let (title, body) = notifier.compose(Status::TaskComplete, "done");
        assert_eq!(title, "Claude Code");
        assert_eq!(body, "done");
    }

    #[test]
    fn session_name_is_split_from_message() {
        let (name, body) = split_session_name("[bold-cat] Task finished");
        assert_eq!(name, Some("bold-cat"));
        assert_eq!(body, "Task finished");
    }

    #[test]
    fn message_without_prefix_passes_through() {
        let (name, body) = split_session_name("Task finished");
        assert_eq!(name, None);
        assert_eq!(body, "Task finished");

        let (name, body) = split_session_name("[unclosed start");
        assert_eq!(name, None);
        assert_eq!(body, "[unclosed start");
    }

    #[test]
    fn empty_brackets_are_not_a_session_name() {
        let (name, body) = split_session_name("[] odd message");
        assert_eq!(name, None);
        assert_eq!(body, "[] odd message");
    }
}
