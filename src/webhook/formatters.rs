//! Outbound payload construction per webhook preset.

use chrono::Utc;
use serde_json::json;

use super::WebhookError;
use crate::analyzer::Status;
use crate::config::{PayloadFormat, WebhookConfig, WebhookPreset};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// A fully rendered request body.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// Builds the wire payload for the configured preset.
pub fn build_payload(
    config: &WebhookConfig,
    status: Status,
    message: &str,
    session_id: &str,
    status_title: &str,
) -> Result<Payload, WebhookError> {
    match config.preset {
        WebhookPreset::Slack => slack_payload(status, message, session_id, status_title),
        WebhookPreset::Discord => discord_payload(status, message, session_id, status_title),
        WebhookPreset::Telegram => {
            telegram_payload(status, message, session_id, status_title, &config.chat_id)
        }
        WebhookPreset::Custom => custom_payload(status, message, session_id, config.format),
    }
}

fn slack_payload(
    status: Status,
    message: &str,
    session_id: &str,
    status_title: &str,
) -> Result<Payload, WebhookError> {
    let value = json!({
        "attachments": [{
            "color": slack_color(status),
            "title": status_title,
            "text": message,
            "footer": format!("Session: {session_id} | Claude Notifications"),
            "footer_icon": "https://claude.ai/favicon.ico",
            "ts": Utc::now().timestamp(),
            "mrkdwn_in": ["text"],
        }]
    });
    encode_json(value)
}

fn discord_payload(
    status: Status,
    message: &str,
    session_id: &str,
    status_title: &str,
) -> Result<Payload, WebhookError> {
    let value = json!({
        "username": "Claude Code",
        "embeds": [{
            "title": status_title,
            "description": message,
            "color": discord_color(status),
            "footer": { "text": format!("Session: {session_id}") },
            "timestamp": Utc::now().to_rfc3339(),
        }]
    });
    encode_json(value)
}

fn telegram_payload(
    status: Status,
    message: &str,
    session_id: &str,
    status_title: &str,
    chat_id: &str,
) -> Result<Payload, WebhookError> {
    let emoji = status_emoji(status);
    let value = json!({
        "chat_id": chat_id,
        "text": format!(
            "{emoji} <b>{status_title}</b>\n\n{message}\n\n<i>Session: {session_id}</i>"
        ),
        "parse_mode": "HTML",
    });
    encode_json(value)
}

fn custom_payload(
    status: Status,
    message: &str,
    session_id: &str,
    format: PayloadFormat,
) -> Result<Payload, WebhookError> {
    match format {
        PayloadFormat::Text => Ok(Payload {
            body: format!("[{status}] {message}").into_bytes(),
            content_type: CONTENT_TYPE_TEXT,
        }),
        PayloadFormat::Json => encode_json(json!({
            "status": status.as_str(),
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": session_id,
            "source": "claude-notifications",
        })),
    }
}

fn encode_json(value: serde_json::Value) -> Result<Payload, WebhookError> {
    let body = serde_json::to_vec(&value)
        .map_err(|err| WebhookError::Payload(err.to_string()))?;
    Ok(Payload { body, content_type: CONTENT_TYPE_JSON })
}

fn slack_color(status: Status) -> &'static str {
    match status {
        Status::TaskComplete => "#28a745",
        Status::ReviewComplete => "#17a2b8",
        Status::Question => "#ffc107",
        Status::PlanReady => "#007bff",
        _ => "#6c757d",
    }
}

fn discord_color(status: Status) -> u32 {
    match status {
        Status::TaskComplete => 0x28a745,
        Status::ReviewComplete => 0x17a2b8,
        Status::Question => 0xffc107,
        Status::PlanReady => 0x007bff,
        _ => 0x6c757d,
    }
}

fn status_emoji(status: Status) -> &'static str {
    match status {
        Status::TaskComplete => "✅",
        Status::ReviewComplete => "🔍",
        Status::Question => "❓",
        Status::PlanReady => "📋",
        _ => "ℹ️",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebhookConfig;

    fn config_for(preset: WebhookPreset) -> WebhookConfig {
        WebhookConfig {
            preset,
            chat_id: "777".to_string(),
            ..WebhookConfig::default()
        }
    }

    fn decode(payload: &Payload) -> serde_json::Value {
        serde_json::from_slice(&payload.body).unwrap()
    }

    #[test]
    fn slack_attachment_shape() {
        let payload = build_payload(
            &config_for(WebhookPreset::Slack),
            Status::TaskComplete,
            "All done",
            "s1",
            "✅ Task Completed",
        )
        .unwrap();

        assert_eq!(payload.content_type, CONTENT_TYPE_JSON);
        let value = decode(&payload);
        let attachment = &value["attachments"][0];
        assert_eq!(attachment["color"], "#28a745");
        assert_eq!(attachment["title"], "✅ Task Completed");
        assert_eq!(attachment["text"], "All done");
        assert_eq!(attachment["footer"], "Session: s1 | Claude Notifications");
        assert_eq!(attachment["mrkdwn_in"][0], "text");
        assert!(attachment["ts"].is_i64());
    }

    #[test]
    fn discord_embed_shape() {
        let payload = build_payload(
            &config_for(WebhookPreset::Discord),
            Status::PlanReady,
            "Plan is ready",
            "s2",
            "📋 Plan Ready for Review",
        )
        .unwrap();

        let value = decode(&payload);
        assert_eq!(value["username"], "Claude Code");
        let embed = &value["embeds"][0];
        assert_eq!(embed["color"], 0x007bff);
        assert_eq!(embed["description"], "Plan is ready");
        assert_eq!(embed["footer"]["text"], "Session: s2");
        assert!(embed["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn telegram_html_shape() {
        let payload = build_payload(
            &config_for(WebhookPreset::Telegram),
            Status::Question,
            "Which DB?",
            "s3",
            "Claude Has Questions",
        )
        .unwrap();

        let value = decode(&payload);
        assert_eq!(value["chat_id"], "777");
        assert_eq!(value["parse_mode"], "HTML");
        let text = value["text"].as_str().unwrap();
        assert!(text.starts_with("❓ <b>Claude Has Questions</b>"));
        assert!(text.contains("Which DB?"));
        assert!(text.ends_with("<i>Session: s3</i>"));
    }

    #[test]
    fn custom_json_shape() {
        let payload = build_payload(
            &config_for(WebhookPreset::Custom),
            Status::ReviewComplete,
            "Reviewed 3 files",
            "s4",
            "🔍 Review Completed",
        )
        .unwrap();

        let value = decode(&payload);
        assert_eq!(value["status"], "review_complete");
        assert_eq!(value["message"], "Reviewed 3 files");
        assert_eq!(value["session_id"], "s4");
        assert_eq!(value["source"], "claude-notifications");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn custom_text_is_plain() {
        let mut config = config_for(WebhookPreset::Custom);
        config.format = PayloadFormat::Text;

        let payload =
            build_payload(&config, Status::TaskComplete, "done", "s5", "ignored").unwrap();
        assert_eq!(payload.content_type, CONTENT_TYPE_TEXT);
        assert_eq!(payload.body, b"[task_complete] done".to_vec());
    }

    #[test]
    fn unlisted_statuses_fall_back_to_grey() {
        assert_eq!(slack_color(Status::SessionLimitReached), "#6c757d");
        assert_eq!(discord_color(Status::ApiError401), 0x6c757d);
        assert_eq!(status_emoji(Status::Unknown), "ℹ️");
    }
}
