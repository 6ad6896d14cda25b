//! Status classification for the current assistant turn.
//!
//! Classification is a state machine over the tool trace of the records
//! after the last typed user message. Text-marker statuses (session limit,
//! auth failure) are checked first; the 401 marker wins over the limit
//! marker.

use serde::{Deserialize, Serialize};

use crate::transcript::{self, TranscriptRecord};

/// Tools that mutate the workspace; finishing on one of these means work
/// was done.
pub const ACTIVE_TOOLS: &[&str] = &["Write", "Edit", "Bash", "NotebookEdit", "SlashCommand", "KillShell"];
pub const QUESTION_TOOLS: &[&str] = &["AskUserQuestion"];
pub const PLANNING_TOOLS: &[&str] = &["ExitPlanMode", "TodoWrite"];
pub const PASSIVE_TOOLS: &[&str] = &["Read", "Grep", "Glob", "WebFetch", "WebSearch", "Task"];

/// Hard locality bound: only the trailing records of the current turn are
/// classified, so very long turns cannot resurrect stale tool calls.
pub const RECENT_WINDOW: usize = 15;

const API_ERROR_MARKER: &str = "API Error: 401";
const LOGIN_MARKER: &str = "Please run /login";
const SESSION_LIMIT_MARKER: &str = "Session limit reached";

/// Classified state of an assistant turn. `Unknown` means "do not notify".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    TaskComplete,
    ReviewComplete,
    Question,
    PlanReady,
    SessionLimitReached,
    ApiError401,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::TaskComplete => "task_complete",
            Status::ReviewComplete => "review_complete",
            Status::Question => "question",
            Status::PlanReady => "plan_ready",
            Status::SessionLimitReached => "session_limit_reached",
            Status::ApiError401 => "api_error_401",
            Status::Unknown => "unknown",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Status> {
        match tag {
            "task_complete" => Some(Status::TaskComplete),
            "review_complete" => Some(Status::ReviewComplete),
            "question" => Some(Status::Question),
            "plan_ready" => Some(Status::PlanReady),
            "session_limit_reached" => Some(Status::SessionLimitReached),
            "api_error_401" => Some(Status::ApiError401),
            "unknown" => Some(Status::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a parsed transcript.
pub fn classify(records: &[TranscriptRecord]) -> Status {
    // Text markers first. These show up as plain assistant text with no
    // tool trace, so the tool state machine below would miss them.
    if let Some(text) = transcript::last_assistant_text(records) {
        if text.contains(API_ERROR_MARKER) && text.contains(LOGIN_MARKER) {
            return Status::ApiError401;
        }
        if text.contains(SESSION_LIMIT_MARKER) {
            return Status::SessionLimitReached;
        }
    }

    // Only the current turn counts: records after the last typed user
    // message. Without this, an ExitPlanMode from a previous request would
    // ghost into the classification.
    let cutoff = transcript::last_user_text_timestamp(records);
    let window = transcript::assistant_records_after(records, cutoff);
    if window.is_empty() {
        return Status::Unknown;
    }

    let skip = window.len().saturating_sub(RECENT_WINDOW);
    let recent = &window[skip..];

    let tools = transcript::extract_tool_uses(recent);
    let Some(last) = tools.last() else {
        // No tool activity in the turn: the pre-tool hook path covers new
        // turns, so transcript classification stays silent.
        return Status::Unknown;
    };

    if last.name == "ExitPlanMode" {
        return Status::PlanReady;
    }
    if last.name == "AskUserQuestion" {
        return Status::Question;
    }

    // A plan followed by further tool calls means the plan was executed.
    if let Some(plan_pos) = tools
        .iter()
        .filter(|t| t.name == "ExitPlanMode")
        .map(|t| t.position)
        .last()
    {
        if tools.iter().any(|t| t.position > plan_pos) {
            return Status::TaskComplete;
        }
    }

    // Finishing on a workspace-mutating tool is completed work.
    if ACTIVE_TOOLS.contains(&last.name) {
        return Status::TaskComplete;
    }

    // Any other tool activity still counts as completed work.
    Status::TaskComplete
}

/// Classification for the pre-tool hook, where only the imminent tool name
/// is known (the transcript does not yet contain the call).
pub fn classify_pretool(tool_name: &str) -> Status {
    match tool_name {
        "ExitPlanMode" => Status::PlanReady,
        "AskUserQuestion" => Status::Question,
        _ => Status::Unknown,
    }
}
