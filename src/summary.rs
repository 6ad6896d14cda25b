//! Notification message synthesis.
//!
//! Each status gets a short human-readable summary derived from the
//! transcript, bounded at 150 characters and guaranteed to be single-line
//! and non-empty. Markdown cleanup is destructive and best-effort.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzer::Status;
use crate::config::Config;
use crate::transcript::{self, TranscriptRecord};

/// Upper bound on synthesized message length, in characters.
pub const MAX_MESSAGE_LEN: usize = 150;

/// AskUserQuestion blocks older than this relative to the last assistant
/// record are considered answered and skipped.
const QUESTION_RECENCY_SECS: i64 = 60;

const SESSION_LIMIT_MARKER: &str = "Session limit reached";

// Keyword set for review detection. Bilingual on purpose; the transcript
// language follows the user.
const REVIEW_KEYWORDS: &[&str] = &["review", "анализ", "проверка", "analyzed", "analysis"];

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s*").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*•]\s+").unwrap());
static BLOCKQUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>\s*").unwrap());
static IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]*)\*\*|__([^_]*)__").unwrap());
static EMPHASIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]*)\*|_([^_]*)_").unwrap());
static STRIKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~([^~]*)~~").unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static EMOJI_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{So}\p{Sk}]+\s*").unwrap());

/// Generates a status-specific summary from the transcript at `path`.
/// Falls back to the simple per-status message when the transcript is
/// unreadable or empty.
pub fn generate_from_transcript(path: &Path, status: Status, config: &Config) -> String {
    let records = match transcript::parse_file(path) {
        Ok(records) if !records.is_empty() => records,
        _ => return generate_simple(status, config),
    };

    let message = match status {
        Status::Question => question_summary(&records),
        Status::PlanReady => plan_summary(&records),
        Status::ReviewComplete => review_summary(&records),
        Status::SessionLimitReached => session_limit_summary(&records, config),
        Status::ApiError401 => "Please run /login".to_string(),
        _ => task_summary(&records, config),
    };

    finalize(message, status, config)
}

/// Per-status fallback when no transcript is available.
pub fn generate_simple(status: Status, config: &Config) -> String {
    let message = match status {
        Status::Question => "Claude needs your input to continue".to_string(),
        Status::PlanReady => "Plan is ready for review".to_string(),
        Status::ReviewComplete => "Code review completed".to_string(),
        Status::TaskComplete => "Task completed successfully".to_string(),
        Status::ApiError401 => "Please run /login".to_string(),
        _ => default_message(status, config),
    };
    finalize(message, status, config)
}

/// Configured title with any leading emoji stripped; the generic fallback
/// when nothing better exists.
fn default_message(status: Status, config: &Config) -> String {
    let Some(info) = config.status_info(status) else {
        return "Claude Code notification".to_string();
    };
    let stripped = EMOJI_PREFIX_RE.replace(&info.title, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        "Claude Code notification".to_string()
    } else {
        stripped.to_string()
    }
}

fn question_summary(records: &[TranscriptRecord]) -> String {
    if let Some((question, is_recent)) = extract_ask_user_question(records) {
        if is_recent {
            return question;
        }
    }

    // Fallback: the latest questioning sentence in recent assistant text.
    let recent = transcript::last_assistant_records(records, 8);
    let texts = transcript::extract_text_blocks(&recent);
    for text in texts.iter().rev() {
        if text.contains('?') {
            if let Some(sentence) = latest_sentence_with(text, '?') {
                return sentence;
            }
        }
    }

    "Claude needs your input to continue".to_string()
}

/// Question text of the most recent AskUserQuestion block, plus whether it
/// is within the recency window of the last assistant record.
fn extract_ask_user_question(records: &[TranscriptRecord]) -> Option<(String, bool)> {
    let (record, block) = transcript::find_last_tool_use(records, "AskUserQuestion")?;
    let question = block
        .input
        .get("questions")?
        .get(0)?
        .get("question")?
        .as_str()?
        .to_string();

    let question_ts = transcript::parse_timestamp(&record.timestamp);
    let last_ts = transcript::last_assistant_timestamp(records)
        .and_then(transcript::parse_timestamp);

    let is_recent = match (question_ts, last_ts) {
        (Some(question_ts), Some(last_ts)) => {
            let age = (last_ts - question_ts).num_seconds();
            (0..=QUESTION_RECENCY_SECS).contains(&age)
        }
        _ => false,
    };

    Some((question, is_recent))
}

fn plan_summary(records: &[TranscriptRecord]) -> String {
    let plan = transcript::find_last_tool_use(records, "ExitPlanMode")
        .and_then(|(_, block)| block.input.get("plan"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    for line in plan.lines() {
        let cleaned = clean_markdown(line);
        if !cleaned.trim().is_empty() {
            return cleaned;
        }
    }

    "Plan is ready for review".to_string()
}

fn review_summary(records: &[TranscriptRecord]) -> String {
    let recent = transcript::last_assistant_records(records, 5);
    let texts = transcript::extract_text_blocks(&recent);

    for text in texts.iter().rev() {
        let lowered = text.to_lowercase();
        for keyword in REVIEW_KEYWORDS {
            if lowered.contains(keyword) {
                if let Some(sentence) = sentence_containing(text, keyword) {
                    return sentence;
                }
                return (*text).to_string();
            }
        }
    }

    let tools = transcript::extract_tool_uses(&recent);
    let read_count = tools.iter().filter(|t| t.name == "Read").count();
    if read_count > 0 {
        let noun = if read_count == 1 { "file" } else { "files" };
        return format!("Reviewed {read_count} {noun}");
    }

    "Code review completed".to_string()
}

fn task_summary(records: &[TranscriptRecord], config: &Config) -> String {
    let recent = transcript::last_assistant_records(records, 5);
    if recent.is_empty() {
        return default_message(Status::TaskComplete, config);
    }

    let texts = transcript::extract_text_blocks(&recent);
    let last_message = texts.last().copied().unwrap_or_default();

    let duration = turn_duration(records);
    let counts = tool_counts_in_turn(records);
    let actions = build_actions_string(&counts, duration.as_deref());

    if !last_message.is_empty() {
        let first_sentence = clean_markdown(&extract_first_sentence(last_message));
        if let Some(actions) = actions {
            return format!("{first_sentence}. {actions}");
        }
        return first_sentence;
    }

    if let Some(actions) = actions {
        return actions;
    }

    let total: usize = counts.values().sum();
    if total > 0 {
        return format!("Completed task with {total} operations");
    }

    "Task completed successfully".to_string()
}

fn session_limit_summary(records: &[TranscriptRecord], config: &Config) -> String {
    for record in records.iter().rev().filter(|r| r.is_assistant()) {
        for block in record.blocks().iter().rev() {
            if block.block_type == "text" && block.text.contains(SESSION_LIMIT_MARKER) {
                return block.text.clone();
            }
        }
    }
    default_message(Status::SessionLimitReached, config)
}

/// Elapsed time between the last typed user message and the last assistant
/// record, formatted with the largest non-zero units.
fn turn_duration(records: &[TranscriptRecord]) -> Option<String> {
    let user_ts = transcript::last_user_text_timestamp(records)
        .and_then(transcript::parse_timestamp)?;
    let assistant_ts = transcript::last_assistant_timestamp(records)
        .and_then(transcript::parse_timestamp)?;

    let seconds = (assistant_ts - user_ts).num_seconds();
    if seconds < 0 {
        return None;
    }
    Some(format_duration(seconds))
}

fn format_duration(seconds: i64) -> String {
    if seconds < 60 {
        return format!("Took {seconds}s");
    }

    let minutes = seconds / 60;
    let secs = seconds % 60;
    if minutes < 60 {
        if secs > 0 {
            return format!("Took {minutes}m {secs}s");
        }
        return format!("Took {minutes}m");
    }

    let hours = minutes / 60;
    let mins = minutes % 60;
    if mins > 0 {
        return format!("Took {hours}h {mins}m");
    }
    format!("Took {hours}h")
}

/// Tool-use counts per name within the current turn.
fn tool_counts_in_turn(records: &[TranscriptRecord]) -> HashMap<String, usize> {
    let cutoff = transcript::last_user_text_timestamp(records);
    let turn = transcript::assistant_records_after(records, cutoff);

    let mut counts = HashMap::new();
    for tool in transcript::extract_tool_uses(&turn) {
        *counts.entry(tool.name.to_string()).or_insert(0) += 1;
    }
    counts
}

fn build_actions_string(
    counts: &HashMap<String, usize>,
    duration: Option<&str>,
) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(&count) = counts.get("Write").filter(|&&c| c > 0) {
        let noun = if count == 1 { "file" } else { "files" };
        parts.push(format!("Created {count} {noun}"));
    }
    if let Some(&count) = counts.get("Edit").filter(|&&c| c > 0) {
        let noun = if count == 1 { "file" } else { "files" };
        parts.push(format!("Edited {count} {noun}"));
    }
    if let Some(&count) = counts.get("Bash").filter(|&&c| c > 0) {
        let noun = if count == 1 { "command" } else { "commands" };
        parts.push(format!("Ran {count} {noun}"));
    }
    if let Some(duration) = duration {
        parts.push(duration.to_string());
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(". "))
    }
}

fn extract_first_sentence(text: &str) -> String {
    for (i, ch) in text.char_indices() {
        if ch == '.' || ch == '!' || ch == '?' {
            return text[..i].trim().to_string();
        }
    }
    // No terminator; bound the fragment.
    text.chars().take(100).collect::<String>().trim().to_string()
}

/// The latest sentence in `text` containing `marker`.
fn latest_sentence_with(text: &str, marker: char) -> Option<String> {
    split_sentences(text)
        .into_iter()
        .rev()
        .find(|s| s.contains(marker))
}

fn sentence_containing(text: &str, keyword: &str) -> Option<String> {
    split_sentences(text)
        .into_iter()
        .find(|s| s.to_lowercase().contains(keyword))
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        if ch == '.' || ch == '!' || ch == '?' {
            let end = i + ch.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Strips markdown formatting down to plain text. Never fails; unknown
/// constructs pass through unchanged.
pub fn clean_markdown(text: &str) -> String {
    let mut cleaned_lines = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || line.is_empty() {
            continue;
        }

        let line = HEADER_RE.replace(line, "");
        let line = BULLET_RE.replace(&line, "");
        let line = BLOCKQUOTE_RE.replace(&line, "");
        let line = IMAGE_RE.replace_all(&line, "$1");
        let line = LINK_RE.replace_all(&line, "$1");
        let line = BOLD_RE.replace_all(&line, "$1$2");
        let line = EMPHASIS_RE.replace_all(&line, "$1$2");
        let line = STRIKE_RE.replace_all(&line, "$1");
        let line = line.replace('`', "");

        let line = line.trim();
        if !line.is_empty() {
            cleaned_lines.push(line.to_string());
        }
    }

    let joined = cleaned_lines.join(" ");
    MULTI_SPACE_RE.replace_all(&joined, " ").trim().to_string()
}

/// Single-line, non-empty, length-bounded output invariant.
fn finalize(message: String, status: Status, config: &Config) -> String {
    let single_line = message.replace('\n', " ").replace('\r', " ");
    let flattened = MULTI_SPACE_RE.replace_all(single_line.trim(), " ").into_owned();
    if flattened.is_empty() {
        return truncate_text(&default_message(status, config), MAX_MESSAGE_LEN);
    }
    truncate_text(&flattened, MAX_MESSAGE_LEN)
}

/// Truncates to `max_len` characters, preferring a sentence boundary, then a
/// word boundary. The ellipsis is appended only for a mid-word hard cut.
fn truncate_text(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }

    let head: String = chars[..max_len].iter().collect();

    // Sentence boundary inside the budget wins.
    if let Some(cut) = head.rfind(&['.', '!', '?'][..]) {
        let candidate = head[..=cut].trim();
        if candidate.chars().count() > max_len / 2 {
            return candidate.to_string();
        }
    }

    // Word boundary next.
    let head_minus_ellipsis: String = chars[..max_len - 3].iter().collect();
    if let Some(cut) = head_minus_ellipsis.rfind(' ') {
        if head_minus_ellipsis[..cut].chars().count() > max_len / 2 {
            return head_minus_ellipsis[..cut].trim_end().to_string();
        }
    }

    format!("{}...", head_minus_ellipsis.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config() -> Config {
        Config::default()
    }

    fn write_lines(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn user_line(ts: &str) -> String {
        format!(
            r#"{{"type":"user","timestamp":"{ts}","message":{{"role":"user","content":"please do it"}}}}"#
        )
    }

    fn assistant_text_line(ts: &str, text: &str) -> String {
        format!(
            r#"{{"type":"assistant","timestamp":"{ts}","message":{{"role":"assistant","content":[{{"type":"text","text":"{text}"}}]}}}}"#
        )
    }

    fn assistant_tool_line(ts: &str, name: &str, input: &str) -> String {
        format!(
            r#"{{"type":"assistant","timestamp":"{ts}","message":{{"role":"assistant","content":[{{"type":"tool_use","name":"{name}","input":{input}}}]}}}}"#
        )
    }

    #[test]
    fn recent_question_text_is_used_verbatim() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_tool_line(
                "2024-03-01T10:00:30Z",
                "AskUserQuestion",
                r#"{"questions":[{"question":"Which DB?"}]}"#,
            ),
        ]);

        let message = generate_from_transcript(file.path(), Status::Question, &config());
        assert_eq!(message, "Which DB?");
    }

    #[test]
    fn stale_question_falls_back_to_text_scan() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_tool_line(
                "2024-03-01T10:00:05Z",
                "AskUserQuestion",
                r#"{"questions":[{"question":"Old question?"}]}"#,
            ),
            assistant_text_line(
                "2024-03-01T10:05:00Z",
                "Done with that. Should I also update the docs?",
            ),
        ]);

        let message = generate_from_transcript(file.path(), Status::Question, &config());
        assert_eq!(message, "Should I also update the docs?");
    }

    #[test]
    fn question_generic_fallback() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_text_line("2024-03-01T10:00:05Z", "No questions here."),
        ]);

        let message = generate_from_transcript(file.path(), Status::Question, &config());
        assert_eq!(message, "Claude needs your input to continue");
    }

    #[test]
    fn plan_summary_takes_first_non_blank_line() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_tool_line(
                "2024-03-01T10:00:05Z",
                "ExitPlanMode",
                r###"{"plan":"## Migration plan\n\n- step one\n- step two"}"###,
            ),
        ]);

        let message = generate_from_transcript(file.path(), Status::PlanReady, &config());
        assert_eq!(message, "Migration plan");
    }

    #[test]
    fn task_summary_combines_sentence_actions_and_duration() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_tool_line("2024-03-01T10:00:10Z", "ExitPlanMode", r#"{"plan":"x"}"#),
            assistant_tool_line("2024-03-01T10:00:20Z", "Write", r#"{}"#),
            assistant_tool_line("2024-03-01T10:00:30Z", "Write", r#"{}"#),
            assistant_tool_line("2024-03-01T10:00:40Z", "Bash", r#"{}"#),
            assistant_text_line(
                "2024-03-01T10:02:15Z",
                "Added the parser module. More detail follows.",
            ),
        ]);

        let message = generate_from_transcript(file.path(), Status::TaskComplete, &config());
        assert_eq!(
            message,
            "Added the parser module. Created 2 files. Ran 1 command. Took 2m 15s"
        );
    }

    #[test]
    fn review_summary_counts_read_tools() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_tool_line("2024-03-01T10:00:10Z", "Read", r#"{}"#),
            assistant_tool_line("2024-03-01T10:00:11Z", "Read", r#"{}"#),
            assistant_tool_line("2024-03-01T10:00:12Z", "Read", r#"{}"#),
        ]);

        let message = generate_from_transcript(file.path(), Status::ReviewComplete, &config());
        assert_eq!(message, "Reviewed 3 files");
    }

    #[test]
    fn review_summary_prefers_keyword_sentence() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_text_line(
                "2024-03-01T10:00:10Z",
                "I looked around. Analysis shows two hot spots. Next steps below.",
            ),
        ]);

        let message = generate_from_transcript(file.path(), Status::ReviewComplete, &config());
        assert_eq!(message, "Analysis shows two hot spots.");
    }

    #[test]
    fn session_limit_summary_returns_marker_text() {
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_text_line("2024-03-01T10:00:10Z", "Session limit reached - resets 3pm"),
        ]);

        let message =
            generate_from_transcript(file.path(), Status::SessionLimitReached, &config());
        assert_eq!(message, "Session limit reached - resets 3pm");
    }

    #[test]
    fn missing_transcript_uses_simple_message() {
        let message = generate_simple(Status::PlanReady, &config());
        assert_eq!(message, "Plan is ready for review");
        let message = generate_simple(Status::TaskComplete, &config());
        assert_eq!(message, "Task completed successfully");
    }

    #[test]
    fn markdown_cleanup_strips_formatting() {
        assert_eq!(clean_markdown("## Heading"), "Heading");
        assert_eq!(clean_markdown("- bullet item"), "bullet item");
        assert_eq!(clean_markdown("**bold** and _soft_"), "bold and soft");
        assert_eq!(clean_markdown("see [docs](https://x.y/z) now"), "see docs now");
        assert_eq!(clean_markdown("~~gone~~ kept"), "gone kept");
        assert_eq!(clean_markdown("> quoted line"), "quoted line");
        assert_eq!(clean_markdown("run `cargo build` twice"), "run cargo build twice");
        assert_eq!(clean_markdown("```rust\nlet x = 1;\n```\nafter"), "after");
        assert_eq!(clean_markdown("a   b\n\n\nc"), "a b c");
    }

    #[test]
    fn synthesized_messages_are_bounded_and_single_line() {
        let long_text = "word ".repeat(100);
        let file = write_lines(&[
            user_line("2024-03-01T10:00:00Z"),
            assistant_tool_line(
                "2024-03-01T10:00:05Z",
                "ExitPlanMode",
                &format!(r#"{{"plan":"{long_text}"}}"#),
            ),
        ]);

        for status in [
            Status::Question,
            Status::PlanReady,
            Status::ReviewComplete,
            Status::TaskComplete,
            Status::SessionLimitReached,
            Status::ApiError401,
        ] {
            let message = generate_from_transcript(file.path(), status, &config());
            assert!(message.chars().count() <= MAX_MESSAGE_LEN, "{status}: too long");
            assert!(!message.contains('\n'), "{status}: contains newline");
            assert!(!message.is_empty(), "{status}: empty");
        }
    }

    #[test]
    fn truncation_prefers_sentence_boundary() {
        let text = format!("First sentence here. {}", "pad ".repeat(60));
        let truncated = truncate_text(&text, 150);
        assert!(truncated.chars().count() <= 150);

        let sentence_heavy =
            "This opener is a reasonably long first sentence that carries most of the budget by itself and then ends. Trailing words beyond the limit keep going and going for far longer than the budget allows";
        let truncated = truncate_text(sentence_heavy, 150);
        assert!(truncated.ends_with('.'));
    }

    #[test]
    fn truncation_mid_word_appends_ellipsis() {
        let text = "a".repeat(400);
        let truncated = truncate_text(&text, 150);
        assert!(truncated.ends_with("..."));
        assert!(truncated.chars().count() <= 150);
    }

    #[test]
    fn duration_formatting_uses_largest_units() {
        assert_eq!(format_duration(45), "Took 45s");
        assert_eq!(format_duration(135), "Took 2m 15s");
        assert_eq!(format_duration(120), "Took 2m");
        assert_eq!(format_duration(3600), "Took 1h");
        assert_eq!(format_duration(3720), "Took 1h 2m");
    }
}
