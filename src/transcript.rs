//! Conversation transcript parsing.
//!
//! Transcripts are newline-delimited JSON. One record per line; lines that
//! fail to decode are skipped so a single corrupt entry never aborts
//! classification. Lines well past 1 MiB are handled (the reader grows as
//! needed).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// One transcript line.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptRecord {
    #[serde(rename = "type", default)]
    pub record_type: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub message: MessageBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: MessageContent,
}

/// Message content is either a plain string (a typed user message) or an
/// ordered list of blocks (assistant output, tool results).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Blocks(Vec::new())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub input: Value,
}

/// A `tool_use` block flattened out with its record position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolUse<'a> {
    pub position: usize,
    pub name: &'a str,
}

impl TranscriptRecord {
    pub fn is_assistant(&self) -> bool {
        self.record_type == "assistant"
    }

    pub fn is_user(&self) -> bool {
        self.record_type == "user"
    }

    /// Content blocks of this record; empty for string-content records.
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.message.content {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    /// Whether this is a typed human message: string content, or a block
    /// list whose first block is text. Tool-result arrays do not qualify.
    pub fn is_user_text(&self) -> bool {
        if !self.is_user() {
            return false;
        }
        match &self.message.content {
            MessageContent::Text(_) => true,
            MessageContent::Blocks(blocks) => {
                blocks.first().is_some_and(|b| b.block_type == "text")
            }
        }
    }
}

/// Parses a transcript file into its decodable records, in order.
/// Fails only when the file cannot be opened or read.
pub fn parse_file(path: &Path) -> AppResult<Vec<TranscriptRecord>> {
    let file = File::open(path).map_err(|err| AppError::io(path, "open transcript", err))?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);

    let mut records = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|err| AppError::io(path, "read transcript", err))?;
        if read == 0 {
            break;
        }
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        match serde_json::from_slice::<TranscriptRecord>(&line) {
            Ok(record) => records.push(record),
            Err(_) => continue,
        }
    }
    Ok(records)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Timestamp of the most recent typed user message, if any.
pub fn last_user_text_timestamp(records: &[TranscriptRecord]) -> Option<&str> {
    records
        .iter()
        .rev()
        .find(|r| r.is_user_text() && !r.timestamp.is_empty())
        .map(|r| r.timestamp.as_str())
}

/// Timestamp of the most recent assistant record, if any.
pub fn last_assistant_timestamp(records: &[TranscriptRecord]) -> Option<&str> {
    records
        .iter()
        .rev()
        .find(|r| r.is_assistant() && !r.timestamp.is_empty())
        .map(|r| r.timestamp.as_str())
}

/// Assistant records strictly after `cutoff`. An absent or unparseable
/// cutoff returns all assistant records.
pub fn assistant_records_after<'a>(
    records: &'a [TranscriptRecord],
    cutoff: Option<&str>,
) -> Vec<&'a TranscriptRecord> {
    let cutoff_ts = cutoff.and_then(parse_timestamp);
    let Some(cutoff_ts) = cutoff_ts else {
        return records.iter().filter(|r| r.is_assistant()).collect();
    };

    records
        .iter()
        .filter(|r| r.is_assistant())
        .filter(|r| {
            parse_timestamp(&r.timestamp).is_some_and(|ts| ts > cutoff_ts)
        })
        .collect()
}

/// The last `count` assistant records.
pub fn last_assistant_records(
    records: &[TranscriptRecord],
    count: usize,
) -> Vec<&TranscriptRecord> {
    let assistant: Vec<&TranscriptRecord> =
        records.iter().filter(|r| r.is_assistant()).collect();
    let skip = assistant.len().saturating_sub(count);
    assistant[skip..].to_vec()
}

/// Flattens `tool_use` blocks into `(position, name)` pairs, preserving
/// order. Position is the record index within `records`.
pub fn extract_tool_uses<'a>(records: &[&'a TranscriptRecord]) -> Vec<ToolUse<'a>> {
    let mut tools = Vec::new();
    for (position, record) in records.iter().enumerate() {
        for block in record.blocks() {
            if block.block_type == "tool_use" {
                tools.push(ToolUse { position, name: &block.name });
            }
        }
    }
    tools
}

/// Last occurrence of a named tool across assistant records, together with
/// the record carrying it.
pub fn find_last_tool_use<'a>(
    records: &'a [TranscriptRecord],
    tool_name: &str,
) -> Option<(&'a TranscriptRecord, &'a ContentBlock)> {
    let mut found = None;
    for record in records.iter().filter(|r| r.is_assistant()) {
        for block in record.blocks() {
            if block.block_type == "tool_use" && block.name == tool_name {
                found = Some((record, block));
            }
        }
    }
    found
}

/// Non-empty text blocks of the given records, in order.
pub fn extract_text_blocks<'a>(records: &[&'a TranscriptRecord]) -> Vec<&'a str> {
    let mut texts = Vec::new();
    for record in records {
        for block in record.blocks() {
            if block.block_type == "text" && !block.text.is_empty() {
                texts.push(block.text.as_str());
            }
        }
    }
    texts
}

/// The most recent assistant text block across the whole transcript.
pub fn last_assistant_text(records: &[TranscriptRecord]) -> Option<&str> {
    for record in records.iter().rev().filter(|r| r.is_assistant()) {
        for block in record.blocks().iter().rev() {
            if block.block_type == "text" && !block.text.is_empty() {
                return Some(&block.text);
            }
        }
    }
    None
}
