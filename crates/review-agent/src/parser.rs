//! Line classifier for the agent's stream-json output.
//!
//! Every stdout line is decoded on its own. A line that is not JSON, or whose
//! shape does not match the event model, is logged and skipped: the agent's
//! output is advisory and a garbled line must never end the run.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::types::{ContentBlock, StreamEvent, TerminalResult, UserBlock};
use crate::{AgentError, Result};

/// Preview length for raw lines, shell commands, and error details.
pub const LINE_PREVIEW: usize = 500;
/// Preview length for free-text assistant blocks.
pub const TEXT_PREVIEW: usize = 300;
/// Preview length for successful tool results.
pub const TOOL_OK_PREVIEW: usize = 200;

/// Decode one line into a [`StreamEvent`].
///
/// Only a line that is not a JSON object is a [`AgentError::Parse`]. Any
/// object decodes: an unknown or missing `type` gives
/// [`StreamEvent::Unrecognized`], and parts of a known event that do not fit
/// the model are dropped without losing the rest.
pub fn classify(line: &str) -> Result<StreamEvent> {
    let parse_error = |source: serde_json::Error| AgentError::Parse {
        line: line.to_owned(),
        source,
    };
    let value: Value = serde_json::from_str(line).map_err(parse_error)?;
    if !value.is_object() {
        return Err(parse_error(serde::de::Error::custom("expected a JSON object")));
    }
    Ok(StreamEvent::from_value(&value))
}

/// Truncate `s` to at most `max` characters, respecting char boundaries.
pub fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─── RunLog ───────────────────────────────────────────────────────────────

/// Accumulator the supervisor threads through the parser for one run.
#[derive(Debug, Default, Clone)]
pub struct RunLog {
    /// Shell commands the agent issued, in order.
    pub commands: Vec<String>,
    /// Names of non-shell tools the agent invoked, in order.
    pub tools: Vec<String>,
    /// Number of tool results flagged as errors.
    pub tool_errors: usize,
    /// Number of lines that decoded to an event (including unrecognized ones).
    pub events: usize,
    /// Number of non-empty lines that failed to decode.
    pub malformed: usize,
    /// The terminal event, once seen.
    pub result: Option<TerminalResult>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one raw stdout line and fold it into the log.
    ///
    /// Blank lines are ignored. Returns the decoded event so callers can
    /// react to it (the CLI replay command prints them).
    pub fn ingest_line(&mut self, raw: &str) -> Option<StreamEvent> {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            return None;
        }
        match classify(line) {
            Ok(event) => {
                self.observe(&event);
                Some(event)
            }
            Err(_) => {
                self.malformed += 1;
                info!("[agent] {}", preview(line, LINE_PREVIEW));
                None
            }
        }
    }

    /// Log an already-decoded event and record what the supervisor needs.
    pub fn observe(&mut self, event: &StreamEvent) {
        self.events += 1;
        match event {
            StreamEvent::Assistant(a) => {
                for block in &a.message.content {
                    self.observe_assistant_block(block);
                }
            }
            StreamEvent::User(u) => {
                for block in u.message.content.blocks() {
                    self.observe_user_block(block);
                }
            }
            StreamEvent::Result(r) => self.observe_result(r),
            StreamEvent::Unrecognized => {}
        }
    }

    fn observe_assistant_block(&mut self, block: &ContentBlock) {
        if let Some(cmd) = block.shell_command() {
            let escaped = cmd.replace('\n', "\\n");
            info!("[bash] {}", preview(&escaped, LINE_PREVIEW));
            self.commands.push(cmd.to_owned());
            return;
        }
        match block {
            ContentBlock::ToolUse { name, .. } => {
                info!("[tool] {name}");
                self.tools.push(name.clone());
            }
            ContentBlock::Text { text } => {
                let text = text.trim();
                if !text.is_empty() {
                    info!("[text] {}", preview(text, TEXT_PREVIEW));
                }
            }
            ContentBlock::Other => {}
        }
    }

    fn observe_user_block(&mut self, block: &UserBlock) {
        let UserBlock::ToolResult { content, is_error } = block else {
            return;
        };
        let text = content.as_ref().map(|c| c.to_text()).unwrap_or_default();
        if is_error.unwrap_or(false) {
            self.tool_errors += 1;
            warn!("[tool_error] {}", preview(&text, LINE_PREVIEW));
        } else if !text.is_empty() {
            debug!("[tool_ok] {}", preview(&text, TOOL_OK_PREVIEW));
        }
    }

    fn observe_result(&mut self, r: &TerminalResult) {
        info!(
            "[done] cost=${:.4} turns={} duration={:.1}s error={}",
            r.total_cost_usd.unwrap_or(0.0),
            r.num_turns
                .map(|t| t.to_string())
                .unwrap_or_else(|| "None".to_string()),
            r.duration_secs(),
            r.is_error(),
        );
        if r.is_error() {
            error!(
                "[error] {}",
                preview(r.result.as_deref().unwrap_or(""), LINE_PREVIEW)
            );
        }
        for denial in &r.permission_denials {
            warn!("[denied] {denial}");
        }
        self.result = Some(r.clone());
    }

    /// `true` when the terminal event reported an error.
    pub fn result_is_error(&self) -> bool {
        self.result.as_ref().is_some_and(TerminalResult::is_error)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
