use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Name of the shell-execution tool in the agent's tool vocabulary.
pub const SHELL_TOOL: &str = "Bash";

// ─── Outer event enum ─────────────────────────────────────────────────────

/// One line of `claude --output-format stream-json` output.
/// Discriminated by the JSON `"type"` field.
///
/// Only the three kinds the supervisor acts on are modelled; everything else
/// (`system`, `stream_event`, `tool_progress`, future additions, objects with
/// no `type` at all) becomes [`StreamEvent::Unrecognized`] and is ignored.
///
/// Decoding never fails once the line is a JSON object: a content block that
/// does not fit the model is dropped on its own and the rest of the event is
/// kept, and result metrics of the wrong shape read as absent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Assistant(AssistantEvent),
    User(UserEvent),
    Result(TerminalResult),
    Unrecognized,
}

impl<'de> Deserialize<'de> for StreamEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| StreamEvent::from_value(&v))
    }
}

impl StreamEvent {
    pub fn from_value(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("assistant") => StreamEvent::Assistant(AssistantEvent::from_value(value)),
            Some("user") => StreamEvent::User(UserEvent::from_value(value)),
            Some("result") => StreamEvent::Result(TerminalResult::from_value(value)),
            _ => StreamEvent::Unrecognized,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::Assistant(_) => EventKind::AssistantMessage,
            StreamEvent::User(_) => EventKind::ToolResult,
            StreamEvent::Result(_) => EventKind::TerminalResult,
            StreamEvent::Unrecognized => EventKind::Unrecognized,
        }
    }

    /// Returns `Some(&TerminalResult)` if this is the terminal result event.
    pub fn as_result(&self) -> Option<&TerminalResult> {
        if let StreamEvent::Result(r) = self {
            Some(r)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    AssistantMessage,
    ToolResult,
    TerminalResult,
    Unrecognized,
}

// ─── Assistant events ─────────────────────────────────────────────────────

/// `type = "assistant"`: the model's turn, made of content blocks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssistantEvent {
    pub message: AssistantBody,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssistantBody {
    pub content: Vec<ContentBlock>,
}

impl AssistantEvent {
    fn from_value(value: &Value) -> Self {
        Self {
            message: AssistantBody {
                content: blocks_at(value, "/message/content"),
            },
        }
    }
}

/// Content blocks within an assistant message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default = "unknown_tool")]
        name: String,
        /// Tool inputs are schema-polymorphic (varies per tool).
        #[serde(default)]
        input: Value,
    },
    /// `thinking`, `redacted_thinking`, and anything newer.
    #[serde(other)]
    Other,
}

fn unknown_tool() -> String {
    "?".to_string()
}

impl ContentBlock {
    /// The shell command carried by a `Bash` tool invocation, if this block is one.
    /// Empty commands are treated as absent.
    pub fn shell_command(&self) -> Option<&str> {
        match self {
            ContentBlock::ToolUse { name, input } if name == SHELL_TOOL => input
                .get("command")
                .and_then(|c| c.as_str())
                .filter(|c| !c.is_empty()),
            _ => None,
        }
    }
}

// ─── User events (tool results) ───────────────────────────────────────────

/// `type = "user"`: tool results fed back to the model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserEvent {
    pub message: UserBody,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserBody {
    pub content: UserContent,
}

impl UserEvent {
    fn from_value(value: &Value) -> Self {
        let content = match value.pointer("/message/content") {
            Some(Value::String(text)) => UserContent::Text(text.clone()),
            _ => UserContent::Blocks(blocks_at(value, "/message/content")),
        };
        Self {
            message: UserBody { content },
        }
    }
}

/// A replayed user prompt arrives as a bare string; tool results arrive as
/// a list of blocks.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserContent {
    Blocks(Vec<UserBlock>),
    Text(String),
}

impl Default for UserContent {
    fn default() -> Self {
        UserContent::Blocks(Vec::new())
    }
}

impl UserContent {
    pub fn blocks(&self) -> &[UserBlock] {
        match self {
            UserContent::Blocks(b) => b,
            UserContent::Text(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserBlock {
    ToolResult {
        #[serde(default)]
        content: Option<ToolResultContent>,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

/// Tool result payloads come in two shapes: a bare string, or a list of
/// blocks that may each carry a `text` field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ToolResultBlock>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolResultBlock {
    #[serde(default)]
    pub text: Option<String>,
}

impl ToolResultContent {
    /// Flatten either shape into one string. Blocks are joined with a single
    /// space; a block without text contributes an empty segment.
    pub fn to_text(&self) -> String {
        match self {
            ToolResultContent::Text(s) => s.clone(),
            ToolResultContent::Blocks(blocks) => blocks
                .iter()
                .map(|b| b.text.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

// ─── Terminal result ──────────────────────────────────────────────────────

/// `type = "result"`: the last event of every run.
///
/// All metrics are optional: older CLI versions and error subtypes omit some
/// of them, and the supervisor only echoes them into the log. Each field is
/// read on its own, so `null` or a value of the wrong type leaves just that
/// field empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TerminalResult {
    pub subtype: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub num_turns: Option<u32>,
    pub duration_ms: Option<u64>,
    pub is_error: Option<bool>,
    pub result: Option<String>,
    /// Each entry describes one tool call the CLI refused; the shape has
    /// changed between CLI versions so it is kept opaque.
    pub permission_denials: Vec<Value>,
}

impl TerminalResult {
    pub fn from_value(value: &Value) -> Self {
        Self {
            subtype: field(value, "subtype"),
            total_cost_usd: field(value, "total_cost_usd"),
            num_turns: field(value, "num_turns"),
            duration_ms: field(value, "duration_ms"),
            is_error: field(value, "is_error"),
            result: field(value, "result"),
            permission_denials: field(value, "permission_denials").unwrap_or_default(),
        }
    }

    /// Absent or `null` counts as not an error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms.unwrap_or(0) as f64 / 1000.0
    }
}

// ─── Lenient field access ─────────────────────────────────────────────────

fn field<T: DeserializeOwned>(value: &Value, key: &str) -> Option<T> {
    value.get(key).and_then(|v| T::deserialize(v).ok())
}

/// Decode every element of the array at `pointer`, dropping the ones that do
/// not fit `T`.
fn blocks_at<T: DeserializeOwned>(value: &Value, pointer: &str) -> Vec<T> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|b| T::deserialize(b).ok()).collect())
        .unwrap_or_default()
}
