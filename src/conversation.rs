//! Conversation state: the turns shown to the user.
//!
//! A [`Conversation`] is an ordered list of [`Turn`]s plus the id of the one
//! [`Version`] currently being streamed into.  It is rebuilt wholesale from
//! server history on a session switch and grown in place while chatting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{MessageItem, MessageRole};

/// Who a turn belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting.
    User,
    /// The agent.
    Assistant,
}

/// A citation attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Link target.
    pub href: String,
    /// Link text.
    pub title: String,
}

/// Reasoning shown alongside a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasoning {
    /// The reasoning text.
    pub content: String,
    /// How long the reasoning took, in seconds.
    pub duration: u64,
}

/// One rendition of a turn's text.
///
/// History versions carry `content`.  A streamed version splits its text at
/// the first tool output: `content_pre` narrates up to it and `content_post`
/// holds everything after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Identifier, unique within the conversation.
    pub id: String,
    /// Static text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Streamed text before any tool output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_pre: Option<String>,
    /// Streamed text after a tool output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_post: Option<String>,
}

impl Version {
    /// An empty version ready to be streamed into.
    pub fn streaming(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: None,
            content_pre: Some(String::new()),
            content_post: Some(String::new()),
        }
    }

    /// A version with static text.
    pub fn with_content(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Some(content.into()),
            content_pre: None,
            content_post: None,
        }
    }

    /// Text shown before the turn's tools.
    pub fn pre_text(&self) -> &str {
        self.content_pre
            .as_deref()
            .or(self.content.as_deref())
            .unwrap_or_default()
    }

    /// Text shown after the turn's tools.
    pub fn post_text(&self) -> &str {
        self.content_post.as_deref().unwrap_or_default()
    }
}

/// Lifecycle state of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolStatus {
    /// Arguments are still arriving.
    InputStreaming,
    /// Arguments are complete.
    InputAvailable,
    /// The tool returned a result.
    OutputAvailable,
    /// The tool, or its input, failed.
    OutputError,
}

impl ToolStatus {
    /// Position in the lifecycle.  Both outcomes share the last position.
    pub fn rank(self) -> u8 {
        match self {
            ToolStatus::InputStreaming => 0,
            ToolStatus::InputAvailable => 1,
            ToolStatus::OutputAvailable | ToolStatus::OutputError => 2,
        }
    }

    /// Returns the status after observing `next`.
    ///
    /// A status only moves forward.  Once an outcome is recorded it is kept;
    /// a later outcome of the other kind is ignored.
    pub fn advance(self, next: ToolStatus) -> ToolStatus {
        if next.rank() > self.rank() { next } else { self }
    }

    /// Returns the wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            ToolStatus::InputStreaming => "input-streaming",
            ToolStatus::InputAvailable => "input-available",
            ToolStatus::OutputAvailable => "output-available",
            ToolStatus::OutputError => "output-error",
        }
    }
}

/// A tool call made during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Identifier of the call; unique within a turn.
    pub tool_call_id: String,
    /// Name of the tool, empty until known.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifecycle state.
    pub status: ToolStatus,
    /// Arguments: parsed JSON, or the latest raw input fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Result of the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error text of a failed call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A partial update to a [`ToolInvocation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolUpdate {
    /// Invocation the update applies to.
    pub tool_call_id: String,
    /// New name.
    pub name: Option<String>,
    /// Observed status.
    pub status: Option<ToolStatus>,
    /// New arguments.
    pub parameters: Option<Value>,
    /// New result.
    pub result: Option<Value>,
    /// New error text.
    pub error: Option<String>,
}

impl ToolUpdate {
    /// An update that touches nothing but names the invocation.
    pub fn new(tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            ..Self::default()
        }
    }
}

fn non_empty_str(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn non_empty_value(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null() && v.as_str() != Some(""))
}

impl ToolInvocation {
    fn from_update(update: ToolUpdate) -> Self {
        Self {
            tool_call_id: update.tool_call_id,
            name: non_empty_str(update.name).unwrap_or_default(),
            description: None,
            status: update.status.unwrap_or(ToolStatus::InputStreaming),
            parameters: non_empty_value(update.parameters),
            result: non_empty_value(update.result),
            error: non_empty_str(update.error),
        }
    }

    /// Merges `update` into this invocation.
    ///
    /// Only fields the update carries a non-empty value for change.  Returns
    /// true if the status changed.
    fn merge(&mut self, update: ToolUpdate) -> bool {
        if let Some(name) = non_empty_str(update.name) {
            self.name = name;
        }
        let before = self.status;
        if let Some(status) = update.status {
            self.status = self.status.advance(status);
        }
        if let Some(parameters) = non_empty_value(update.parameters) {
            self.parameters = Some(parameters);
        }
        if let Some(result) = non_empty_value(update.result) {
            self.result = Some(result);
        }
        if let Some(error) = non_empty_str(update.error) {
            self.error = Some(error);
        }
        before != self.status
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// A new invocation was appended.
    Created,
    /// An existing invocation changed status.
    StatusChanged,
    /// An existing invocation was updated without a status change.
    Updated,
}

/// One exchange entry in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Identifier, unique within the conversation.
    pub key: String,
    /// Author.
    pub from: Role,
    /// Renditions; normally exactly one.
    pub versions: Vec<Version>,
    /// Citations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    /// Reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
    /// Tool calls in first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolInvocation>,
}

impl Turn {
    /// A user turn with static text.
    pub fn user(key: impl Into<String>, text: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            versions: vec![Version::with_content(key.clone(), text)],
            key,
            from: Role::User,
            sources: Vec::new(),
            reasoning: None,
            tools: Vec::new(),
        }
    }

    /// An assistant turn holding `version`.
    pub fn assistant(key: impl Into<String>, version: Version) -> Self {
        Self {
            key: key.into(),
            from: Role::Assistant,
            versions: vec![version],
            sources: Vec::new(),
            reasoning: None,
            tools: Vec::new(),
        }
    }

    /// Returns the version with `id`.
    pub fn version(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Returns the version with `id`, mutably.
    pub fn version_mut(&mut self, id: &str) -> Option<&mut Version> {
        self.versions.iter_mut().find(|v| v.id == id)
    }

    /// Returns the tool invocation with `tool_call_id`.
    pub fn tool(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.tools.iter().find(|t| t.tool_call_id == tool_call_id)
    }

    /// Creates the invocation named by `update`, or merges into it.
    pub fn upsert_tool(&mut self, update: ToolUpdate) -> Upserted {
        match self
            .tools
            .iter_mut()
            .find(|t| t.tool_call_id == update.tool_call_id)
        {
            Some(existing) => {
                if existing.merge(update) {
                    Upserted::StatusChanged
                } else {
                    Upserted::Updated
                }
            }
            None => {
                self.tools.push(ToolInvocation::from_update(update));
                Upserted::Created
            }
        }
    }
}

/// The turns of one conversation and its live version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
    streaming_message_id: Option<String>,
    next_seq: u64,
}

impl Conversation {
    /// An empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the turns in display order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns true if there are no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the id of the version being streamed into, if any.
    pub fn streaming_message_id(&self) -> Option<&str> {
        self.streaming_message_id.as_deref()
    }

    /// Removes every turn and the live marker.
    ///
    /// Ids handed out afterwards never repeat earlier ones, so a stale stream
    /// cannot address a turn created after the clear.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.streaming_message_id = None;
    }

    /// Replaces every turn, e.g. with mapped server history.
    pub fn replace(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
        self.streaming_message_id = None;
    }

    /// Appends a user turn and an empty assistant turn, and marks the
    /// assistant's version live.  Returns the live version id.
    pub fn start_exchange(&mut self, text: impl Into<String>) -> String {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.turns.push(Turn::user(format!("user-{seq}"), text));
        let version_id = format!("assistant-{seq}");
        self.turns.push(Turn::assistant(
            version_id.clone(),
            Version::streaming(version_id.clone()),
        ));
        self.streaming_message_id = Some(version_id.clone());
        version_id
    }

    /// Clears the live marker if it still points at `version_id`.
    pub fn finish_exchange(&mut self, version_id: &str) -> bool {
        if self.streaming_message_id.as_deref() == Some(version_id) {
            self.streaming_message_id = None;
            true
        } else {
            false
        }
    }

    /// Returns the turn holding version `version_id`.
    pub fn turn_for_version(&self, version_id: &str) -> Option<&Turn> {
        self.turns.iter().find(|t| t.version(version_id).is_some())
    }

    /// Returns the turn holding version `version_id`, mutably.
    pub fn turn_for_version_mut(&mut self, version_id: &str) -> Option<&mut Turn> {
        self.turns
            .iter_mut()
            .find(|t| t.versions.iter().any(|v| v.id == version_id))
    }
}

impl From<Vec<Turn>> for Conversation {
    fn from(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            streaming_message_id: None,
            next_seq: 0,
        }
    }
}

/////////////////////////////////////////////// history ///////////////////////////////////////////////

/// Renders stored content as display text.
///
/// A string is itself, an object with a string `text` is that text, null is
/// empty, and anything else is its compact JSON.
pub fn content_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("text") {
            Some(Value::String(text)) => text.clone(),
            _ => content.to_string(),
        },
        other => other.to_string(),
    }
}

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_of(obj, keys)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Rebuilds a tool invocation from a stored tool message.
fn tool_from_content(message_id: i64, content: &Value) -> ToolInvocation {
    let parsed;
    let content = match content {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(value @ Value::Object(_)) => {
                parsed = value;
                &parsed
            }
            _ => content,
        },
        _ => content,
    };
    let fallback_id = format!("msg-{message_id}");
    let Value::Object(obj) = content else {
        return ToolInvocation {
            tool_call_id: fallback_id,
            name: String::new(),
            description: None,
            status: ToolStatus::OutputAvailable,
            parameters: None,
            result: non_empty_value(Some(content.clone())),
            error: None,
        };
    };
    let parameters = first_of(obj, &["input", "parameters", "args"]).cloned();
    let result = first_of(obj, &["output", "result"]).cloned();
    let error = first_str(obj, &["errorText", "error_text", "error"]);
    let status = if error.is_some() {
        ToolStatus::OutputError
    } else if result.is_some() {
        ToolStatus::OutputAvailable
    } else {
        ToolStatus::InputAvailable
    };
    ToolInvocation {
        tool_call_id: first_str(obj, &["toolCallId", "tool_call_id", "id"]).unwrap_or(fallback_id),
        name: first_str(obj, &["toolName", "tool_name", "name"]).unwrap_or_default(),
        description: first_str(obj, &["description"]),
        status,
        parameters,
        result,
        error,
    }
}

/// Maps stored messages to turns, one turn per message.
///
/// Tool messages become assistant turns holding a single invocation and no
/// text; user messages become user turns; everything else becomes assistant
/// text.
pub fn turns_from_history(messages: &[MessageItem]) -> Vec<Turn> {
    messages
        .iter()
        .map(|message| {
            let key = format!("msg-{}", message.id);
            match message.role {
                MessageRole::User => Turn::user(key, content_text(&message.content)),
                MessageRole::Tool => {
                    let mut turn = Turn::assistant(
                        key.clone(),
                        Version {
                            id: key,
                            ..Version::default()
                        },
                    );
                    turn.tools.push(tool_from_content(message.id, &message.content));
                    turn
                }
                MessageRole::Assistant | MessageRole::System => {
                    Turn::assistant(key.clone(), Version::with_content(key, content_text(&message.content)))
                }
            }
        })
        .collect()
}
