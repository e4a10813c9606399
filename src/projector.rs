//! Projects decoded stream items onto the live turn.
//!
//! A [`Projector`] is created per assistant turn.  It owns the text routing
//! state and knows which version it writes into; everything else lives in the
//! [`Conversation`] it is handed on each call, so the caller decides how the
//! conversation is shared and locked.

use serde_json::Value;

use crate::conversation::{Conversation, ToolInvocation, ToolStatus, ToolUpdate, Upserted};
use crate::sse::StreamItem;
use crate::AgentEvent;

/// Where streamed text goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRoute {
    /// Before any tool output: text narrates what the agent is doing.
    #[default]
    Narrating,
    /// After a tool produced output: text follows the tool display.
    PostTool,
}

/// The visible effect of applying one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Text was appended.
    Text {
        /// Buffer the text went to.
        route: TextRoute,
        /// The appended text.
        delta: String,
    },
    /// A tool invocation was created or changed.
    Tool {
        /// Snapshot after the change.
        tool: ToolInvocation,
        /// How the invocation changed.
        change: Upserted,
    },
    /// The stream is complete.
    Finished,
    /// Nothing visible changed.
    Nothing,
}

/// Applies stream items to one live version.
#[derive(Debug, Clone)]
pub struct Projector {
    version_id: String,
    route: TextRoute,
}

impl Projector {
    /// Creates a projector writing into `version_id`.
    pub fn new(version_id: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            route: TextRoute::Narrating,
        }
    }

    /// Returns the version this projector writes into.
    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    /// Returns the current text route.
    pub fn route(&self) -> TextRoute {
        self.route
    }

    /// Applies `item` to `conversation`.
    ///
    /// If the version no longer exists (the conversation was cleared or
    /// replaced) nothing changes.
    pub fn apply(&mut self, conversation: &mut Conversation, item: &StreamItem) -> Update {
        match item {
            StreamItem::Done => Update::Finished,
            StreamItem::Ignored { .. } => Update::Nothing,
            StreamItem::Text(text) => self.append_text(conversation, text),
            StreamItem::Event(event) => self.apply_event(conversation, event),
        }
    }

    fn apply_event(&mut self, conversation: &mut Conversation, event: &AgentEvent) -> Update {
        match event {
            AgentEvent::TextDelta(delta) => self.append_text(conversation, &delta.delta),
            AgentEvent::ToolInputStart(start) => self.upsert(
                conversation,
                ToolUpdate {
                    name: start.tool_name.clone(),
                    status: Some(ToolStatus::InputStreaming),
                    ..ToolUpdate::new(&start.tool_call_id)
                },
            ),
            // Each fragment replaces the last; fragments are not concatenated.
            AgentEvent::ToolInputDelta(delta) => self.upsert(
                conversation,
                ToolUpdate {
                    parameters: Some(Value::String(
                        delta.input_text_delta.clone().unwrap_or_default(),
                    )),
                    ..ToolUpdate::new(&delta.tool_call_id)
                },
            ),
            AgentEvent::ToolInputAvailable(available) => self.upsert(
                conversation,
                ToolUpdate {
                    name: available.tool_name.clone(),
                    status: Some(ToolStatus::InputAvailable),
                    parameters: available.input.clone(),
                    ..ToolUpdate::new(&available.tool_call_id)
                },
            ),
            AgentEvent::ToolInputError(error) => self.upsert(
                conversation,
                ToolUpdate {
                    name: error.tool_name.clone(),
                    status: Some(ToolStatus::OutputError),
                    parameters: error.input.clone(),
                    error: error.error_text.clone(),
                    ..ToolUpdate::new(&error.tool_call_id)
                },
            ),
            AgentEvent::ToolOutputAvailable(output) => {
                self.route = TextRoute::PostTool;
                self.upsert(
                    conversation,
                    ToolUpdate {
                        status: Some(ToolStatus::OutputAvailable),
                        result: output.output.clone(),
                        ..ToolUpdate::new(&output.tool_call_id)
                    },
                )
            }
            AgentEvent::ToolOutputError(error) => self.upsert(
                conversation,
                ToolUpdate {
                    status: Some(ToolStatus::OutputError),
                    error: error.error_text.clone(),
                    ..ToolUpdate::new(&error.tool_call_id)
                },
            ),
            AgentEvent::Finish(_) => Update::Finished,
        }
    }

    fn append_text(&mut self, conversation: &mut Conversation, text: &str) -> Update {
        if text.is_empty() {
            return Update::Nothing;
        }
        let Some(version) = conversation
            .turn_for_version_mut(&self.version_id)
            .and_then(|turn| turn.version_mut(&self.version_id))
        else {
            return Update::Nothing;
        };
        let buffer = match self.route {
            TextRoute::Narrating => &mut version.content_pre,
            TextRoute::PostTool => &mut version.content_post,
        };
        buffer.get_or_insert_with(String::new).push_str(text);
        Update::Text {
            route: self.route,
            delta: text.to_string(),
        }
    }

    fn upsert(&mut self, conversation: &mut Conversation, update: ToolUpdate) -> Update {
        let Some(turn) = conversation.turn_for_version_mut(&self.version_id) else {
            return Update::Nothing;
        };
        let tool_call_id = update.tool_call_id.clone();
        let change = turn.upsert_tool(update);
        match turn.tool(&tool_call_id) {
            Some(tool) => Update::Tool {
                tool: tool.clone(),
                change,
            },
            None => Update::Nothing,
        }
    }

    /// Writes `Error: <message>` after the version's post-tool text.
    pub fn append_error(&self, conversation: &mut Conversation, message: &str) {
        let Some(version) = conversation
            .turn_for_version_mut(&self.version_id)
            .and_then(|turn| turn.version_mut(&self.version_id))
        else {
            return;
        };
        let post = version.content_post.get_or_insert_with(String::new);
        if !post.is_empty() {
            post.push('\n');
        }
        post.push_str("Error: ");
        post.push_str(message);
    }
}
