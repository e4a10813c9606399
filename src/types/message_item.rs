use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Author of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Written by the user.
    User,
    /// Written by the assistant.
    Assistant,
    /// A system instruction.
    System,
    /// A recorded tool call.
    Tool,
}

/// A message stored in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    /// Server-assigned identifier; ascending ids give conversation order.
    pub id: i64,

    /// Who produced the message.
    pub role: MessageRole,

    /// Trace identifier of the request that produced the message.
    #[serde(default)]
    pub trace_id: Option<String>,

    /// Free-form content: a string, `{text}`, or a tool record.
    #[serde(default)]
    pub content: Value,

    /// Creation time.
    #[serde(default, with = "crate::utils::time::lenient")]
    pub created_at: Option<OffsetDateTime>,

    /// Last update time.
    #[serde(default, with = "crate::utils::time::lenient")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Response of `GET session/{id}/msg/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageList {
    /// Messages in ascending id order.
    #[serde(default)]
    pub messages: Vec<MessageItem>,
}

/// Query parameters of `GET session/{id}/msg/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMessagesParams {
    /// Maximum number of messages to return.
    pub limit: Option<u32>,
    /// Only return messages with an id greater than this.
    pub after_id: Option<i64>,
}

impl ListMessagesParams {
    /// Limit the number of messages returned.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Only return messages after `after_id`.
    pub fn with_after_id(mut self, after_id: i64) -> Self {
        self.after_id = Some(after_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_list_deserialization() {
        let list: MessageList = serde_json::from_value(json!({
            "messages": [
                {"id": 1, "session_id": 100, "role": "user", "content": "Previous message",
                 "created_at": "2025-01-02T03:04:05Z"},
                {"id": 2, "role": "tool", "trace_id": "abc",
                 "content": {"toolCallId": "t1", "toolName": "weather", "output": "sunny"}}
            ]
        }))
        .unwrap();
        assert_eq!(list.messages.len(), 2);
        assert_eq!(list.messages[0].role, MessageRole::User);
        assert_eq!(list.messages[0].content, json!("Previous message"));
        assert_eq!(list.messages[1].role, MessageRole::Tool);
        assert_eq!(list.messages[1].trace_id.as_deref(), Some("abc"));
    }
}
