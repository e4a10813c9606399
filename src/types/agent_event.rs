use serde::{Deserialize, Serialize};

use crate::types::{
    TextDeltaEvent, ToolInputAvailableEvent, ToolInputDeltaEvent, ToolInputErrorEvent,
    ToolInputStartEvent, ToolOutputAvailableEvent, ToolOutputErrorEvent,
};

/// A typed event on the agent chat stream.
///
/// Each `data:` payload that carries a recognised `type` deserializes into one
/// of these variants.  Payloads with any other `type` are ignored by the
/// decoder, which keeps older clients working against newer servers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// Narrative text from the assistant.
    #[serde(rename = "text-delta")]
    TextDelta(TextDeltaEvent),

    /// A tool call was announced.
    #[serde(rename = "tool-input-start")]
    ToolInputStart(ToolInputStartEvent),

    /// Incremental tool input text.
    #[serde(rename = "tool-input-delta")]
    ToolInputDelta(ToolInputDeltaEvent),

    /// Tool input is complete.
    #[serde(rename = "tool-input-available")]
    ToolInputAvailable(ToolInputAvailableEvent),

    /// Tool input failed.
    #[serde(rename = "tool-input-error")]
    ToolInputError(ToolInputErrorEvent),

    /// Tool output is available.
    #[serde(rename = "tool-output-available")]
    ToolOutputAvailable(ToolOutputAvailableEvent),

    /// Tool execution failed.
    #[serde(rename = "tool-output-error")]
    ToolOutputError(ToolOutputErrorEvent),

    /// The turn is complete; nothing after this is consumed.
    #[serde(rename = "finish")]
    Finish(FinishEvent),
}

impl AgentEvent {
    /// The wire names of every recognised event type.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "text-delta",
        "tool-input-start",
        "tool-input-delta",
        "tool-input-available",
        "tool-input-error",
        "tool-output-available",
        "tool-output-error",
        "finish",
    ];

    /// Returns true if `ty` names one of the variants above.
    pub fn is_known_type(ty: &str) -> bool {
        Self::KNOWN_TYPES.contains(&ty)
    }

    /// Returns true for events that end consumption of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Finish(_))
    }
}

/// End of the assistant turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishEvent {
    /// Why generation stopped, when the producer says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_value, json};

    #[test]
    fn deserialize_text_delta() {
        let event: AgentEvent = from_value(json!({"type": "text-delta", "delta": "Hi"})).unwrap();
        assert_eq!(event, AgentEvent::TextDelta(TextDeltaEvent::new("Hi")));
    }

    #[test]
    fn deserialize_finish_with_reason() {
        let event: AgentEvent =
            from_value(json!({"type": "finish", "finishReason": "stop"})).unwrap();
        assert!(event.is_terminal());
    }

    #[test]
    fn deserialize_tool_input_start() {
        let event: AgentEvent = from_value(json!({
            "type": "tool-input-start",
            "toolCallId": "t1",
            "toolName": "search"
        }))
        .unwrap();
        match event {
            AgentEvent::ToolInputStart(start) => {
                assert_eq!(start.tool_call_id, "t1");
                assert_eq!(start.tool_name.as_deref(), Some("search"));
            }
            _ => panic!("Expected ToolInputStart variant"),
        }
    }

    #[test]
    fn unknown_type_fails_to_deserialize() {
        assert!(from_value::<AgentEvent>(json!({"type": "reasoning-delta"})).is_err());
        assert!(!AgentEvent::is_known_type("reasoning-delta"));
        assert!(AgentEvent::is_known_type("tool-output-error"));
    }
}
