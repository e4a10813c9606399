//! Tool-call lifecycle events.
//!
//! Every event names the invocation it belongs to through `toolCallId`.  Fields
//! that the producer omits deserialize to `None`, so a lenient upstream never
//! turns a lifecycle event into a decoding failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The model started producing arguments for a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInputStartEvent {
    /// Identifier of the tool invocation.
    #[serde(default)]
    pub tool_call_id: String,
    /// Name of the tool being called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// An incremental piece of tool input text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInputDeltaEvent {
    /// Identifier of the tool invocation.
    #[serde(default)]
    pub tool_call_id: String,
    /// The input text fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text_delta: Option<String>,
}

/// The complete tool input is available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInputAvailableEvent {
    /// Identifier of the tool invocation.
    #[serde(default)]
    pub tool_call_id: String,
    /// Name of the tool being called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// The parsed tool input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

/// The tool input could not be produced or validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInputErrorEvent {
    /// Identifier of the tool invocation.
    #[serde(default)]
    pub tool_call_id: String,
    /// Name of the tool being called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// The offending input, when the producer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Description of the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

/// The tool ran and produced output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutputAvailableEvent {
    /// Identifier of the tool invocation.
    #[serde(default)]
    pub tool_call_id: String,
    /// The tool result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// The tool ran and failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutputErrorEvent {
    /// Identifier of the tool invocation.
    #[serde(default)]
    pub tool_call_id: String,
    /// Description of the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}
