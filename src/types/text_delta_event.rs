use serde::{Deserialize, Serialize};

/// A piece of assistant narrative text.
///
/// The agent service sends the fragment as `delta`; some producers use
/// `textDelta` instead, which is accepted as an alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDeltaEvent {
    /// The text fragment to append.
    #[serde(default, alias = "textDelta")]
    pub delta: String,
}

impl TextDeltaEvent {
    /// Create a new `TextDeltaEvent` with the given fragment.
    pub fn new(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
        }
    }
}
