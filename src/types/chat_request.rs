use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Body of a request to the agent chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentChatRequest {
    /// Session the prompt belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,

    /// The user's prompt.
    pub prompt: String,

    /// Whether the response should be an event stream.
    pub stream: bool,

    /// Whether the agent may search the web.
    pub web_search: bool,

    /// Provider override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentChatRequest {
    /// Create a streaming request for `prompt` with web search disabled.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            session_id: None,
            prompt: prompt.into(),
            stream: true,
            web_search: false,
            provider: None,
            model: None,
        }
    }

    /// Attach the request to a session.
    pub fn with_session_id(mut self, session_id: i64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Enable or disable web search.
    pub fn with_web_search(mut self, web_search: bool) -> Self {
        self.web_search = web_search;
        self
    }

    /// Set whether the response is streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Apply a provider/model selection.
    pub fn with_selection(mut self, selection: &ModelSelection) -> Self {
        self.provider = selection.provider.clone();
        self.model = Some(selection.model.clone());
        self
    }
}

/// Response of the non-streaming chat call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentChatResponse {
    /// The complete assistant text.
    #[serde(default)]
    pub text: String,
}

/// A model choice written as `provider/model`.
///
/// The string is split at the first `/`.  Without a slash the whole string is
/// the model name and no provider is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelSelection {
    /// The provider, if one was named.
    pub provider: Option<String>,
    /// The model name.
    pub model: String,
}

impl ModelSelection {
    /// The model offered when nothing else is configured.
    pub const DEFAULT: &'static str = "deepseek/deepseek-chat";
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            provider: Some("deepseek".to_string()),
            model: "deepseek-chat".to_string(),
        }
    }
}

impl FromStr for ModelSelection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (provider, model) = match s.split_once('/') {
            Some((provider, model)) => (Some(provider), model),
            None => (None, s),
        };
        if model.is_empty() {
            return Err(crate::Error::validation(
                format!("model selection '{s}' names no model"),
                Some("model".to_string()),
            ));
        }
        Ok(Self {
            provider: provider.filter(|p| !p.is_empty()).map(String::from),
            model: model.to_string(),
        })
    }
}

impl TryFrom<String> for ModelSelection {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ModelSelection> for String {
    fn from(selection: ModelSelection) -> Self {
        selection.to_string()
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{provider}/{}", self.model),
            None => write!(f, "{}", self.model),
        }
    }
}
