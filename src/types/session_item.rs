use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A chat session as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionItem {
    /// Server-assigned identifier.
    pub id: i64,

    /// Display title.
    #[serde(default)]
    pub title: String,

    /// Server-defined status code.
    #[serde(default)]
    pub status: i64,

    /// Creation time; absent when the server sent something unparsable.
    #[serde(default, with = "crate::utils::time::lenient")]
    pub created_at: Option<OffsetDateTime>,

    /// Last update time; absent when the server sent something unparsable.
    #[serde(default, with = "crate::utils::time::lenient")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Body of `POST session/create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Optional title for the new session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Response of `POST session/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// Identifier of the new session.
    pub session_id: i64,
}

/// Response of `GET session/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionList {
    /// Sessions, newest first.
    #[serde(default)]
    pub sessions: Vec<SessionItem>,
}

/// Query parameters of `GET session/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSessionsParams {
    /// Maximum number of sessions to return.
    pub limit: Option<u32>,
    /// Pagination cursor.
    pub before: Option<String>,
}

impl ListSessionsParams {
    /// Limit the number of sessions returned.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continue listing before the given cursor.
    pub fn with_before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }
}
