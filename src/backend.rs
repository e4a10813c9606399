//! The operations a chat controller needs from the backend.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::ChatResponse;
use crate::client::HttpClient;
use crate::navigation::Navigator;
use crate::types::{
    AgentChatRequest, CreateSessionResponse, ListMessagesParams, ListSessionsParams, MessageList,
    SessionList,
};
use crate::Result;

/// Backend seam for [`crate::chat::ChatController`].
///
/// [`HttpClient`] is the production implementation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the stored credential, if any.
    fn token(&self) -> Option<String>;

    /// Returns the navigator 401 responses redirect through.
    fn navigator(&self) -> &Navigator;

    /// Create a session.
    async fn create_session(&self, title: Option<&str>) -> Result<CreateSessionResponse>;

    /// List sessions.
    async fn list_sessions(&self, params: &ListSessionsParams) -> Result<SessionList>;

    /// List the messages of a session.
    async fn list_messages(
        &self,
        session_id: i64,
        params: &ListMessagesParams,
    ) -> Result<MessageList>;

    /// Start a streaming chat request.
    async fn chat_stream(
        &self,
        request: &AgentChatRequest,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse>;
}

#[async_trait]
impl Backend for HttpClient {
    fn token(&self) -> Option<String> {
        self.tokens().get()
    }

    fn navigator(&self) -> &Navigator {
        HttpClient::navigator(self)
    }

    async fn create_session(&self, title: Option<&str>) -> Result<CreateSessionResponse> {
        HttpClient::create_session(self, title).await
    }

    async fn list_sessions(&self, params: &ListSessionsParams) -> Result<SessionList> {
        HttpClient::list_sessions(self, params).await
    }

    async fn list_messages(
        &self,
        session_id: i64,
        params: &ListMessagesParams,
    ) -> Result<MessageList> {
        HttpClient::list_messages(self, session_id, params).await
    }

    async fn chat_stream(
        &self,
        request: &AgentChatRequest,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        HttpClient::chat_stream(self, request, token, cancel).await
    }
}
