//! Session API: create, list, and read the history of chat sessions.
//!
//! These are thin wrappers over [`HttpClient`]; nothing is cached here.

use reqwest::Method;

use crate::client::{HttpClient, RequestOptions};
use crate::observability::SESSIONS_CREATED;
use crate::types::{
    CreateSessionRequest, CreateSessionResponse, ListMessagesParams, ListSessionsParams,
    MessageList, SessionList,
};
use crate::Result;

impl HttpClient {
    /// Create a session, optionally titled.
    pub async fn create_session(&self, title: Option<&str>) -> Result<CreateSessionResponse> {
        let request = CreateSessionRequest {
            title: title.map(String::from),
        };
        let response: CreateSessionResponse = self
            .post("session/create", Some(&request), RequestOptions::default())
            .await?;
        SESSIONS_CREATED.click();
        tracing::info!(session_id = response.session_id, "created session");
        Ok(response)
    }

    /// List sessions.
    pub async fn list_sessions(&self, params: &ListSessionsParams) -> Result<SessionList> {
        let mut url = self.endpoint("session/list")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(limit) = params.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(before) = &params.before {
                query.append_pair("before", before);
            }
        }
        strip_empty_query(&mut url);
        self.send_json::<_, ()>(Method::GET, url, None, RequestOptions::default())
            .await
    }

    /// List the stored messages of a session.
    pub async fn list_messages(
        &self,
        session_id: i64,
        params: &ListMessagesParams,
    ) -> Result<MessageList> {
        let mut url = self.endpoint(&format!("session/{session_id}/msg/list"))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(limit) = params.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(after_id) = params.after_id {
                query.append_pair("afterId", &after_id.to_string());
            }
        }
        strip_empty_query(&mut url);
        self.send_json::<_, ()>(Method::GET, url, None, RequestOptions::default())
            .await
    }
}

fn strip_empty_query(url: &mut url::Url) {
    if url.query() == Some("") {
        url.set_query(None);
    }
}
