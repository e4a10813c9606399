//! Streaming chat client for the agent endpoint.
//!
//! [`HttpClient::chat_stream`] issues the request and hands back the raw body;
//! decoding is the job of [`crate::sse`].

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{self, HeaderValue};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::client::{HttpClient, RequestOptions};
use crate::sse::EVENT_STREAM;
use crate::types::{AgentChatRequest, AgentChatResponse};
use crate::{Error, Result};

/// Path of the agent endpoint, relative to the base URL.
pub const AGENT_CHAT_ENDPOINT: &str = "agent/chat";

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A successful response from the agent endpoint, body unread.
pub struct ChatResponse {
    /// HTTP status.
    pub status: u16,
    /// The `Content-Type` header, or empty when absent.
    pub content_type: String,
    /// The response body.
    pub body: ByteStream,
}

impl ChatResponse {
    /// Creates a response from an in-memory sequence of chunks.
    pub fn from_chunks<I, B>(content_type: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        let body = futures::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<Bytes, Error>(chunk.into())),
        );
        Self {
            status: 200,
            content_type: content_type.into(),
            body: Box::pin(body),
        }
    }

    /// Returns true if the server announced an event stream.
    pub fn is_event_stream(&self) -> bool {
        self.content_type.contains(EVENT_STREAM)
    }
}

impl fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Send a prompt and get the streaming response.
    ///
    /// Cancelling `cancel` before the response headers arrive fails with
    /// [`Error::Abort`]; cancelling later is up to whoever reads the body.
    pub async fn chat_stream(
        &self,
        request: &AgentChatRequest,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        let url = self.endpoint(AGENT_CHAT_ENDPOINT)?;
        let mut headers = self.default_headers(RequestOptions::skip_auth());
        headers.insert(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        self.insert_bearer(&mut headers, token);
        tracing::debug!(session_id = ?request.session_id, "starting chat stream");

        let builder = self
            .request_builder(Method::POST, url)
            .headers(headers)
            .json(request);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::abort("chat request cancelled")),
            response = self.execute(builder) => response?,
        };
        let response = self.check_response(response).await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                Error::streaming(format!("Failed to read stream: {}", e), Some(Box::new(e)))
            })
        });
        Ok(ChatResponse {
            status,
            content_type,
            body: Box::pin(body),
        })
    }

    /// Send a prompt and wait for the whole reply.
    pub async fn chat(&self, request: &AgentChatRequest, token: &str) -> Result<AgentChatResponse> {
        let request = request.clone().with_stream(false);
        let url = self.endpoint(AGENT_CHAT_ENDPOINT)?;
        let mut headers = self.default_headers(RequestOptions::skip_auth());
        self.insert_bearer(&mut headers, token);
        let builder = self
            .request_builder(Method::POST, url)
            .headers(headers)
            .json(&request);
        let response = self.execute(builder).await?;
        let response = self.check_response(response).await?;
        response.json::<AgentChatResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}
