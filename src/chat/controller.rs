//! Session orchestration for a chat front end.
//!
//! [`ChatController`] owns the conversation, the current session id and the
//! stream slot.  All of it sits behind one async mutex; a streaming task takes
//! the lock once per decoded item and never holds it across a network read.
//!
//! A controller is cheap to clone.  Clones share state, which is how a signal
//! handler cancels the stream a REPL is waiting on.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::Mutex;

use crate::backend::Backend;
use crate::conversation::{Conversation, turns_from_history};
use crate::logger::{EventLogger, StreamEnd};
use crate::navigation::{Navigator, Route};
use crate::observability::{SESSION_SWITCHES, STREAM_ABORTS, STREAM_DURATION, STREAM_ERRORS};
use crate::projector::{Projector, Update};
use crate::render::Renderer;
use crate::sse::process_sse;
use crate::stream_slot::{StreamSlot, StreamTicket};
use crate::types::{
    AgentChatRequest, ListMessagesParams, ListSessionsParams, ModelSelection, SessionItem,
};
use crate::{Error, Result};

use super::ChatConfig;

/// Longest session title derived from a prompt, in characters.
pub const SESSION_TITLE_CHARS: usize = 50;

/// Number of sessions fetched by a refresh.
pub const SESSION_LIST_LIMIT: u32 = 50;

/// Number of messages fetched when opening a session.
pub const HISTORY_LIMIT: u32 = 200;

/// What the controller is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    /// Idle.
    Ready,
    /// A prompt was accepted; the response has not started.
    Submitted,
    /// A response is streaming.
    Streaming,
    /// The last stream failed; cleared when the stream's terminal block runs.
    Error,
}

/// How a send ended.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The stream ran to its end.
    Completed,
    /// The stream was cancelled or superseded.
    Cancelled,
    /// The stream failed; the error was also written into the turn.
    Failed(Error),
}

/// Per-prompt settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSettings {
    /// Provider and model.
    pub model: ModelSelection,
    /// Whether the agent may search the web.
    pub web_search: bool,
}

impl From<&ChatConfig> for ChatSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            model: config.model.clone(),
            web_search: config.web_search,
        }
    }
}

#[derive(Debug)]
struct ChatState {
    conversation: Conversation,
    session_id: Option<i64>,
    status: ChatStatus,
    loading: bool,
    switch_target: Option<i64>,
    /// Bumped whenever the conversation is replaced by a new chat or a switch.
    epoch: u64,
    slot: StreamSlot,
    settings: ChatSettings,
}

/// Drives conversations against a [`Backend`].
#[derive(Clone)]
pub struct ChatController {
    backend: Arc<dyn Backend>,
    state: Arc<Mutex<ChatState>>,
    sessions: Arc<Mutex<Vec<SessionItem>>>,
    session_gate: Arc<Mutex<()>>,
    logger: Option<Arc<dyn EventLogger>>,
}

impl ChatController {
    /// Creates a controller with an empty conversation.
    pub fn new(backend: Arc<dyn Backend>, settings: ChatSettings) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(ChatState {
                conversation: Conversation::new(),
                session_id: None,
                status: ChatStatus::Ready,
                loading: false,
                switch_target: None,
                epoch: 0,
                slot: StreamSlot::new(),
                settings,
            })),
            sessions: Arc::new(Mutex::new(Vec::new())),
            session_gate: Arc::new(Mutex::new(())),
            logger: None,
        }
    }

    /// Attaches an event logger.
    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn navigator(&self) -> &Navigator {
        self.backend.navigator()
    }

    /// Returns a snapshot of the conversation.
    pub async fn conversation(&self) -> Conversation {
        self.state.lock().await.conversation.clone()
    }

    /// Returns the current session id.
    pub async fn session_id(&self) -> Option<i64> {
        self.state.lock().await.session_id
    }

    /// Returns the current status.
    pub async fn status(&self) -> ChatStatus {
        self.state.lock().await.status
    }

    /// Returns true while a session's history is loading.
    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    /// Returns true while a stream is live.
    pub async fn is_streaming(&self) -> bool {
        self.state.lock().await.slot.is_active()
    }

    /// Returns the cached session list.
    pub async fn sessions(&self) -> Vec<SessionItem> {
        self.sessions.lock().await.clone()
    }

    /// Returns the per-prompt settings.
    pub async fn settings(&self) -> ChatSettings {
        self.state.lock().await.settings.clone()
    }

    /// Changes the provider and model for later prompts.
    pub async fn set_model(&self, model: ModelSelection) {
        self.state.lock().await.settings.model = model;
    }

    /// Enables or disables web search for later prompts.
    pub async fn set_web_search(&self, web_search: bool) {
        self.state.lock().await.settings.web_search = web_search;
    }

    /// Returns the current session id, creating a session if there is none.
    ///
    /// A new session is titled with the first characters of `text`.  The
    /// route is left alone; it moves once the first reply has streamed.
    /// Concurrent callers share a single creation.  If a new chat or a
    /// session switch happens while the session is being created, the created
    /// session is not adopted and this yields [`Error::Abort`].
    pub async fn ensure_session_id(&self, text: &str) -> Result<i64> {
        let epoch = {
            let state = self.state.lock().await;
            match state.session_id.filter(|id| *id > 0) {
                Some(id) => return Ok(id),
                None => state.epoch,
            }
        };
        let _gate = self.session_gate.lock().await;
        if let Some(id) = self.current_session_id().await {
            return Ok(id);
        }
        let title = session_title(text);
        let created = self.backend.create_session(title.as_deref()).await?;
        let mut state = self.state.lock().await;
        if state.epoch != epoch || state.session_id.is_some() {
            tracing::debug!(session_id = created.session_id, "discarding superseded session");
            return Err(Error::abort("session creation superseded"));
        }
        state.session_id = Some(created.session_id);
        Ok(created.session_id)
    }

    async fn current_session_id(&self) -> Option<i64> {
        self.state.lock().await.session_id.filter(|id| *id > 0)
    }

    /// Sends `text` and streams the reply into the conversation.
    ///
    /// Any stream already running is cancelled first.  Failures other than
    /// cancellation are written into the new turn as `Error: <message>` and
    /// returned as [`SendOutcome::Failed`]; only an empty prompt is an `Err`.
    pub async fn send_message(
        &self,
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::validation("message is empty", Some("text".to_string())));
        }

        let (ticket, version_id, settings) = {
            let mut state = self.state.lock().await;
            let ticket = state.slot.replace();
            let version_id = state.conversation.start_exchange(text);
            state.status = ChatStatus::Submitted;
            (ticket, version_id, state.settings.clone())
        };

        let mut projector = Projector::new(&version_id);
        let start = Instant::now();
        let result = self
            .drive(text, &settings, &ticket, &mut projector, renderer)
            .await;
        STREAM_DURATION.add(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(()) => {
                renderer.finish_response();
                SendOutcome::Completed
            }
            Err(err) if err.is_abort() || ticket.is_cancelled() => {
                STREAM_ABORTS.click();
                tracing::debug!(version_id = %version_id, "stream cancelled");
                renderer.print_interrupted();
                SendOutcome::Cancelled
            }
            Err(err) => {
                STREAM_ERRORS.click();
                tracing::warn!(error = %err, "chat stream failed");
                {
                    let mut state = self.state.lock().await;
                    if state.slot.owned_by(&ticket) {
                        state.status = ChatStatus::Error;
                    }
                    projector.append_error(&mut state.conversation, err.message());
                }
                renderer.print_error(err.message());
                SendOutcome::Failed(err)
            }
        };
        if let Some(logger) = &self.logger {
            match &outcome {
                SendOutcome::Completed => logger.log_end(StreamEnd::Completed, None),
                SendOutcome::Cancelled => logger.log_end(StreamEnd::Cancelled, None),
                SendOutcome::Failed(err) => logger.log_end(StreamEnd::Failed, Some(err.message())),
            }
        }

        let session_id = {
            let mut state = self.state.lock().await;
            state.conversation.finish_exchange(&version_id);
            if state.slot.release(&ticket) {
                state.status = ChatStatus::Ready;
            }
            state.session_id
        };

        if !matches!(outcome, SendOutcome::Cancelled) {
            if let Some(id) = session_id {
                let navigator = self.navigator();
                let current = navigator.current();
                if current != Route::Login && current != Route::Session(id) {
                    navigator.navigate(Route::Session(id));
                }
            }
            self.spawn_refresh();
        }
        Ok(outcome)
    }

    async fn drive(
        &self,
        text: &str,
        settings: &ChatSettings,
        ticket: &StreamTicket,
        projector: &mut Projector,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let cancel = ticket.token();
        let aborted = || Error::abort("stream superseded");

        let Some(token) = self.backend.token() else {
            self.navigator().navigate(Route::Login);
            return Err(Error::not_authenticated("Not authenticated"));
        };
        // Runs to completion even when cancelled; a conversation gets at most
        // one session.
        let session_id = self.ensure_session_id(text).await?;
        if cancel.is_cancelled() {
            return Err(aborted());
        }

        let request = AgentChatRequest::new(text)
            .with_session_id(session_id)
            .with_web_search(settings.web_search)
            .with_selection(&settings.model);
        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(aborted()),
            response = self.backend.chat_stream(&request, &token, cancel) => response?,
        };
        tracing::debug!(content_type = %response.content_type, "chat stream opened");
        {
            let mut state = self.state.lock().await;
            if state.slot.owned_by(ticket) {
                state.status = ChatStatus::Streaming;
            }
        }

        let mut items = Box::pin(process_sse(&response.content_type, response.body));
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(aborted()),
                next = items.next() => next,
            };
            let Some(item) = next else {
                return Ok(());
            };
            let item = item?;
            if let Some(logger) = &self.logger {
                logger.log_item(&item);
            }
            let update = {
                let mut state = self.state.lock().await;
                if cancel.is_cancelled() {
                    return Err(aborted());
                }
                projector.apply(&mut state.conversation, &item)
            };
            match update {
                Update::Text { delta, .. } => renderer.print_text(&delta),
                Update::Tool { tool, change } => renderer.print_tool(&tool, change),
                // The decoder ends the stream once the finishing frame is out.
                Update::Finished | Update::Nothing => {}
            }
        }
    }

    /// Cancels the live stream.  Returns false if none was running.
    pub async fn interrupt(&self) -> bool {
        self.state.lock().await.slot.cancel()
    }

    /// Cancels the live stream from a thread outside the async runtime, such
    /// as a signal handler.
    ///
    /// Panics if called from within an async context.
    pub fn interrupt_blocking(&self) -> bool {
        self.state.blocking_lock().slot.cancel()
    }

    /// Opens session `id`: cancels any stream, replaces the conversation with
    /// the session's history and moves to its route.
    ///
    /// Returns the number of turns loaded.  If another switch or a new chat
    /// starts before the history arrives, this one yields [`Error::Abort`]
    /// and changes nothing further.
    pub async fn switch_session(&self, id: i64) -> Result<usize> {
        {
            let mut state = self.state.lock().await;
            state.slot.cancel();
            state.conversation.clear();
            state.loading = true;
            state.switch_target = Some(id);
            state.epoch += 1;
            state.status = ChatStatus::Ready;
        }
        SESSION_SWITCHES.click();

        let params = ListMessagesParams::default().with_limit(HISTORY_LIMIT);
        let result = self.backend.list_messages(id, &params).await;

        let mut state = self.state.lock().await;
        if state.switch_target != Some(id) {
            return Err(Error::abort("session switch superseded"));
        }
        state.switch_target = None;
        state.loading = false;
        let list = result?;
        let turns = turns_from_history(&list.messages);
        let count = turns.len();
        state.conversation.replace(turns);
        state.session_id = Some(id);
        drop(state);

        self.navigator().navigate(Route::Session(id));
        tracing::info!(session_id = id, turns = count, "switched session");
        Ok(count)
    }

    /// Starts an empty conversation with no session.
    pub async fn new_chat(&self) {
        {
            let mut state = self.state.lock().await;
            state.slot.cancel();
            state.conversation.clear();
            state.session_id = None;
            state.switch_target = None;
            state.epoch += 1;
            state.loading = false;
            state.status = ChatStatus::Ready;
        }
        self.navigator().navigate(Route::NewChat);
    }

    /// Re-fetches the session list and replaces the cache.
    pub async fn refresh_sessions(&self) -> Result<Vec<SessionItem>> {
        refresh(self.backend.as_ref(), &self.sessions).await
    }

    fn spawn_refresh(&self) {
        let backend = Arc::clone(&self.backend);
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            if let Err(err) = refresh(backend.as_ref(), &sessions).await {
                tracing::warn!(error = %err, "could not refresh the session list");
            }
        });
    }
}

async fn refresh(
    backend: &dyn Backend,
    cache: &Mutex<Vec<SessionItem>>,
) -> Result<Vec<SessionItem>> {
    let params = ListSessionsParams::default().with_limit(SESSION_LIST_LIMIT);
    let list = backend.list_sessions(&params).await?;
    let mut cache = cache.lock().await;
    *cache = list.sessions;
    Ok(cache.clone())
}

/// Title for a session created from `text`: its first characters, trimmed.
///
/// `None` when nothing is left after trimming.
pub fn session_title(text: &str) -> Option<String> {
    let title: String = text.trim().chars().take(SESSION_TITLE_CHARS).collect();
    (!title.is_empty()).then_some(title)
}

impl std::fmt::Debug for ChatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController").finish_non_exhaustive()
    }
}
