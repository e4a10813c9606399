//! Integration tests for the agentchat library.
//!
//! The controller tests run against an in-memory backend; the HTTP tests run
//! against a throwaway server on a loopback socket.

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use agentchat::chat::{ChatController, ChatSettings, ChatStatus, SendOutcome};
    use agentchat::{
        AgentChatRequest, Backend, ByteStream, ChatResponse, CreateSessionResponse, Error,
        HttpClient, ListMessagesParams, ListSessionsParams, MemoryTokenStore, MessageItem,
        MessageList, MessageRole, Navigator, Renderer, Result, Route, SessionItem, SessionList,
        TokenStore, ToolInvocation, ToolStatus, Upserted,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    const EVENT_STREAM: &str = "text/event-stream";

    /////////////////////////////////////////// fake backend ///////////////////////////////////////////

    enum Reply {
        Chunks(Vec<Vec<u8>>),
        Pending,
        Fail(Error),
    }

    struct FakeBackend {
        navigator: Navigator,
        tokens: MemoryTokenStore,
        created: AtomicUsize,
        next_session: AtomicI64,
        titles: Mutex<Vec<Option<String>>>,
        requests: Mutex<Vec<AgentChatRequest>>,
        replies: Mutex<VecDeque<Reply>>,
        history: Mutex<HashMap<i64, Vec<MessageItem>>>,
        creation_gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                navigator: Navigator::new(Route::NewChat),
                tokens: MemoryTokenStore::with_token("tok"),
                created: AtomicUsize::new(0),
                next_session: AtomicI64::new(100),
                titles: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                replies: Mutex::new(VecDeque::new()),
                history: Mutex::new(HashMap::new()),
                creation_gate: None,
            }
        }

        /// Session creation waits for `gate` before answering.
        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                creation_gate: Some(gate),
                ..Self::new()
            }
        }

        fn reply(&self, reply: Reply) -> &Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        fn reply_body(&self, body: &str) -> &Self {
            self.reply(Reply::Chunks(vec![body.as_bytes().to_vec()]))
        }

        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        fn token(&self) -> Option<String> {
            self.tokens.get()
        }

        fn navigator(&self) -> &Navigator {
            &self.navigator
        }

        async fn create_session(&self, title: Option<&str>) -> Result<CreateSessionResponse> {
            self.created.fetch_add(1, Ordering::SeqCst);
            self.titles.lock().unwrap().push(title.map(String::from));
            if let Some(gate) = &self.creation_gate {
                gate.notified().await;
            }
            Ok(CreateSessionResponse {
                session_id: self.next_session.fetch_add(1, Ordering::SeqCst),
            })
        }

        async fn list_sessions(&self, _: &ListSessionsParams) -> Result<SessionList> {
            Ok(SessionList {
                sessions: vec![SessionItem {
                    id: 100,
                    title: "first".to_string(),
                    status: 0,
                    created_at: None,
                    updated_at: None,
                }],
            })
        }

        async fn list_messages(&self, id: i64, _: &ListMessagesParams) -> Result<MessageList> {
            match self.history.lock().unwrap().get(&id) {
                Some(messages) => Ok(MessageList {
                    messages: messages.clone(),
                }),
                None => Err(Error::http(404, "session not found")),
            }
        }

        async fn chat_stream(
            &self,
            request: &AgentChatRequest,
            _: &str,
            _: &CancellationToken,
        ) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Chunks(chunks)) => Ok(ChatResponse::from_chunks(EVENT_STREAM, chunks)),
                Some(Reply::Pending) => {
                    let body: ByteStream = Box::pin(futures::stream::pending::<Result<Bytes>>());
                    Ok(ChatResponse {
                        status: 200,
                        content_type: EVENT_STREAM.to_string(),
                        body,
                    })
                }
                Some(Reply::Fail(err)) => Err(err),
                None => Ok(ChatResponse::from_chunks(EVENT_STREAM, Vec::<Vec<u8>>::new())),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        text: String,
        tools: Vec<(String, Upserted)>,
        errors: Vec<String>,
        interrupted: usize,
    }

    impl Renderer for Recorder {
        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn print_tool(&mut self, tool: &ToolInvocation, change: Upserted) {
            self.tools.push((tool.tool_call_id.clone(), change));
        }

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }

        fn print_info(&mut self, _: &str) {}

        fn finish_response(&mut self) {}

        fn print_interrupted(&mut self) {
            self.interrupted += 1;
        }
    }

    fn controller(backend: &Arc<FakeBackend>) -> ChatController {
        let backend: Arc<dyn Backend> = Arc::clone(backend) as Arc<dyn Backend>;
        ChatController::new(backend, ChatSettings::default())
    }

    fn frame(value: serde_json::Value) -> String {
        format!("data: {value}\n\n")
    }

    fn tool_scenario() -> String {
        [
            frame(json!({"type": "text-delta", "delta": "Let me check, café. "})),
            frame(json!({"type": "tool-input-start", "toolCallId": "t1", "toolName": "calc"})),
            frame(json!({"type": "tool-input-available", "toolCallId": "t1", "input": {"x": 6}})),
            frame(json!({"type": "tool-output-available", "toolCallId": "t1", "output": "42"})),
            frame(json!({"type": "text-delta", "delta": "done"})),
            frame(json!({"type": "finish"})),
        ]
        .concat()
    }

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    /////////////////////////////////////////// controller ///////////////////////////////////////////

    #[tokio::test]
    async fn text_delta_then_finish() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_body("data: {\"type\":\"text-delta\",\"delta\":\"Hi\"}\n\ndata: {\"type\":\"finish\"}\n\n");
        let controller = controller(&backend);
        let mut recorder = Recorder::default();

        let outcome = controller.send_message("Hello", &mut recorder).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Completed));

        let conversation = controller.conversation().await;
        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].versions[0].pre_text(), "Hello");
        assert_eq!(turns[1].versions[0].pre_text(), "Hi");
        assert_eq!(turns[1].versions[0].post_text(), "");
        assert_eq!(conversation.streaming_message_id(), None);
        assert_eq!(recorder.text, "Hi");
        assert_eq!(controller.status().await, ChatStatus::Ready);
        assert!(!controller.is_streaming().await);
    }

    #[tokio::test]
    async fn tool_output_splits_the_text() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_body(&tool_scenario());
        let controller = controller(&backend);
        let mut recorder = Recorder::default();

        controller.send_message("What is 6*7?", &mut recorder).await.unwrap();

        let conversation = controller.conversation().await;
        let turn = &conversation.turns()[1];
        assert_eq!(turn.tools.len(), 1);
        let tool = &turn.tools[0];
        assert_eq!(tool.tool_call_id, "t1");
        assert_eq!(tool.name, "calc");
        assert_eq!(tool.status, ToolStatus::OutputAvailable);
        assert_eq!(tool.result, Some(json!("42")));
        assert_eq!(turn.versions[0].pre_text(), "Let me check, café. ");
        assert_eq!(turn.versions[0].post_text(), "done");
        assert_eq!(recorder.tools[0], ("t1".to_string(), Upserted::Created));
    }

    #[tokio::test]
    async fn chunk_boundaries_do_not_matter() {
        let body = tool_scenario().into_bytes();

        let reference = {
            let backend = Arc::new(FakeBackend::new());
            backend.reply(Reply::Chunks(vec![body.clone()]));
            let controller = controller(&backend);
            controller.send_message("q", &mut Recorder::default()).await.unwrap();
            controller.conversation().await
        };

        for split in 1..body.len() {
            let backend = Arc::new(FakeBackend::new());
            backend.reply(Reply::Chunks(vec![
                body[..split].to_vec(),
                body[split..].to_vec(),
            ]));
            let controller = controller(&backend);
            controller.send_message("q", &mut Recorder::default()).await.unwrap();
            assert_eq!(
                controller.conversation().await.turns(),
                reference.turns(),
                "split at byte {split}"
            );
        }
    }

    #[tokio::test]
    async fn two_sends_create_one_session() {
        let backend = Arc::new(FakeBackend::new());
        backend
            .reply_body(&frame(json!({"type": "finish"})))
            .reply_body(&frame(json!({"type": "finish"})));
        let controller = controller(&backend);

        controller.send_message("first question", &mut Recorder::default()).await.unwrap();
        controller.send_message("second question", &mut Recorder::default()).await.unwrap();

        assert_eq!(backend.created(), 1);
        assert_eq!(
            backend.titles.lock().unwrap().as_slice(),
            &[Some("first question".to_string())]
        );
        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.session_id == Some(100)));
        assert!(requests.iter().all(|r| r.stream));
        assert_eq!(controller.session_id().await, Some(100));
        assert_eq!(backend.navigator.current(), Route::Session(100));
    }

    #[tokio::test]
    async fn superseded_stream_leaves_no_error() {
        let backend = Arc::new(FakeBackend::new());
        backend
            .reply(Reply::Pending)
            .reply_body(&frame(json!({"type": "text-delta", "delta": "second"})));
        let controller = controller(&backend);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let mut recorder = Recorder::default();
                let outcome = controller.send_message("first", &mut recorder).await;
                (outcome, recorder)
            })
        };
        for _ in 0..100 {
            if controller.status().await == ChatStatus::Streaming {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(controller.status().await, ChatStatus::Streaming);

        let mut recorder = Recorder::default();
        let outcome = controller.send_message("second", &mut recorder).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Completed));

        let (outcome, first_recorder) = first.await.unwrap();
        assert!(matches!(outcome.unwrap(), SendOutcome::Cancelled));
        assert!(first_recorder.errors.is_empty());
        assert_eq!(first_recorder.interrupted, 1);

        let conversation = controller.conversation().await;
        let turns = conversation.turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[1].versions[0].pre_text(), "");
        assert!(!turns[1].versions[0].post_text().contains("Error:"));
        assert_eq!(turns[3].versions[0].pre_text(), "second");
        assert_eq!(backend.created(), 1);
        assert_eq!(controller.status().await, ChatStatus::Ready);
    }

    #[tokio::test]
    async fn interrupt_cancels_quietly() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply(Reply::Pending);
        let controller = controller(&backend);

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let mut recorder = Recorder::default();
                controller.send_message("wait", &mut recorder).await
            })
        };
        for _ in 0..100 {
            if controller.status().await == ChatStatus::Streaming {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(controller.interrupt().await);
        assert!(matches!(task.await.unwrap().unwrap(), SendOutcome::Cancelled));
        assert!(!controller.interrupt().await);
        assert_eq!(controller.status().await, ChatStatus::Ready);
        assert_eq!(controller.conversation().await.streaming_message_id(), None);
    }

    #[tokio::test]
    async fn done_and_finish_stop_consumption() {
        for terminator in ["data: [DONE]\n\n", "data: {\"type\":\"finish\"}\n\n"] {
            let backend = Arc::new(FakeBackend::new());
            let body = format!(
                "{}{}{}",
                frame(json!({"type": "text-delta", "delta": "a"})),
                terminator,
                frame(json!({"type": "text-delta", "delta": "b"})),
            );
            backend.reply_body(&body);
            let controller = controller(&backend);
            controller.send_message("q", &mut Recorder::default()).await.unwrap();
            assert_eq!(controller.conversation().await.turns()[1].versions[0].pre_text(), "a");
        }
    }

    #[tokio::test]
    async fn finish_lets_the_rest_of_its_frame_through() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_body(concat!(
            "data: {\"type\":\"text-delta\",\"delta\":\"a\"}\n\n",
            "data: {\"type\":\"finish\"}\ndata: {\"type\":\"text-delta\",\"delta\":\"b\"}\n\n",
            "data: {\"type\":\"text-delta\",\"delta\":\"c\"}\n\n",
        ));
        let controller = controller(&backend);
        let mut recorder = Recorder::default();
        let outcome = controller.send_message("q", &mut recorder).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Completed));
        assert_eq!(recorder.text, "ab");
        assert_eq!(controller.conversation().await.turns()[1].versions[0].pre_text(), "ab");
    }

    #[tokio::test]
    async fn malformed_payloads_are_shown_verbatim() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_body("data: not json\n\ndata: {\"type\":\"finish\"}\n\n");
        let controller = controller(&backend);
        controller.send_message("q", &mut Recorder::default()).await.unwrap();
        assert_eq!(
            controller.conversation().await.turns()[1].versions[0].pre_text(),
            "not json"
        );
    }

    #[tokio::test]
    async fn tool_input_deltas_keep_the_last_write() {
        let backend = Arc::new(FakeBackend::new());
        let body = [
            frame(json!({"type": "tool-input-start", "toolCallId": "t1", "toolName": "search"})),
            frame(json!({"type": "tool-input-delta", "toolCallId": "t1", "inputTextDelta": "{\"q\":"})),
            frame(json!({"type": "tool-input-delta", "toolCallId": "t1", "inputTextDelta": "\"rust\"}"})),
        ]
        .concat();
        backend.reply_body(&body);
        let controller = controller(&backend);
        controller.send_message("q", &mut Recorder::default()).await.unwrap();

        let conversation = controller.conversation().await;
        let tool = &conversation.turns()[1].tools[0];
        assert_eq!(tool.status, ToolStatus::InputStreaming);
        assert_eq!(tool.parameters, Some(json!("\"rust\"}")));
    }

    #[tokio::test]
    async fn http_errors_are_written_into_the_turn() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply(Reply::Fail(Error::http(500, "boom")));
        let controller = controller(&backend);
        let mut recorder = Recorder::default();

        let outcome = controller.send_message("q", &mut recorder).await.unwrap();
        match outcome {
            SendOutcome::Failed(err) => assert_eq!(err.status_code(), Some(500)),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(recorder.errors, vec!["boom".to_string()]);
        assert_eq!(
            controller.conversation().await.turns()[1].versions[0].post_text(),
            "Error: boom"
        );
        assert_eq!(controller.status().await, ChatStatus::Ready);
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let backend = Arc::new(FakeBackend::new());
        backend.tokens.clear().unwrap();
        let controller = controller(&backend);

        let outcome = controller.send_message("q", &mut Recorder::default()).await.unwrap();
        match outcome {
            SendOutcome::Failed(err) => assert!(err.is_not_authenticated()),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(backend.created(), 0);
        assert!(backend.requests.lock().unwrap().is_empty());
        assert_eq!(backend.navigator.current(), Route::Login);
        assert_eq!(
            controller.conversation().await.turns()[1].versions[0].post_text(),
            "Error: Not authenticated"
        );
    }

    #[tokio::test]
    async fn empty_prompts_are_rejected() {
        let backend = Arc::new(FakeBackend::new());
        let controller = controller(&backend);
        assert!(controller.send_message("   ", &mut Recorder::default()).await.is_err());
        assert!(controller.conversation().await.is_empty());
    }

    #[tokio::test]
    async fn switching_loads_history() {
        let backend = Arc::new(FakeBackend::new());
        backend.history.lock().unwrap().insert(
            7,
            vec![
                MessageItem {
                    id: 1,
                    role: MessageRole::User,
                    trace_id: None,
                    content: json!("What is 6*7?"),
                    created_at: None,
                    updated_at: None,
                },
                MessageItem {
                    id: 2,
                    role: MessageRole::Assistant,
                    trace_id: None,
                    content: json!({"text": "42"}),
                    created_at: None,
                    updated_at: None,
                },
            ],
        );
        let controller = controller(&backend);

        assert_eq!(controller.switch_session(7).await.unwrap(), 2);
        assert_eq!(controller.session_id().await, Some(7));
        assert!(!controller.is_loading().await);
        assert_eq!(backend.navigator.current(), Route::Session(7));
        let conversation = controller.conversation().await;
        assert_eq!(conversation.turns()[0].key, "msg-1");
        assert_eq!(conversation.turns()[1].versions[0].pre_text(), "42");

        // The next prompt goes to the opened session.
        backend.reply_body(&frame(json!({"type": "finish"})));
        controller.send_message("and 7*8?", &mut Recorder::default()).await.unwrap();
        assert_eq!(backend.created(), 0);
        assert_eq!(backend.requests.lock().unwrap()[0].session_id, Some(7));
    }

    #[tokio::test]
    async fn failed_switch_keeps_the_route() {
        let backend = Arc::new(FakeBackend::new());
        let controller = controller(&backend);
        assert!(controller.switch_session(9).await.is_err());
        assert!(!controller.is_loading().await);
        assert_eq!(backend.navigator.current(), Route::NewChat);
    }

    #[tokio::test]
    async fn new_chat_forgets_the_session() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_body(&frame(json!({"type": "finish"})));
        let controller = controller(&backend);
        controller.send_message("q", &mut Recorder::default()).await.unwrap();
        assert_eq!(backend.navigator.current(), Route::Session(100));

        controller.new_chat().await;
        assert!(controller.conversation().await.is_empty());
        assert_eq!(controller.session_id().await, None);
        assert_eq!(backend.navigator.current(), Route::NewChat);
    }

    async fn wait_for_creation(backend: &FakeBackend) {
        for _ in 0..100 {
            if backend.created() > 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("session creation never started");
    }

    #[tokio::test]
    async fn new_chat_discards_a_session_still_being_created() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(Arc::clone(&gate)));
        let controller = controller(&backend);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let mut recorder = Recorder::default();
                controller.send_message("first conversation", &mut recorder).await
            })
        };
        wait_for_creation(&backend).await;
        controller.new_chat().await;
        gate.notify_one();

        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Cancelled));
        assert_eq!(controller.session_id().await, None);
        assert!(controller.conversation().await.is_empty());
        assert_eq!(backend.navigator.current(), Route::NewChat);
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn switch_keeps_its_session_over_a_pending_creation() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(Arc::clone(&gate)));
        backend.history.lock().unwrap().insert(7, Vec::new());
        let controller = controller(&backend);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let mut recorder = Recorder::default();
                controller.send_message("first conversation", &mut recorder).await
            })
        };
        wait_for_creation(&backend).await;
        assert_eq!(controller.switch_session(7).await.unwrap(), 0);
        gate.notify_one();

        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Cancelled));
        assert_eq!(controller.session_id().await, Some(7));
        assert_eq!(backend.navigator.current(), Route::Session(7));
    }

    #[tokio::test]
    async fn completed_streams_refresh_the_session_list() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_body(&frame(json!({"type": "finish"})));
        let controller = controller(&backend);
        assert!(controller.sessions().await.is_empty());
        controller.send_message("q", &mut Recorder::default()).await.unwrap();
        settle().await;
        assert_eq!(controller.sessions().await.len(), 1);
    }

    /////////////////////////////////////////// http ///////////////////////////////////////////

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    struct Canned {
        status: u16,
        content_type: &'static str,
        body: String,
    }

    impl Canned {
        fn json(status: u16, body: serde_json::Value) -> Self {
            Self {
                status,
                content_type: "application/json",
                body: body.to_string(),
            }
        }
    }

    type Router = Arc<dyn Fn(&str, &str) -> Canned + Send + Sync>;

    /// Serves `router` on a loopback port.  Returns the API base URL and the
    /// request heads seen so far.
    async fn serve(router: Router) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(handle(socket, Arc::clone(&router), Arc::clone(&log)));
            }
        });
        (format!("http://{addr}/api/"), seen)
    }

    async fn handle(mut socket: TcpStream, router: Router, log: Arc<Mutex<Vec<String>>>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let mut parts = head.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();
        log.lock().unwrap().push(head.clone());

        let reply = router(&method, &path);
        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.status,
            reply.content_type,
            reply.body.len(),
            reply.body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    fn http_client(base: &str, token: Option<&str>, route: Route) -> (HttpClient, Navigator) {
        let tokens: Arc<dyn TokenStore> = match token {
            Some(token) => Arc::new(MemoryTokenStore::with_token(token)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        let navigator = Navigator::new(route);
        let client = HttpClient::new(base, tokens, navigator.clone()).unwrap();
        (client, navigator)
    }

    #[tokio::test]
    async fn unauthorized_clears_the_token() {
        let (base, _) = serve(Arc::new(|_: &str, _: &str| {
            Canned::json(401, json!({"error": "expired"}))
        }))
        .await;
        let (client, navigator) = http_client(&base, Some("stale"), Route::Session(3));

        let err = client
            .list_sessions(&ListSessionsParams::default())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(client.tokens().get(), None);
        assert_eq!(navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn error_bodies_become_messages() {
        let (base, _) = serve(Arc::new(|_: &str, path: &str| {
            if path.starts_with("/api/session/list") {
                Canned::json(500, json!({"error": "boom"}))
            } else {
                Canned {
                    status: 404,
                    content_type: "text/html",
                    body: "<h1>missing</h1>".to_string(),
                }
            }
        }))
        .await;
        let (client, navigator) = http_client(&base, Some("tok"), Route::NewChat);

        let err = client
            .list_sessions(&ListSessionsParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.message(), "boom");

        let err = client
            .list_messages(5, &ListMessagesParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.message(), "HTTP 404");

        assert_eq!(client.tokens().get().as_deref(), Some("tok"));
        assert_eq!(navigator.current(), Route::NewChat);
    }

    #[tokio::test]
    async fn login_stores_the_token() {
        let (base, seen) = serve(Arc::new(|method: &str, path: &str| {
            assert_eq!((method, path), ("POST", "/api/auth/login"));
            Canned::json(200, json!({"token": "fresh"}))
        }))
        .await;
        let (client, navigator) = http_client(&base, None, Route::Login);

        client.login("a@example.com").await.unwrap();
        assert_eq!(client.tokens().get().as_deref(), Some("fresh"));
        assert_eq!(navigator.current(), Route::NewChat);
        let head = seen.lock().unwrap()[0].to_lowercase();
        assert!(!head.contains("authorization"));

        client.logout().unwrap();
        assert_eq!(client.tokens().get(), None);
        assert_eq!(navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn rejected_chat_stream_logs_out() {
        let (base, _) = serve(Arc::new(|_: &str, path: &str| match path {
            "/api/session/create" => Canned::json(200, json!({"sessionId": 7})),
            "/api/agent/chat" => Canned::json(401, json!({"error": "expired"})),
            _ => Canned::json(200, json!({"sessions": []})),
        }))
        .await;
        let (client, navigator) = http_client(&base, Some("stale"), Route::NewChat);
        let tokens = Arc::clone(client.tokens());
        let controller = ChatController::new(Arc::new(client), ChatSettings::default());

        let outcome = controller
            .send_message("Hello", &mut Recorder::default())
            .await
            .unwrap();
        let SendOutcome::Failed(err) = outcome else {
            panic!("expected a failed send");
        };
        assert!(err.is_unauthorized());
        assert_eq!(tokens.get(), None);
        assert_eq!(navigator.current(), Route::Login);
        assert_eq!(
            controller.conversation().await.turns()[1].versions[0].post_text(),
            "Error: Unauthorized"
        );
    }

    #[tokio::test]
    async fn chat_stream_errors_use_the_body_or_the_status() {
        let (base, _) = serve(Arc::new(|_: &str, path: &str| match path {
            "/api/session/create" => Canned::json(200, json!({"sessionId": 7})),
            "/api/agent/chat" => Canned {
                status: 502,
                content_type: "text/html",
                body: "<h1>bad gateway</h1>".to_string(),
            },
            _ => Canned::json(200, json!({"sessions": []})),
        }))
        .await;
        let (client, _) = http_client(&base, Some("tok"), Route::NewChat);
        let controller = ChatController::new(Arc::new(client), ChatSettings::default());

        let mut recorder = Recorder::default();
        let outcome = controller.send_message("Hello", &mut recorder).await.unwrap();
        let SendOutcome::Failed(err) = outcome else {
            panic!("expected a failed send");
        };
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(recorder.errors, vec!["HTTP 502".to_string()]);
    }

    #[tokio::test]
    async fn streams_a_reply_over_http() {
        let (base, seen) = serve(Arc::new(|method: &str, path: &str| {
            match (method, path) {
                ("POST", "/api/session/create") => Canned::json(200, json!({"sessionId": 7})),
                ("POST", "/api/agent/chat") => Canned {
                    status: 200,
                    content_type: "text/event-stream",
                    body: "data: {\"type\":\"text-delta\",\"delta\":\"Hi\"}\n\n\
                           data: {\"type\":\"finish\"}\n\n"
                        .to_string(),
                },
                _ => Canned::json(200, json!({"sessions": []})),
            }
        }))
        .await;
        let (client, navigator) = http_client(&base, Some("tok"), Route::NewChat);
        let controller = ChatController::new(Arc::new(client), ChatSettings::default());

        let outcome = controller
            .send_message("Hello", &mut Recorder::default())
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::Completed));
        assert_eq!(controller.session_id().await, Some(7));
        assert_eq!(navigator.current(), Route::Session(7));
        assert_eq!(
            controller.conversation().await.turns()[1].versions[0].pre_text(),
            "Hi"
        );

        let heads = seen.lock().unwrap().clone();
        let chat = heads
            .iter()
            .map(|head| head.to_lowercase())
            .find(|head| head.starts_with("post /api/agent/chat"))
            .unwrap();
        assert!(chat.contains("authorization: bearer tok"));
        assert!(chat.contains("accept: text/event-stream"));
    }
}
