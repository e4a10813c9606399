// Public modules
pub mod agent;
pub mod backend;
pub mod chat;
pub mod client;
pub mod conversation;
pub mod error;
pub mod logger;
pub mod navigation;
pub mod observability;
pub mod projector;
pub mod render;
pub mod sessions;
pub mod sse;
pub mod stream_slot;
pub mod token;
pub mod types;
pub mod utils;

// Re-exports
pub use agent::{AGENT_CHAT_ENDPOINT, ByteStream, ChatResponse};
pub use backend::Backend;
pub use client::{DEFAULT_API_URL, HttpClient, RequestOptions};
pub use conversation::{
    Conversation, Reasoning, Role, Source, ToolInvocation, ToolStatus, ToolUpdate, Turn, Upserted,
    Version, content_text, turns_from_history,
};
pub use error::{Error, Result};
pub use logger::{EventLogger, JsonlEventLogger, StreamEnd};
pub use navigation::{Navigator, Route};
pub use observability::register_biometrics;
pub use projector::{Projector, TextRoute, Update};
pub use render::{PlainTextRenderer, Renderer, render_conversation};
pub use sse::{
    DONE_SENTINEL, EVENT_STREAM, FrameCodec, StreamDecoder, StreamItem, classify_payload,
    decode_all, process_sse,
};
pub use stream_slot::{StreamSlot, StreamTicket};
pub use token::{FileTokenStore, MemoryTokenStore, TOKEN_DIR_ENV, TokenStore};
pub use types::*;
