// Public modules
pub mod agent_event;
pub mod chat_request;
pub mod login;
pub mod message_item;
pub mod session_item;
pub mod text_delta_event;
pub mod tool_events;

// Re-exports
pub use agent_event::{AgentEvent, FinishEvent};
pub use chat_request::{AgentChatRequest, AgentChatResponse, ModelSelection};
pub use login::{LoginRequest, LoginResponse};
pub use message_item::{ListMessagesParams, MessageItem, MessageList, MessageRole};
pub use session_item::{
    CreateSessionRequest, CreateSessionResponse, ListSessionsParams, SessionItem, SessionList,
};
pub use text_delta_event::TextDeltaEvent;
pub use tool_events::{
    ToolInputAvailableEvent, ToolInputDeltaEvent, ToolInputErrorEvent, ToolInputStartEvent,
    ToolOutputAvailableEvent, ToolOutputErrorEvent,
};
