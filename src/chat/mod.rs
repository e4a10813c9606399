//! Chat front end for the agent backend.
//!
//! This module provides everything an interactive client needs on top of the
//! HTTP layer:
//!
//! - Session orchestration with single-stream cancellation
//! - Streaming replies projected into conversation state
//! - Slash commands for login, sessions and settings
//! - Configuration from flags, a YAML file and the environment
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`controller`]: conversation state and session orchestration
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod controller;

pub use crate::render::{PlainTextRenderer, Renderer, render_conversation};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{API_URL_ENV, ChatArgs, ChatConfig, ConfigFile, TOKEN_FILE_ENV};
pub use controller::{
    ChatController, ChatSettings, ChatStatus, HISTORY_LIMIT, SESSION_LIST_LIMIT,
    SESSION_TITLE_CHARS, SendOutcome, session_title,
};
