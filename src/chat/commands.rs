//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to log in, move between sessions, and change settings
//! without sending a prompt to the agent.

use crate::types::ModelSelection;

/// A parsed chat command.
///
/// These commands control the chat front end and are not sent to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Log in with an email address.
    Login(String),

    /// Forget the stored token.
    Logout,

    /// Start a new conversation.
    New,

    /// List recent sessions.
    Sessions,

    /// Switch to a session by id.
    Switch(i64),

    /// Print the current conversation again.
    History,

    /// Enable or disable web search.
    Search(bool),

    /// Change the provider and model.
    Model(ModelSelection),

    /// Show the current configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a prompt.
///
/// # Examples
///
/// ```
/// # use agentchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/switch 12").is_some());
/// assert!(parse_command("What is 6*7?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "login" => match argument {
            Some(email) if email.contains('@') => ChatCommand::Login(email.to_string()),
            Some(_) => ChatCommand::Invalid("/login expects an email address".to_string()),
            None => ChatCommand::Invalid("/login requires an email address".to_string()),
        },
        "logout" => ChatCommand::Logout,
        "new" | "clear" => ChatCommand::New,
        "sessions" | "ls" => ChatCommand::Sessions,
        "switch" | "open" => match argument.map(str::parse::<i64>) {
            Some(Ok(id)) if id > 0 => ChatCommand::Switch(id),
            Some(_) => ChatCommand::Invalid("/switch expects a positive session id".to_string()),
            None => ChatCommand::Invalid("/switch requires a session id".to_string()),
        },
        "history" => ChatCommand::History,
        "search" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Search(value),
            None => ChatCommand::Invalid("/search expects 'on' or 'off'".to_string()),
        },
        "model" => match argument.map(str::parse::<ModelSelection>) {
            Some(Ok(selection)) => ChatCommand::Model(selection),
            Some(Err(err)) => ChatCommand::Invalid(format!("/model {}", err.message())),
            None => ChatCommand::Invalid("/model requires provider/model".to_string()),
        },
        "config" => ChatCommand::ShowConfig,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /login <email>         Log in and store the token
  /logout                Forget the stored token
  /new                   Start a new conversation
  /sessions              List recent sessions
  /switch <id>           Open a session
  /history               Print the current conversation
  /search on|off         Let the agent search the web
  /model <provider/model> Change the model (e.g., /model deepseek/deepseek-chat)
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while a reply is streaming to stop it."#
}
