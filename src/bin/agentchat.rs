//! Interactive terminal client for the agent chat service.
//!
//! This binary provides a streaming REPL against the agent backend: prompts
//! are sent to the agent and its reply, including tool calls, is printed as it
//! streams.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage against http://localhost:3001/api/
//! agentchat
//!
//! # Another backend and model
//! agentchat --api-url https://chat.example/api/ --model openai/gpt-4o
//!
//! # Let the agent search the web
//! agentchat --web-search
//!
//! # Record every stream as JSON lines
//! agentchat --event-log events.jsonl
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/login <email>` - Log in
//! - `/sessions` - List recent sessions
//! - `/switch <id>` - Open a session
//! - `/new` - Start a new conversation
//! - `/help` - Show available commands
//! - `/quit` - Exit the application
//!
//! Set `AGENTCHAT_LOG` (e.g. `AGENTCHAT_LOG=agentchat=debug`) for diagnostics
//! on stderr.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use agentchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatController, ChatSettings, PlainTextRenderer, Renderer,
    SendOutcome, help_text, parse_command, render_conversation,
};
use agentchat::utils::time;
use agentchat::{
    Backend, FileTokenStore, HttpClient, JsonlEventLogger, Navigator, Route, TokenStore,
};
use url::Url;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "AGENTCHAT_LOG";

/// Main entry point for the agentchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("agentchat [OPTIONS]");
    let config = ChatConfig::resolve(args)?;
    init_tracing();

    let base_url = Url::parse(&config.api_url)?;
    let tokens: Arc<dyn TokenStore> = match &config.token_file {
        Some(path) => Arc::new(FileTokenStore::new(path)),
        None => Arc::new(FileTokenStore::for_origin(&base_url)?),
    };
    let navigator = Navigator::new(if tokens.get().is_some() {
        Route::NewChat
    } else {
        Route::Login
    });
    let client = Arc::new(HttpClient::new(
        &config.api_url,
        Arc::clone(&tokens),
        navigator.clone(),
    )?);

    let backend: Arc<dyn Backend> = client.clone();
    let mut controller = ChatController::new(backend, ChatSettings::from(&config));
    if let Some(path) = &config.event_log {
        controller = controller.with_logger(Arc::new(JsonlEventLogger::open(path)?));
    }

    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a reply streams stops the reply, not the program.
    let interrupter = controller.clone();
    ctrlc::set_handler(move || {
        interrupter.interrupt_blocking();
    })?;

    println!("Agent Chat ({}, model: {})", client.base_url(), config.model);
    println!("Type /help for commands, /quit to exit\n");
    if navigator.current() == Route::Login {
        renderer.print_info("Not logged in. Use /login <email> first.");
    }

    loop {
        let readline = rl.readline(&prompt(navigator.current()));

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Login(email) => match client.login(&email).await {
                            Ok(_) => renderer.print_info(&format!("Logged in as {email}.")),
                            Err(err) => {
                                renderer.print_error(&format!("Login failed: {}", err.message()))
                            }
                        },
                        ChatCommand::Logout => {
                            controller.new_chat().await;
                            match client.logout() {
                                Ok(()) => renderer.print_info("Logged out."),
                                Err(err) => renderer.print_error(err.message()),
                            }
                        }
                        ChatCommand::New => {
                            controller.new_chat().await;
                            renderer.print_info("Started a new conversation.");
                        }
                        ChatCommand::Sessions => match controller.refresh_sessions().await {
                            Ok(sessions) if sessions.is_empty() => {
                                renderer.print_info("No sessions yet.")
                            }
                            Ok(sessions) => {
                                let current = controller.session_id().await;
                                for session in sessions {
                                    let marker = if Some(session.id) == current { "*" } else { " " };
                                    println!(
                                        "  {marker} {:>6}  {}  {}",
                                        session.id,
                                        time::display(session.updated_at.as_ref()),
                                        session.title
                                    );
                                }
                            }
                            Err(err) => report(&mut renderer, &err),
                        },
                        ChatCommand::Switch(id) => match controller.switch_session(id).await {
                            Ok(count) => {
                                renderer.print_info(&format!(
                                    "Opened session {id} ({count} messages)."
                                ));
                                render_conversation(
                                    &mut renderer,
                                    &controller.conversation().await,
                                );
                            }
                            Err(err) => report(&mut renderer, &err),
                        },
                        ChatCommand::History => {
                            let conversation = controller.conversation().await;
                            if conversation.is_empty() {
                                renderer.print_info("Nothing here yet.");
                            } else {
                                render_conversation(&mut renderer, &conversation);
                            }
                        }
                        ChatCommand::Search(enabled) => {
                            controller.set_web_search(enabled).await;
                            let state = if enabled { "enabled" } else { "disabled" };
                            renderer.print_info(&format!("Web search {state}."));
                        }
                        ChatCommand::Model(selection) => {
                            renderer.print_info(&format!("Model changed to: {selection}"));
                            controller.set_model(selection).await;
                        }
                        ChatCommand::ShowConfig => {
                            print_config(&client, &controller, &navigator, &config).await;
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to the agent
                println!("Agent:");
                match controller.send_message(line, &mut renderer).await {
                    Ok(SendOutcome::Failed(err)) if err.is_unauthorized() => {
                        renderer.print_info("Your session has expired. Use /login <email>.");
                    }
                    Ok(SendOutcome::Failed(err)) if err.is_not_authenticated() => {
                        renderer.print_info("Use /login <email> first.");
                    }
                    Ok(_) => {}
                    Err(err) => renderer.print_error(err.message()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn prompt(route: Route) -> String {
    match route {
        Route::Login => "(login) You: ".to_string(),
        Route::NewChat => "You: ".to_string(),
        Route::Session(id) => format!("[{id}] You: "),
    }
}

fn report(renderer: &mut PlainTextRenderer, err: &agentchat::Error) {
    renderer.print_error(err.message());
    if err.is_unauthorized() {
        renderer.print_info("Your session has expired. Use /login <email>.");
    }
}

async fn print_config(
    client: &HttpClient,
    controller: &ChatController,
    navigator: &Navigator,
    config: &ChatConfig,
) {
    let settings = controller.settings().await;
    println!("    Current Configuration:");
    println!("      API URL: {}", client.base_url());
    println!("      Model: {}", settings.model);
    println!(
        "      Web search: {}",
        if settings.web_search { "on" } else { "off" }
    );
    println!("      Route: {}", navigator.current());
    match controller.session_id().await {
        Some(id) => println!("      Session: {id}"),
        None => println!("      Session: (none)"),
    }
    println!(
        "      Logged in: {}",
        if client.tokens().get().is_some() { "yes" } else { "no" }
    );
    if let Some(path) = &config.event_log {
        println!("      Event log: {}", path.display());
    }
    println!(
        "      Colors: {}",
        if config.use_color { "enabled" } else { "disabled" }
    );
}
