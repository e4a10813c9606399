//! Terminal rendering for conversations.
//!
//! This module provides the [`Renderer`] trait the chat controller reports
//! progress through, and [`PlainTextRenderer`], which writes to a terminal with
//! optional ANSI styling.

use std::io::{self, Stdout, Write};

use serde_json::Value;

use crate::conversation::{Conversation, Role, ToolInvocation, ToolStatus, Turn, Upserted};

/// ANSI escape code for dim text (used for ids and user prompts).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for tool names).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for tool input).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for tool result success).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for tool result errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text (used for tool result bodies).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording renderers in tests
pub trait Renderer: Send {
    /// Print a chunk of assistant text.
    ///
    /// This is called incrementally as deltas are decoded from the stream.
    fn print_text(&mut self, text: &str);

    /// Print a tool invocation that was created or changed.
    fn print_tool(&mut self, tool: &ToolInvocation, change: Upserted);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    fn finish_response(&mut self);

    /// Called when the stream is cancelled.
    fn print_interrupted(&mut self) {}

    /// Print a whole turn, e.g. from history.
    ///
    /// Text before the tools, the tools, then text after them.
    fn print_turn(&mut self, turn: &Turn) {
        if turn.from == Role::User {
            let text = turn.versions.first().map(|v| v.pre_text()).unwrap_or_default();
            self.print_info(&format!("> {text}"));
            return;
        }
        for version in &turn.versions {
            self.print_text(version.pre_text());
        }
        for tool in &turn.tools {
            self.print_tool(tool, Upserted::Created);
            if tool.status != ToolStatus::InputStreaming {
                self.print_tool(tool, Upserted::StatusChanged);
            }
        }
        for version in &turn.versions {
            self.print_text(version.post_text());
        }
        self.finish_response();
    }
}

/// Print every turn of `conversation`.
pub fn render_conversation(renderer: &mut dyn Renderer, conversation: &Conversation) {
    for turn in conversation.turns() {
        renderer.print_turn(turn);
    }
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes directly to its output (stdout by default) with
/// optional ANSI escape codes for styling tool calls.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            line_start: true,
        }
    }

    /// Returns the output.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn styled(&mut self, color: &str, text: &str) {
        if self.use_color {
            self.write(&format!("{color}{text}{ANSI_RESET}"));
        } else {
            self.write(text);
        }
    }

    fn ensure_line_start(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn print_tool(&mut self, tool: &ToolInvocation, change: Upserted) {
        let name = if tool.name.is_empty() { "?" } else { tool.name.as_str() };
        match change {
            Upserted::Updated => {}
            Upserted::Created => {
                self.ensure_line_start();
                self.styled(ANSI_CYAN, &format!("[tool: {name}]"));
                self.write(" ");
                self.styled(ANSI_DIM, &format!("({})", tool.tool_call_id));
                self.write("\n");
            }
            Upserted::StatusChanged => {
                self.ensure_line_start();
                match tool.status {
                    ToolStatus::InputStreaming => {}
                    ToolStatus::InputAvailable => {
                        let input = tool.parameters.as_ref().map(compact).unwrap_or_default();
                        self.styled(ANSI_YELLOW, &format!("{name} {input}"));
                        self.write("\n");
                    }
                    ToolStatus::OutputAvailable => {
                        self.styled(
                            ANSI_GREEN,
                            &format!("[tool result: {} (ok)]", tool.tool_call_id),
                        );
                        self.write("\n");
                        if let Some(result) = &tool.result {
                            self.styled(ANSI_MAGENTA, &compact(result));
                            self.write("\n");
                        }
                    }
                    ToolStatus::OutputError => {
                        self.styled(
                            ANSI_RED,
                            &format!("[tool result: {} (error)]", tool.tool_call_id),
                        );
                        self.write("\n");
                        if let Some(error) = &tool.error {
                            self.styled(ANSI_MAGENTA, error);
                            self.write("\n");
                        }
                    }
                }
            }
        }
    }

    fn print_error(&mut self, error: &str) {
        self.ensure_line_start();
        self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write("\n");
    }

    fn print_info(&mut self, info: &str) {
        self.ensure_line_start();
        self.write(info);
        self.write("\n");
    }

    fn finish_response(&mut self) {
        self.ensure_line_start();
    }

    fn print_interrupted(&mut self) {
        self.ensure_line_start();
        self.write("[interrupted]\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ToolUpdate, Version};
    use serde_json::json;

    fn render(use_color: bool, f: impl FnOnce(&mut PlainTextRenderer<Vec<u8>>)) -> String {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), use_color);
        f(&mut renderer);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn turn_renders_pre_tools_post() {
        let mut turn = Turn::assistant("a", Version::streaming("a"));
        turn.versions[0].content_pre = Some("Let me check.".to_string());
        turn.versions[0].content_post = Some("done".to_string());
        turn.upsert_tool(ToolUpdate {
            name: Some("calc".to_string()),
            status: Some(ToolStatus::OutputAvailable),
            result: Some(json!("42")),
            ..ToolUpdate::new("t1")
        });
        let out = render(false, |r| r.print_turn(&turn));
        assert_eq!(
            out,
            "Let me check.\n[tool: calc] (t1)\n[tool result: t1 (ok)]\n42\ndone\n"
        );
    }

    #[test]
    fn errors_start_on_a_new_line() {
        let out = render(false, |r| {
            r.print_text("partial");
            r.print_error("HTTP 500");
        });
        assert_eq!(out, "partial\nError: HTTP 500\n");
    }

    #[test]
    fn color_wraps_tool_name() {
        let tool = ToolInvocation {
            tool_call_id: "t1".to_string(),
            name: "calc".to_string(),
            description: None,
            status: ToolStatus::InputStreaming,
            parameters: None,
            result: None,
            error: None,
        };
        let out = render(true, |r| r.print_tool(&tool, Upserted::Created));
        assert!(out.starts_with(ANSI_CYAN));
        assert!(out.contains("[tool: calc]"));
    }

    #[test]
    fn user_turns_render_as_prompts() {
        let turn = Turn::user("u", "hello");
        let out = render(false, |r| r.print_turn(&turn));
        assert_eq!(out, "> hello\n");
    }
}
