//! Logging trait for chat stream traffic.
//!
//! This module provides the [`EventLogger`] trait that captures every request
//! sent to the agent endpoint and every item decoded from its response, and
//! [`JsonlEventLogger`], which appends them to a file as JSON lines.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::sse::StreamItem;
use crate::{AgentChatRequest, Result};

/// How a stream ended, as recorded by an [`EventLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    /// The body ended or a terminal item arrived.
    Completed,
    /// The stream was cancelled by the client.
    Cancelled,
    /// The request or the body failed.
    Failed,
}

/// A trait for logging agent chat traffic.
///
/// Implement this trait to capture the requests a chat controller issues and
/// the items it decodes, for example to replay a misbehaving stream later.
///
/// # Example
///
/// ```rust,ignore
/// use agentchat::{AgentChatRequest, EventLogger, StreamEnd, StreamItem};
///
/// struct StderrLogger;
///
/// impl EventLogger for StderrLogger {
///     fn log_request(&self, request: &AgentChatRequest) {
///         eprintln!("request: {}", request.prompt);
///     }
///
///     fn log_item(&self, item: &StreamItem) {
///         eprintln!("item: {item:?}");
///     }
///
///     fn log_end(&self, end: StreamEnd, error: Option<&str>) {
///         eprintln!("end: {end:?} {error:?}");
///     }
/// }
/// ```
pub trait EventLogger: Send + Sync {
    /// Log a request about to be sent to the agent endpoint.
    fn log_request(&self, request: &AgentChatRequest);

    /// Log one item decoded from the response.
    ///
    /// Called for every item, including ignored events and the terminal one.
    fn log_item(&self, item: &StreamItem);

    /// Log the end of a stream.
    fn log_end(&self, end: StreamEnd, error: Option<&str>);
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Request {
        ts: String,
        request: &'a AgentChatRequest,
    },
    Item {
        ts: String,
        item: &'a StreamItem,
    },
    End {
        ts: String,
        end: StreamEnd,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    },
}

/// An [`EventLogger`] that appends one JSON object per line to a file.
pub struct JsonlEventLogger {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlEventLogger {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write(&self, record: &Record<'_>) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "could not serialize event log record");
                return;
            }
        };
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        if let Err(err) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            tracing::warn!(error = %err, "could not write event log record");
        }
    }
}

fn now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

impl EventLogger for JsonlEventLogger {
    fn log_request(&self, request: &AgentChatRequest) {
        self.write(&Record::Request { ts: now(), request });
    }

    fn log_item(&self, item: &StreamItem) {
        self.write(&Record::Item { ts: now(), item });
    }

    fn log_end(&self, end: StreamEnd, error: Option<&str>) {
        self.write(&Record::End {
            ts: now(),
            end,
            error,
        });
    }
}
