//! Server-Sent Events (SSE) decoding for the agent chat stream.
//!
//! This module turns the raw bytes of a chat response into [`StreamItem`]s.
//! Decoding is independent of how the body is split into reads: bytes are
//! buffered until a complete frame (terminated by a blank line) is available,
//! and the remainder is carried into the next read.
//!
//! Decoding never fails on content.  A payload that is not JSON is passed
//! through as literal text, an event type the client does not know is skipped,
//! and only transport errors from the underlying byte stream are surfaced.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio_util::codec::Decoder;

use crate::observability::{STREAM_BYTES, STREAM_EVENTS, STREAM_FRAMES, STREAM_IGNORED, STREAM_MALFORMED};
use crate::{AgentEvent, Error, Result};

/// Content type announcing an event stream.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Marker that introduces a payload line.
const DATA_PREFIX: &str = "data:";

/// Delimiter between frames.
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// One decoded unit of a chat response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StreamItem {
    /// A typed event with a recognised `type`.
    Event(AgentEvent),
    /// Literal text: a non-JSON payload, a fragment pulled out of an untyped
    /// JSON payload, or a chunk of a response that is not an event stream.
    Text(String),
    /// A typed event the client does not handle.
    Ignored {
        /// The `type` the producer sent.
        event_type: String,
    },
    /// The `[DONE]` sentinel.
    Done,
}

impl StreamItem {
    /// Returns true if nothing after this item is consumed.
    pub fn is_terminal(&self) -> bool {
        match self {
            StreamItem::Done => true,
            StreamItem::Event(event) => event.is_terminal(),
            _ => false,
        }
    }
}

///////////////////////////////////////////// FrameCodec /////////////////////////////////////////////

/// Splits a byte buffer into SSE frames.
///
/// A frame is everything before the first `\n\n`; the delimiter itself is
/// consumed.  Frames are decoded as UTF-8 with invalid sequences replaced, so a
/// corrupt byte never drops the frame around it.
#[derive(Debug, Default)]
pub struct FrameCodec {
    next_index: usize,
}

impl FrameCodec {
    /// Creates a new codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        // Resume one byte early: the delimiter may straddle the previous scan.
        // A buffer shorter than the last scan is not the one scanned; rescan it.
        let start = if self.next_index > buf.len() {
            0
        } else {
            self.next_index.saturating_sub(1)
        };
        let found = buf[start..]
            .windows(FRAME_DELIMITER.len())
            .position(|window| window == FRAME_DELIMITER);
        match found {
            Some(offset) => {
                let end = start + offset;
                let frame = buf.split_to(end);
                buf.advance(FRAME_DELIMITER.len());
                self.next_index = 0;
                STREAM_FRAMES.click();
                Ok(Some(String::from_utf8_lossy(&frame).into_owned()))
            }
            None => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // A frame without its terminating blank line is never applied.
                buf.clear();
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

///////////////////////////////////////////// Utf8Carry ////////////////////////////////////////////////

/// Incremental UTF-8 decoder for responses that are not event streams.
///
/// A multi-byte character split across two reads is held back until the rest
/// of it arrives.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

///////////////////////////////////////////// payloads /////////////////////////////////////////////////

/// Returns the `data:` payloads of a frame in order.
///
/// Lines are trimmed before the marker is checked; the marker and any
/// whitespace after it are stripped.  Lines without the marker (`event:`,
/// `id:`, comments) are skipped.
pub fn data_payloads(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split('\n')
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim_start)
}

/// A rule that pulls a text fragment out of an untyped JSON payload.
struct ExtractionRule {
    name: &'static str,
    extract: fn(&Value) -> Option<&str>,
}

/// Extraction rules for JSON payloads without a recognised `type`, tried in
/// order; the first match wins.
///
/// These keep the client usable against producers that stream bare strings,
/// `{"text": …}` / `{"delta": …}` objects, or OpenAI-style chat completion
/// chunks.
const EXTRACTION_RULES: &[ExtractionRule] = &[
    ExtractionRule {
        name: "string",
        extract: Value::as_str,
    },
    ExtractionRule {
        name: "text",
        extract: |value| value.get("text").and_then(Value::as_str),
    },
    ExtractionRule {
        name: "delta",
        extract: |value| value.get("delta").and_then(Value::as_str),
    },
    ExtractionRule {
        name: "choices",
        extract: |value| {
            value
                .get("choices")?
                .get(0)?
                .get("delta")?
                .get("content")?
                .as_str()
        },
    },
];

fn extract_text(value: &Value) -> Option<&str> {
    EXTRACTION_RULES.iter().find_map(|rule| {
        let text = (rule.extract)(value).filter(|text| !text.is_empty())?;
        tracing::trace!(rule = rule.name, "extracted text from untyped payload");
        Some(text)
    })
}

/// Returns the `type` of a payload object when it selects typed dispatch.
///
/// Null, `false`, `0` and `""` do not; any other value does, and a non-string
/// one can never name a known event.
fn typed_dispatch(value: &Value) -> Option<&Value> {
    let ty = value.as_object()?.get("type")?;
    let truthy = match ty {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    };
    truthy.then_some(ty)
}

/// Classifies one `data:` payload.
///
/// Returns `None` when the payload contributes nothing.
pub fn classify_payload(payload: &str) -> Option<StreamItem> {
    if payload == DONE_SENTINEL {
        return Some(StreamItem::Done);
    }
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(err) => {
            STREAM_MALFORMED.click();
            tracing::debug!(error = %err, "payload is not JSON; treating it as text");
            return (!payload.is_empty()).then(|| StreamItem::Text(payload.to_string()));
        }
    };
    if let Some(ty) = typed_dispatch(&value) {
        let event_type = match ty {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !AgentEvent::is_known_type(&event_type) {
            STREAM_IGNORED.click();
            return Some(StreamItem::Ignored { event_type });
        }
        return match serde_json::from_value::<AgentEvent>(value) {
            Ok(event) => {
                STREAM_EVENTS.click();
                Some(StreamItem::Event(event))
            }
            Err(err) => {
                STREAM_IGNORED.click();
                tracing::debug!(error = %err, event_type, "typed payload has unexpected shape");
                Some(StreamItem::Ignored { event_type })
            }
        };
    }
    extract_text(&value).map(|text| StreamItem::Text(text.to_string()))
}

///////////////////////////////////////////// StreamDecoder ////////////////////////////////////////////

#[derive(Debug)]
enum Mode {
    EventStream { codec: FrameCodec, buffer: BytesMut },
    Raw(Utf8Carry),
}

/// Incremental decoder for a chat response body.
///
/// Feed it reads with [`StreamDecoder::push`]; it returns every item the read
/// completed.  Once a terminal item (`[DONE]` or `finish`) is produced the
/// decoder stops: the rest of that read and all later reads are ignored.
#[derive(Debug)]
pub struct StreamDecoder {
    mode: Mode,
    finished: bool,
}

impl StreamDecoder {
    /// Creates a decoder for a response with the given content type.
    ///
    /// Anything that does not announce `text/event-stream` is decoded as plain
    /// text, one item per read.
    pub fn new(content_type: &str) -> Self {
        let mode = if content_type.contains(EVENT_STREAM) {
            Mode::EventStream {
                codec: FrameCodec::new(),
                buffer: BytesMut::new(),
            }
        } else {
            Mode::Raw(Utf8Carry::default())
        };
        Self {
            mode,
            finished: false,
        }
    }

    /// Returns true if the decoder was created for an event stream.
    pub fn is_event_stream(&self) -> bool {
        matches!(self.mode, Mode::EventStream { .. })
    }

    /// Returns true once a terminal item has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decodes one read.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamItem> {
        if self.finished {
            return Vec::new();
        }
        STREAM_BYTES.count(chunk.len() as u64);
        match &mut self.mode {
            Mode::Raw(carry) => {
                let text = carry.decode(chunk);
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![StreamItem::Text(text)]
                }
            }
            Mode::EventStream { codec, buffer } => {
                buffer.extend_from_slice(chunk);
                let mut items = Vec::new();
                while let Ok(Some(frame)) = codec.decode(buffer) {
                    if decode_frame(&frame, &mut items) {
                        self.finished = true;
                        buffer.clear();
                        return items;
                    }
                }
                items
            }
        }
    }

    /// Signals the end of the body and returns anything still held back.
    ///
    /// For an event stream an unterminated trailing frame is discarded.
    pub fn finish(&mut self) -> Vec<StreamItem> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        match &mut self.mode {
            Mode::Raw(carry) => {
                let text = carry.finish();
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![StreamItem::Text(text)]
                }
            }
            Mode::EventStream { codec, buffer } => {
                let mut items = Vec::new();
                while let Ok(Some(frame)) = codec.decode_eof(buffer) {
                    if decode_frame(&frame, &mut items) {
                        buffer.clear();
                        return items;
                    }
                }
                items
            }
        }
    }
}

/// Appends the items of one frame to `items`.
///
/// Returns true if the stream ends with this frame.  `[DONE]` ends it on the
/// spot; a `finish` event lets the rest of its frame through first.
fn decode_frame(frame: &str, items: &mut Vec<StreamItem>) -> bool {
    let mut stop = false;
    for payload in data_payloads(frame) {
        let Some(item) = classify_payload(payload) else {
            continue;
        };
        let done = matches!(item, StreamItem::Done);
        stop |= item.is_terminal();
        items.push(item);
        if done {
            break;
        }
    }
    stop
}

/// Decodes every item of an in-memory body.
///
/// Equivalent to feeding `body` to a fresh decoder in one read and then
/// finishing it.
pub fn decode_all(content_type: &str, body: &[u8]) -> Vec<StreamItem> {
    let mut decoder = StreamDecoder::new(content_type);
    let mut items = decoder.push(body);
    items.extend(decoder.finish());
    items
}

/// Process a stream of bytes into a stream of decoded items.
///
/// The returned stream ends after a terminal item, at the end of the body, or
/// after yielding the first transport error.
///
/// ```
/// use bytes::Bytes;
/// use futures::StreamExt;
/// use agentchat::sse::{StreamItem, process_sse};
///
/// # tokio_test::block_on(async {
/// let chunks = vec![
///     Ok::<_, agentchat::Error>(Bytes::from_static(b"data: hel")),
///     Ok(Bytes::from_static(b"lo\n\ndata: [DONE]\n\ndata: late\n\n")),
/// ];
/// let items: Vec<_> = process_sse("text/event-stream", futures::stream::iter(chunks))
///     .collect()
///     .await;
/// assert_eq!(items.len(), 2);
/// assert!(matches!(&items[0], Ok(StreamItem::Text(text)) if text == "hello"));
/// assert!(matches!(&items[1], Ok(StreamItem::Done)));
/// # })
/// ```
pub fn process_sse<S>(
    content_type: &str,
    byte_stream: S,
) -> impl Stream<Item = Result<StreamItem>> + use<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let decoder = StreamDecoder::new(content_type);
    let queue = VecDeque::new();

    stream::unfold(
        (byte_stream, decoder, queue, false),
        |(mut byte_stream, mut decoder, mut queue, mut failed)| async move {
            loop {
                if let Some(item) = queue.pop_front() {
                    return Some((Ok(item), (byte_stream, decoder, queue, failed)));
                }
                if failed || decoder.is_finished() {
                    return None;
                }
                match byte_stream.next().await {
                    Some(Ok(bytes)) => queue.extend(decoder.push(&bytes)),
                    Some(Err(err)) => {
                        failed = true;
                        return Some((Err(err), (byte_stream, decoder, queue, failed)));
                    }
                    None => {
                        queue.extend(decoder.finish());
                        if queue.is_empty() {
                            return None;
                        }
                    }
                }
            }
        },
    )
}
