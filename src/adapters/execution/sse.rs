//! Server-sent-event decoding for the streaming execution endpoint.
//!
//! The backend answers `POST /task/stream` with frames of the form
//! `data: <json>\n\n`. Each frame is either a progress event or the terminal
//! result:
//!
//! ```text
//! data: {"type":"event","event":{"type":"output","content":"Reading files"}}
//!
//! data: {"type":"result","success":true,"output":"Done"}
//! ```

use futures::Stream;
use serde::Deserialize;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{trace, warn};

use crate::domain::models::{ExecutionResult, StreamEventKind};
use crate::domain::ports::ExecutionError;

/// One decoded frame from the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendFrame {
    /// Progress event.
    Event { event: StreamEventKind },
    /// Final result; ends the stream.
    Result(ExecutionResult),
}

/// Decodes a byte stream into [`BackendFrame`]s.
///
/// Transport errors before the first frame surface as
/// [`ExecutionError::Transport`]; after a frame has been decoded they become
/// [`ExecutionError::Interrupted`] because progress was already observed.
pub struct SseFrameStream<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    frames_seen: usize,
    finished: bool,
}

impl<S, B, E> SseFrameStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    /// Decoder over a raw byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: Box::pin(stream),
            buffer: Vec::new(),
            frames_seen: 0,
            finished: false,
        }
    }

    /// Extract the joined `data:` payload of one frame, if any.
    fn frame_data(raw: &str) -> Option<String> {
        let data: Vec<&str> = raw
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|d| d.strip_prefix(' ').unwrap_or(d))
            .collect();

        if data.is_empty() {
            return None;
        }
        let data = data.join("\n");
        let trimmed = data.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            return None;
        }
        Some(data)
    }

    fn decode(&mut self, raw: &[u8]) -> Option<Result<BackendFrame, ExecutionError>> {
        let raw = String::from_utf8_lossy(raw);
        let data = Self::frame_data(&raw)?;

        match serde_json::from_str::<BackendFrame>(&data) {
            Ok(frame) => {
                self.frames_seen += 1;
                trace!(frames = self.frames_seen, "decoded backend frame");
                Some(Ok(frame))
            }
            Err(err) => {
                warn!(error = %err, data = %data, "malformed backend frame");
                Some(Err(ExecutionError::Protocol(format!("invalid frame: {err}"))))
            }
        }
    }

    /// Pop the next complete frame out of the buffer.
    fn next_buffered(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let frame = self.buffer[..end].to_vec();
        self.buffer.drain(..end + 2);
        Some(frame)
    }
}

impl<S, B, E> Stream for SseFrameStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    type Item = Result<BackendFrame, ExecutionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(raw) = this.next_buffered() {
                if let Some(frame) = this.decode(&raw) {
                    return Poll::Ready(Some(frame));
                }
                continue;
            }

            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buffer
                        .extend(chunk.as_ref().iter().copied().filter(|b| *b != b'\r'));
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    let message = err.to_string();
                    return Poll::Ready(Some(Err(if this.frames_seen == 0 {
                        ExecutionError::Transport(message)
                    } else {
                        ExecutionError::Interrupted(message)
                    })));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    if this.buffer.iter().all(u8::is_ascii_whitespace) {
                        return Poll::Ready(None);
                    }
                    // Final frame without its blank-line terminator.
                    let rest = std::mem::take(&mut this.buffer);
                    if let Some(frame) = this.decode(&rest) {
                        return Poll::Ready(Some(frame));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
