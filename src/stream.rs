//! Incremental decoder for server-sent-event chat-completion streams.
//!
//! The transport delivers raw byte chunks with no alignment guarantees:
//! a multi-byte UTF-8 sequence or an SSE frame may be split across chunk
//! boundaries. [`SseDecoder`] carries the undecodable tail bytes and the
//! unterminated line fragment between calls, so every complete frame is
//! decoded exactly once and in arrival order.
//!
//! Frames are newline-delimited. Only frames starting with `data:` are
//! significant; the literal payload `[DONE]` ends the stream without error;
//! any frame whose JSON fails to parse is discarded as a partial frame and
//! the loop continues. Nothing here can fail.

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A non-empty text fragment from `choices[0].delta.content`.
    Delta(String),
    /// The `[DONE]` terminator frame.
    Done,
}

/// Stateful SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of an incomplete UTF-8 sequence from the previous chunk.
    utf8_carry: Vec<u8>,
    /// An unterminated line from the previous chunk.
    line_carry: String,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a raw byte chunk, returning the events it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }
        let text = self.decode_utf8(chunk);
        self.split_lines(&text)
    }

    /// Flush the trailing unterminated line at end of stream.
    ///
    /// Servers normally terminate the final frame; this makes the decoder
    /// total over truncated streams as well.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.done || self.line_carry.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.line_carry);
        let mut events = Vec::new();
        self.decode_frame(&line, &mut events);
        events
    }

    /// Decode a chunk to text, carrying incomplete UTF-8 tails over.
    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.utf8_carry);
        bytes.extend_from_slice(chunk);

        let mut out = String::new();
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // Safe: `from_utf8` vouched for this prefix.
                    out.push_str(std::str::from_utf8(&rest[..valid]).expect("valid prefix"));
                    match e.error_len() {
                        // Truly invalid bytes: skip them and keep decoding.
                        Some(bad) => rest = &rest[valid + bad..],
                        // Incomplete sequence at the end: carry it over.
                        None => {
                            self.utf8_carry = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Split decoded text into frames, carrying the unterminated tail.
    fn split_lines(&mut self, text: &str) -> Vec<SseEvent> {
        let mut buffer = std::mem::take(&mut self.line_carry);
        buffer.push_str(text);

        let mut events = Vec::new();
        let mut rest = buffer.as_str();
        while let Some(pos) = rest.find('\n') {
            let (line, tail) = rest.split_at(pos);
            self.decode_frame(line, &mut events);
            rest = &tail[1..];
            if self.done {
                return events;
            }
        }
        self.line_carry = rest.to_string();
        events
    }

    /// Decode a single frame line into zero or one event.
    fn decode_frame(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        let trimmed = line.trim();
        let Some(payload) = trimmed.strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            self.done = true;
            events.push(SseEvent::Done);
            return;
        }
        // Malformed JSON means a partial frame split at a chunk boundary:
        // discard locally, never surface.
        let Ok(json) = serde_json::from_str::<serde_json::Value>(payload) else {
            tracing::trace!(frame = %payload, "discarding undecodable stream frame");
            return;
        };
        if let Some(delta) = json["choices"][0]["delta"]["content"].as_str() {
            if !delta.is_empty() {
                events.push(SseEvent::Delta(delta.to_string()));
            }
        }
    }
}
