//! Event-stream frame decoding.
//!
//! The generation endpoint speaks a server-sent-events style protocol:
//! events are separated by a blank line and carry their payload on lines
//! prefixed with `data:`. Chunks arrive with arbitrary boundaries, so the
//! decoder keeps a rolling buffer and only emits complete events.

/// Prefix marking a data-bearing line inside an event.
const DATA_PREFIX: &str = "data:";

/// Frame value signalling the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder turning stream chunks into logical frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the last chunk
    pending_bytes: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw byte chunk, buffering any split multi-byte character.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending_bytes);

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text.to_string(),
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the end: keep it for the next chunk
                let valid = e.valid_up_to();
                self.pending_bytes = bytes[valid..].to_vec();
                String::from_utf8_lossy(&bytes[..valid]).into_owned()
            }
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        };

        self.feed(&text)
    }

    /// Feed a text chunk and return every frame it completes, in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        if self.buffer.contains('\r') {
            // A trailing '\r' may be the first half of a CRLF split across chunks
            let held = self.buffer.ends_with('\r');
            if held {
                self.buffer.pop();
            }
            self.buffer = normalize_line_endings(&self.buffer);
            if held {
                self.buffer.push('\r');
            }
        }

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let event: String = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = extract_frame(&event[..end]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Called once the transport closes.
    ///
    /// A trailing event without its terminating blank line is salvaged when
    /// it has at least one data line; anything else left over is discarded.
    pub fn flush(&mut self) -> Vec<String> {
        if !self.pending_bytes.is_empty() {
            let bytes = std::mem::take(&mut self.pending_bytes);
            self.buffer.push_str(&String::from_utf8_lossy(&bytes));
        }

        let rest = normalize_line_endings(&std::mem::take(&mut self.buffer));
        extract_frame(rest.trim_end_matches(['\n', '\r']))
            .into_iter()
            .collect()
    }
}

/// CRLF, LF and a lone CR all end a line.
fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Join the data lines of one event. Returns `None` for events without data
/// or whose data is only whitespace.
fn extract_frame(event: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in event.split('\n') {
        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let frame = data_lines.join("\n");
    if frame.trim().is_empty() {
        None
    } else {
        Some(frame)
    }
}
