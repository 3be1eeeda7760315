//! Subscriber-side framing for the `text/event-stream` transport.
//!
//! Messages are `data: <json>\n\n`. Comment lines (`: keep-alive`) are
//! ignored. Multi-line `data:` fields are joined with `\n` per the SSE rules.

/// One classified line of an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Event(String),
    Data(String),
    Comment,
    /// Message boundary.
    Blank,
    /// `id:`, `retry:` and anything else we do not act on.
    Other,
}

/// Classify a single line (without its trailing newline).
pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return SseLine::Blank;
    }
    if line.starts_with(':') {
        return SseLine::Comment;
    }
    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(strip_one_space(rest).to_string());
    }
    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(strip_one_space(rest).to_string());
    }
    SseLine::Other
}

fn strip_one_space(s: &str) -> &str {
    s.strip_prefix(' ').unwrap_or(s)
}

/// Largest line, and largest joined message, the decoder will buffer.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Incremental decoder: feed raw body chunks, get complete message payloads.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; bytes are held
/// until a newline arrives. A line or message over [`MAX_MESSAGE_BYTES`] is
/// discarded whole and decoding resumes at the next message.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    data_len: usize,
    /// Dropping bytes until the end of the current message.
    skipping: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            match parse_sse_line(&line) {
                SseLine::Blank => {
                    if !self.skipping && !self.data.is_empty() {
                        out.push(self.data.join("\n"));
                    }
                    self.reset_message();
                }
                _ if self.skipping => {}
                SseLine::Data(d) => {
                    self.data_len += d.len() + 1;
                    if self.data_len > MAX_MESSAGE_BYTES {
                        self.skip_message();
                    } else {
                        self.data.push(d);
                    }
                }
                SseLine::Event(_) | SseLine::Comment | SseLine::Other => {}
            }
        }

        if self.pending.len() > MAX_MESSAGE_BYTES {
            self.pending.clear();
            self.skip_message();
        }
        out
    }

    /// Bytes held for an unterminated line.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    fn skip_message(&mut self) {
        self.data.clear();
        self.data_len = 0;
        self.skipping = true;
    }

    fn reset_message(&mut self) {
        self.data.clear();
        self.data_len = 0;
        self.skipping = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_lines() {
        assert_eq!(parse_sse_line("data: {}"), SseLine::Data("{}".into()));
        assert_eq!(parse_sse_line("data:{}"), SseLine::Data("{}".into()));
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Comment);
        assert_eq!(parse_sse_line("\r"), SseLine::Blank);
        assert_eq!(parse_sse_line("event: tick"), SseLine::Event("tick".into()));
        assert_eq!(parse_sse_line("retry: 10"), SseLine::Other);
    }

    #[test]
    fn reassembles_messages_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"data: {\"type\":").is_empty());
        assert!(dec.push(b"\"error\"}\n").is_empty());
        let out = dec.push(b"\n:\n\ndata: 2\n\n");
        assert_eq!(out, vec![r#"{"type":"error"}"#.to_string(), "2".to_string()]);
    }

    #[test]
    fn oversized_line_is_discarded_without_buffering() {
        let mut dec = SseDecoder::new();
        let junk = vec![b'x'; 16 * 1024];
        assert!(dec.push(b"data: ").is_empty());
        for _ in 0..8 {
            assert!(dec.push(&junk).is_empty());
            assert!(dec.buffered() <= MAX_MESSAGE_BYTES + junk.len());
        }
        // tail of the oversized line and its boundary are swallowed
        assert!(dec.push(b"xxxx\n\n").is_empty());
        assert_eq!(dec.push(b"data: ok\n\n"), vec!["ok".to_string()]);
    }

    #[test]
    fn oversized_multiline_message_is_dropped() {
        let mut dec = SseDecoder::new();
        let line = format!("data: {}\n", "y".repeat(1024));
        for _ in 0..70 {
            assert!(dec.push(line.as_bytes()).is_empty());
        }
        assert!(dec.push(b"\n").is_empty());
        assert_eq!(dec.push(b"data: next\n\n"), vec!["next".to_string()]);
    }

    #[test]
    fn multibyte_split_is_not_mangled() {
        let msg = "data: Подарок\n\n".as_bytes();
        let (a, b) = msg.split_at(7);
        let mut dec = SseDecoder::new();
        assert!(dec.push(a).is_empty());
        assert_eq!(dec.push(b), vec!["Подарок".to_string()]);
    }
}
