//! Incremental decoding of newline-delimited streaming chat responses.
//!
//! The chat endpoint streams one JSON object per line:
//!
//! ```text
//! {"message":{"content":"Hi"}}\n{"message":{"content":" there"}}\n
//! ```
//!
//! Chunks arrive with arbitrary boundaries, so [`StreamDecoder`] keeps the
//! bytes after the last newline pending until the rest of the line arrives.
//! Because only whole lines are decoded, a chunk boundary inside a line or
//! inside a multi-byte UTF-8 sequence never corrupts later lines.

use crate::util::truncate_str;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Deserialize)]
struct ChatChunk {
    message: ChunkMessage,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    content: String,
}

/// A complete line that could not be decoded. Never fatal to the stream.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed stream line ({reason}): {preview}")]
pub struct LineError {
    /// Start of the offending line, for logging
    pub preview: String,
    pub reason: String,
}

/// Text decoded from one `feed` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedOutcome {
    /// Content appended to the accumulated text by this call
    pub appended: String,
    /// Lines that were skipped because they failed to decode
    pub errors: Vec<LineError>,
}

impl FeedOutcome {
    /// True when this call changed the accumulated text
    pub fn has_text(&self) -> bool {
        !self.appended.is_empty()
    }
}

/// Reassembles newline-delimited JSON fragments into the response text
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
    accumulated: String,
    lines_decoded: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, decoding every line completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();
        self.pending.extend_from_slice(chunk);

        let Some(boundary) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return outcome;
        };

        let complete: Vec<u8> = self.pending.drain(..=boundary).collect();
        for line in complete.split(|b| *b == b'\n') {
            self.decode_line(line, &mut outcome);
        }
        outcome
    }

    /// Signal end-of-stream. A final line without a trailing newline is
    /// decoded once here.
    pub fn finish(&mut self) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();
        let rest = std::mem::take(&mut self.pending);
        self.decode_line(&rest, &mut outcome);
        outcome
    }

    /// All content decoded so far
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    pub fn into_text(self) -> String {
        self.accumulated
    }

    /// Number of lines successfully decoded
    pub fn lines_decoded(&self) -> usize {
        self.lines_decoded
    }

    /// Bytes waiting for the rest of their line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn decode_line(&mut self, line: &[u8], outcome: &mut FeedOutcome) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }

        match serde_json::from_slice::<ChatChunk>(line) {
            Ok(chunk) => {
                self.accumulated.push_str(&chunk.message.content);
                outcome.appended.push_str(&chunk.message.content);
                self.lines_decoded += 1;
            }
            Err(e) => {
                let text = String::from_utf8_lossy(line);
                outcome.errors.push(LineError {
                    preview: truncate_str(&text, 120).to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(content: &str) -> String {
        format!(
            "{}\n",
            serde_json::json!({"message": {"role": "assistant", "content": content}})
        )
    }

    fn decode_in_chunks(bytes: &[u8], chunk_size: usize) -> String {
        let mut decoder = StreamDecoder::new();
        for chunk in bytes.chunks(chunk_size) {
            decoder.feed(chunk);
        }
        decoder.finish();
        decoder.into_text()
    }

    #[test]
    fn test_two_lines_accumulate() {
        let mut decoder = StreamDecoder::new();
        let first = decoder.feed(br#"{"message":{"content":"Hi"}}
"#);
        assert_eq!(first.appended, "Hi");
        let second = decoder.feed(br#"{"message":{"content":" there"}}
"#);
        assert_eq!(second.appended, " there");
        assert_eq!(decoder.accumulated_text(), "Hi there");
        assert_eq!(decoder.lines_decoded(), 2);
    }

    #[test]
    fn test_chunking_invariance() {
        let contents = ["Hello", ", ", "wörld ", "🎨", " [GENERATE_IMAGE]{prompt:\"x\"}", ""];
        let stream: String = contents.iter().map(|c| line(c)).collect();
        let expected: String = contents.concat();

        for chunk_size in [1, 2, 3, 5, 7, 16, 64, stream.len()] {
            assert_eq!(
                decode_in_chunks(stream.as_bytes(), chunk_size),
                expected,
                "chunk size {chunk_size}"
            );
        }
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut decoder = StreamDecoder::new();
        let outcome = decoder.feed(br#"{"message":{"con"#);
        assert!(!outcome.has_text());
        assert!(outcome.errors.is_empty());
        assert!(decoder.pending_len() > 0);

        let outcome = decoder.feed(b"tent\":\"ok\"}}\n");
        assert_eq!(outcome.appended, "ok");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_malformed_line_is_skipped_not_fatal() {
        let mut decoder = StreamDecoder::new();
        let mut bytes = line("a").into_bytes();
        bytes.extend_from_slice(b"not json\n");
        bytes.extend_from_slice(line("b").as_bytes());

        let outcome = decoder.feed(&bytes);
        assert_eq!(outcome.appended, "ab");
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].preview.starts_with("not json"));
        assert_eq!(decoder.accumulated_text(), "ab");
    }

    #[test]
    fn test_line_without_message_content_is_an_error() {
        let mut decoder = StreamDecoder::new();
        let outcome = decoder.feed(b"{\"error\":\"model not found\"}\n");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(decoder.accumulated_text(), "");
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let mut decoder = StreamDecoder::new();
        let outcome = decoder.feed(b"\n\r\n{\"message\":{\"content\":\"x\"}}\r\n");
        assert_eq!(outcome.appended, "x");
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_finish_decodes_unterminated_final_line() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(br#"{"message":{"content":"tail"}}"#);
        assert_eq!(decoder.accumulated_text(), "");
        let outcome = decoder.finish();
        assert_eq!(outcome.appended, "tail");
        assert_eq!(decoder.accumulated_text(), "tail");
    }

    #[test]
    fn test_finish_with_nothing_pending() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(line("done").as_bytes());
        let outcome = decoder.finish();
        assert_eq!(outcome, FeedOutcome::default());
    }
}
