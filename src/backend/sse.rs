//! SSE (Server-Sent Events) stream decoder for OpenAI-compatible APIs.
//!
//! Handles the `data: ` prefix, `[DONE]` termination, line buffering across
//! TCP chunk boundaries (including multi-byte characters split between
//! chunks), and empty keep-alive lines.

use serde_json::Value;

/// SSE stream decoder for OpenAI-compatible APIs.
///
/// # Example
///
/// ```
/// use llm_flows::backend::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let values = decoder.decode(data);
/// assert_eq!(values.len(), 1);
/// assert!(decoder.is_done());
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
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

    /// Feed raw bytes into the decoder and return any complete JSON payloads.
    ///
    /// Bytes are buffered until a newline, so a character split across two
    /// chunks is decoded intact. Payloads after `[DONE]` are dropped.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk);

        let mut values = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(value) = self.parse_line(&line) {
                values.push(value);
            }
        }
        values
    }

    /// Decode whatever is left in the buffer once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<Value> {
        let remaining = std::mem::take(&mut self.buffer);
        remaining
            .split(|b| *b == b'\n')
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    fn parse_line(&mut self, line: &[u8]) -> Option<Value> {
        if self.done {
            return None;
        }
        let line = String::from_utf8_lossy(line);
        let line = line.trim();

        // Comments, `event:` and `id:` lines carry nothing we use.
        let data = line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))?
            .trim();

        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        match serde_json::from_str::<Value>(data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable SSE data line");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_basic_decode() {
        let mut decoder = SseDecoder::new();
        let chunk = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n";
        let values = decoder.decode(chunk);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["choices"][0]["delta"]["content"], "Hello");
    }

    #[test]
    fn test_sse_done_stops_decoding() {
        let mut decoder = SseDecoder::new();
        let chunk = b"data: {\"a\":1}\n\ndata: [DONE]\n\ndata: {\"a\":2}\n\n";
        let values = decoder.decode(chunk);
        assert_eq!(values.len(), 1);
        assert!(decoder.is_done());
    }

    #[test]
    fn test_sse_comment_and_event_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let chunk = b": keep-alive\nevent: message\n\n\ndata: {\"x\":1}\n\n";
        let values = decoder.decode(chunk);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["x"], 1);
    }

    #[test]
    fn test_sse_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.decode(b"data: {\"cho").is_empty());
        let values = decoder.decode(b"ices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_sse_multibyte_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let line = "data: {\"t\":\"18°C\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC2).unwrap() + 1;

        assert!(decoder.decode(&line[..split]).is_empty());
        let values = decoder.decode(&line[split..]);
        assert_eq!(values[0]["t"], "18°C");
    }

    #[test]
    fn test_sse_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.decode(b"data: {\"a\":3}").is_empty());
        let values = decoder.finish();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["a"], 3);
    }
}
