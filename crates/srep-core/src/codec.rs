//! JSON framing for the shell socket and UTF-8 reassembly for terminal input.
//!
//! Each WebSocket message carries exactly one JSON-encoded
//! [`TerminalMessage`]. Input arrives from the local terminal as raw byte
//! chunks, which may split a multi-byte character; [`Utf8Decoder`] holds
//! the incomplete tail back until the next chunk completes it.

use crate::error::{SrepError, SrepResult};
use crate::messages::TerminalMessage;

/// Encode a message into the JSON text of one frame.
pub fn encode(msg: &TerminalMessage) -> SrepResult<String> {
    serde_json::to_string(msg).map_err(|e| SrepError::Encode(e.to_string()))
}

/// Decode one frame payload.
pub fn decode(data: &[u8]) -> SrepResult<TerminalMessage> {
    Ok(serde_json::from_slice(data)?)
}

/// Longest UTF-8 encoding of a single scalar value.
const MAX_UTF8_LEN: usize = 4;

/// Streaming UTF-8 decoder: accumulates bytes and yields complete text.
///
/// Invalid sequences become U+FFFD; an incomplete sequence at the end of a
/// chunk is kept until more bytes arrive.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return all text that is complete so far.
    pub fn feed(&mut self, data: &[u8]) -> String {
        self.pending.extend_from_slice(data);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // `valid_up_to` marks a verified prefix.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let keep = rest.len();
        debug_assert!(keep < MAX_UTF8_LEN);
        let consumed = self.pending.len() - keep;
        self.pending.drain(..consumed);
        out
    }

    /// Flush whatever is left as replacement characters (end of input).
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageType;

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(matches!(decode(b"{\"type\":"), Err(SrepError::Decode(_))));
        assert!(matches!(decode(br#"{"content":"x"}"#), Err(SrepError::Decode(_))));
    }

    #[test]
    fn encode_matches_wire_format() {
        let text = encode(&TerminalMessage::pong()).unwrap();
        assert_eq!(text, r#"{"type":"pong","content":""}"#);
        assert_eq!(decode(text.as_bytes()).unwrap().kind, MessageType::Pong);
    }

    #[test]
    fn split_multibyte_char_is_reassembled() {
        let bytes = "héllo ✓".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&decoder.feed(std::slice::from_ref(b)));
        }
        assert_eq!(out, "héllo ✓");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn incomplete_tail_is_held_back() {
        let check = "✓".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(&[b'a', check[0], check[1]]), "a");
        assert_eq!(decoder.feed(&check[2..]), "✓");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(&[b'a', 0xff, b'b']), "a\u{fffd}b");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn finish_flushes_truncated_sequence() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(&[0xe2, 0x9c]), "");
        assert_eq!(decoder.finish(), "\u{fffd}");
        assert_eq!(decoder.finish(), "");
    }
}
