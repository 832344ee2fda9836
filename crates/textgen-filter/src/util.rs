/// Reassembles streamed token bytes into valid UTF-8 pieces.
///
/// Individual tokens are not UTF-8 boundaries; a multi-byte character can be
/// split across tokens. The buffer holds incomplete trailing sequences back
/// until the bytes that finish them arrive, and replaces definitely invalid
/// sequences with U+FFFD.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PieceBuffer(Vec<u8>);

impl PieceBuffer {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self(vec![])
    }

    /// Append token bytes, returning any text that is now complete.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.0.extend_from_slice(bytes);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.0) {
                Ok(s) => {
                    out.push_str(s);
                    self.0.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.0[..valid]).unwrap());
                    match e.error_len() {
                        // Incomplete sequence at the end: keep it for the next push.
                        None => {
                            self.0.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.0.drain(..valid + len);
                        }
                    }
                }
            }
        }

        (!out.is_empty()).then_some(out)
    }

    /// Discard any buffered partial sequence.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_tokens_pass_through() {
        let mut buffer = PieceBuffer::new();
        assert_eq!(buffer.push(b"hello").as_deref(), Some("hello"));
        assert_eq!(buffer.push(&[0xE2, 0x82, 0xAC]).as_deref(), Some("\u{20AC}"));
    }

    #[test]
    fn split_character_is_held_back() {
        let mut buffer = PieceBuffer::new();
        assert_eq!(buffer.push(&[0xE2, 0x82]), None);
        assert_eq!(buffer.push(&[0xAC]).as_deref(), Some("\u{20AC}"));
    }

    #[test]
    fn complete_head_flushes_while_tail_waits() {
        let mut buffer = PieceBuffer::new();
        assert_eq!(buffer.push(&[b'h', b'i', 0xE2]).as_deref(), Some("hi"));
        assert_eq!(buffer.push(&[0x82, 0xAC]).as_deref(), Some("\u{20AC}"));
    }

    #[test]
    fn invalid_sequence_is_replaced() {
        let mut buffer = PieceBuffer::new();
        assert_eq!(buffer.push(&[0xFF, b'a']).as_deref(), Some("\u{FFFD}a"));
    }

    #[test]
    fn empty_tokens_produce_nothing() {
        let mut buffer = PieceBuffer::new();
        assert_eq!(buffer.push(b""), None);
    }
}
