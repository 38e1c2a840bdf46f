//! Code point decoding over a raw source buffer.

use crate::diagnostics::InternalError;

/// 1-based line and column of the stream cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Position {
    fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

/// Decodes UTF-8-shaped input one code point at a time.
///
/// Decoding is lenient: a byte that is not a valid 1/2/3/4-byte lead, a
/// truncated sequence, or a sequence that does not form a Unicode scalar
/// value all decode to `'\0'` instead of failing. Only cursor misuse
/// (rewinding past the start, reading past the end) is an error.
#[derive(Debug, Clone)]
pub struct SourceStream<'a> {
    bytes: &'a [u8],
    offset: usize,
    position: Position,
}

impl<'a> SourceStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            position: Position::default(),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_at_end(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    /// The code point at the cursor, or `'\0'` at the end of input.
    pub fn peek(&self) -> char {
        if self.is_at_end() {
            return '\0';
        }
        decode_at(self.bytes, self.offset).0
    }

    pub fn next(&mut self) -> char {
        self.next_with_len().0
    }

    /// Decodes the code point at the cursor and advances past it. Also returns
    /// how many raw bytes were consumed (0 at the end of input).
    pub fn next_with_len(&mut self) -> (char, usize) {
        if self.is_at_end() {
            return ('\0', 0);
        }
        let (c, len) = decode_at(self.bytes, self.offset);
        self.offset += len;
        self.position.advance(c);
        (c, len)
    }

    /// Rewinds `n` raw bytes.
    pub fn go_back(&mut self, n: usize) -> Result<(), InternalError> {
        if n > self.offset {
            return Err(InternalError::StreamUnderflow {
                requested: n,
                offset: self.offset,
            });
        }
        self.offset -= n;
        self.position = position_at(self.bytes, self.offset);
        Ok(())
    }

    /// Copies `dst.len()` raw bytes out of the stream and advances past them.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<(), InternalError> {
        let remaining = self.remaining();
        if dst.len() > remaining {
            return Err(InternalError::StreamOverRead {
                requested: dst.len(),
                remaining,
            });
        }
        let end = self.offset + dst.len();
        dst.copy_from_slice(&self.bytes[self.offset..end]);
        self.offset = end;
        self.position = position_at(self.bytes, self.offset);
        Ok(())
    }
}

/// Sequence length announced by a lead byte, if it is one.
fn sequence_len(lead: u8) -> Option<usize> {
    match lead {
        b if b & 0x80 == 0x00 => Some(1),
        b if b & 0xE0 == 0xC0 => Some(2),
        b if b & 0xF0 == 0xE0 => Some(3),
        b if b & 0xF8 == 0xF0 => Some(4),
        _ => None,
    }
}

fn decode_at(bytes: &[u8], offset: usize) -> (char, usize) {
    let lead = bytes[offset];
    let Some(len) = sequence_len(lead) else {
        return ('\0', 1);
    };
    if len == 1 {
        return (char::from(lead), 1);
    }
    let Some(tail) = bytes.get(offset + 1..offset + len) else {
        return ('\0', 1);
    };

    let lead_bits = match len {
        2 => lead & 0x1F,
        3 => lead & 0x0F,
        _ => lead & 0x07,
    };
    let mut code = u32::from(lead_bits);
    for &b in tail {
        if b & 0xC0 != 0x80 {
            return ('\0', len);
        }
        code = (code << 6) | u32::from(b & 0x3F);
    }
    (char::from_u32(code).unwrap_or('\0'), len)
}

fn position_at(bytes: &[u8], offset: usize) -> Position {
    let mut position = Position::default();
    let mut cursor = 0;
    while cursor < offset {
        let (c, len) = decode_at(bytes, cursor);
        position.advance(c);
        cursor += len;
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn peek_does_not_advance() {
        let stream = SourceStream::new(b"ab");
        assert_eq!(stream.peek(), 'a');
        assert_eq!(stream.peek(), 'a');
        assert_eq!(stream.offset(), 0);
    }

    #[test]
    fn reports_raw_length_per_code_point() {
        let mut stream = SourceStream::new("aé€😀".as_bytes());
        assert_eq!(stream.next_with_len(), ('a', 1));
        assert_eq!(stream.next_with_len(), ('é', 2));
        assert_eq!(stream.next_with_len(), ('€', 3));
        assert_eq!(stream.next_with_len(), ('😀', 4));
        assert_eq!(stream.next_with_len(), ('\0', 0));
        assert_eq!(stream.peek(), '\0');
    }

    #[test]
    fn invalid_lead_byte_decodes_to_nul() {
        let mut stream = SourceStream::new(&[0x80, b'x', 0xFF]);
        assert_eq!(stream.next_with_len(), ('\0', 1));
        assert_eq!(stream.next(), 'x');
        assert_eq!(stream.next_with_len(), ('\0', 1));
        assert!(stream.is_at_end());
    }

    #[test]
    fn truncated_sequence_decodes_to_nul() {
        let mut stream = SourceStream::new(&[0xE2, 0x82]);
        assert_eq!(stream.next_with_len(), ('\0', 1));
        assert_eq!(stream.offset(), 1);
    }

    #[test]
    fn bad_continuation_consumes_whole_pattern() {
        let mut stream = SourceStream::new(&[0xC3, b'a', b'b']);
        assert_eq!(stream.next_with_len(), ('\0', 2));
        assert_eq!(stream.next(), 'b');
    }

    #[test]
    fn go_back_rewinds_and_restores_position() {
        let mut stream = SourceStream::new(b"a\nbc");
        for _ in 0..3 {
            stream.next();
        }
        assert_eq!(stream.position(), Position { line: 2, column: 2 });
        stream.go_back(2).unwrap();
        assert_eq!(stream.peek(), '\n');
        assert_eq!(stream.position(), Position { line: 1, column: 2 });
    }

    #[test]
    fn go_back_past_start_fails() {
        let mut stream = SourceStream::new(b"ab");
        stream.next();
        assert_eq!(
            stream.go_back(2),
            Err(InternalError::StreamUnderflow {
                requested: 2,
                offset: 1
            })
        );
        assert_eq!(stream.offset(), 1);
    }

    #[test]
    fn read_copies_raw_bytes() {
        let mut stream = SourceStream::new(b"hello");
        let mut buf = [0u8; 3];
        stream.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hel");
        assert_eq!(stream.peek(), 'l');

        let mut too_big = [0u8; 4];
        assert_eq!(
            stream.read(&mut too_big),
            Err(InternalError::StreamOverRead {
                requested: 4,
                remaining: 2
            })
        );
    }
}
