//! Permissive UTF-8 decoding of received chunks.
//!
//! Byte sequences that are not valid UTF-8 are dropped instead of failing the
//! stream. The drop policy lives here alone so it can be tested and replaced
//! without touching the receive loop or the output sink.
//!
//! A multi-byte character split across two chunks is treated as invalid on
//! both sides and dropped. Each chunk is decoded on its own.

use std::borrow::Cow;

/// Decoded text of one chunk plus the number of bytes that were dropped
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded<'a> {
    /// The decodable portion of the chunk, in order
    pub text: Cow<'a, str>,
    /// Number of raw bytes omitted because they were not valid UTF-8
    pub dropped: usize,
}

impl Decoded<'_> {
    /// Number of newline characters in the decoded text
    pub fn newlines(&self) -> usize {
        self.text.bytes().filter(|&b| b == b'\n').count()
    }
}

/// Decode `bytes` as UTF-8, silently dropping invalid sequences.
///
/// Valid input is returned borrowed, without copying.
///
/// ```
/// use agc_stream::decode::decode_permissive;
///
/// let decoded = decode_permissive(b"1,2\xff\n");
/// assert_eq!(decoded.text, "1,2\n");
/// assert_eq!(decoded.dropped, 1);
/// ```
pub fn decode_permissive(bytes: &[u8]) -> Decoded<'_> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Decoded {
            text: Cow::Borrowed(text),
            dropped: 0,
        };
    }

    let mut text = String::with_capacity(bytes.len());
    let mut dropped = 0;
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
        dropped += chunk.invalid().len();
    }

    Decoded {
        text: Cow::Owned(text),
        dropped,
    }
}
