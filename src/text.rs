//! Single-byte text codec.
//!
//! Every text field and string table entry in a database is ISO-8859-1.
//! Each byte maps to the Unicode code point of the same value, so decoding
//! never fails. Encoding fails for characters above U+00FF and for NUL,
//! which ends a stored text field.

use crate::error::{Result, TcdError};

/// Byte width of the short ("one-liner") text buffers.
pub const ONELINER_LENGTH: usize = 90;

/// Byte width of the long ("monologue") text buffers.
pub const MONOLOGUE_LENGTH: usize = 10_000;

/// Decode single-byte text.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text as single bytes.
pub fn encode(s: &str) -> Result<Vec<u8>> {
    s.chars()
        .map(|c| match u8::try_from(u32::from(c)) {
            Ok(0) => Err(TcdError::EmbeddedNul(s.to_string())),
            Ok(b) => Ok(b),
            Err(_) => Err(TcdError::UnencodableText(s.to_string())),
        })
        .collect()
}

/// Content of a NUL-padded buffer: everything before the first NUL.
pub fn until_nul(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&b| b == 0) {
        Some(end) => &buf[..end],
        None => buf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_roundtrip() {
        let bytes = encode("Göober").unwrap();
        assert_eq!(bytes, b"G\xf6ober");
        assert_eq!(decode(&bytes), "Göober");
    }

    #[test]
    fn test_encode_rejects_wide_chars() {
        assert!(matches!(encode("潮"), Err(TcdError::UnencodableText(_))));
    }

    #[test]
    fn test_encode_rejects_nul() {
        assert!(matches!(encode("A\0B"), Err(TcdError::EmbeddedNul(_))));
        assert!(matches!(encode("\0"), Err(TcdError::EmbeddedNul(_))));
    }

    #[test]
    fn test_until_nul() {
        assert_eq!(until_nul(b"abc\0\0def"), b"abc");
        assert_eq!(until_nul(b"abc"), b"abc");
        assert_eq!(until_nul(b"\0"), b"");
    }
}
