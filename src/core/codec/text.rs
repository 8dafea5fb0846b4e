//! Single-byte terminal charsets

use serde::{Deserialize, Serialize};

/// Marker written in place of characters the terminal cannot show
pub const REPLACEMENT: u8 = b'?';

/// Character encoding understood by the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// Latin-1 (ISO-8859-1)
    #[default]
    Latin1,
    /// ASCII (7-bit)
    Ascii,
}

impl TextEncoding {
    /// Highest code point representable in one byte
    fn max_code_point(self) -> u32 {
        match self {
            Self::Latin1 => 0xFF,
            Self::Ascii => 0x7F,
        }
    }

    /// Encode text, substituting [`REPLACEMENT`] for anything out of range
    pub fn encode(self, text: &str) -> Vec<u8> {
        let max = self.max_code_point();
        text.chars()
            .map(|c| {
                let cp = u32::from(c);
                if cp <= max {
                    cp as u8
                } else {
                    REPLACEMENT
                }
            })
            .collect()
    }

    /// Decode one received byte, `None` if the charset has no mapping for it
    pub fn decode_byte(self, byte: u8) -> Option<char> {
        if u32::from(byte) <= self.max_code_point() {
            Some(char::from(byte))
        } else {
            None
        }
    }

    /// Decode a byte buffer, replacing unmapped bytes with the marker
    pub fn decode(self, data: &[u8]) -> String {
        data.iter()
            .map(|&b| self.decode_byte(b).unwrap_or(char::from(REPLACEMENT)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_latin1() {
        assert_eq!(TextEncoding::Latin1.encode("café"), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_encode_replaces_unrepresentable() {
        assert_eq!(TextEncoding::Latin1.encode("a€b"), b"a?b".to_vec());
        assert_eq!(TextEncoding::Ascii.encode("é!"), b"?!".to_vec());
    }

    #[test]
    fn test_decode_byte() {
        assert_eq!(TextEncoding::Latin1.decode_byte(0xE9), Some('é'));
        assert_eq!(TextEncoding::Ascii.decode_byte(0xE9), None);
        assert_eq!(TextEncoding::Ascii.decode_byte(b'A'), Some('A'));
    }

    #[test]
    fn test_decode_replaces_unmapped() {
        assert_eq!(TextEncoding::Ascii.decode(b"caf\xe9"), "caf?");
        assert_eq!(TextEncoding::Latin1.decode(b"caf\xe9"), "café");
    }
}
