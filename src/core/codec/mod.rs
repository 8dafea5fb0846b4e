//! Data codec module for the terminal link
//!
//! Supports:
//! - Single-byte terminal charsets (Latin-1, 7-bit ASCII)
//! - Hex dumps for receive tracing

mod text;

pub use text::{TextEncoding, REPLACEMENT};

/// Format bytes as a hexdump (like xxd)
pub fn hexdump(data: &[u8], bytes_per_line: usize) -> String {
    let bytes_per_line = bytes_per_line.max(2);
    let mut output = String::new();

    for (offset, chunk) in data.chunks(bytes_per_line).enumerate() {
        output.push_str(&format!("{:08x}  ", offset * bytes_per_line));

        for (i, byte) in chunk.iter().enumerate() {
            output.push_str(&format!("{byte:02x} "));
            if i == bytes_per_line / 2 - 1 {
                output.push(' ');
            }
        }

        // Padding for incomplete lines
        for i in chunk.len()..bytes_per_line {
            output.push_str("   ");
            if i == bytes_per_line / 2 - 1 {
                output.push(' ');
            }
        }

        output.push_str(" |");
        for byte in chunk {
            if byte.is_ascii_graphic() || *byte == b' ' {
                output.push(char::from(*byte));
            } else {
                output.push('.');
            }
        }
        for _ in chunk.len()..bytes_per_line {
            output.push(' ');
        }
        output.push_str("|\n");
    }

    output
}

/// Short description of a received byte for trace output
pub fn describe_byte(byte: u8) -> String {
    match byte {
        0x20..=0x7E => format!("0x{byte:02x} '{}'", char::from(byte)),
        _ => format!("0x{byte:02x}"),
    }
}
