use std::ascii;

/// Printable form of raw serial bytes, escaping control and non-ASCII bytes.
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|byte| ascii::escape_default(*byte))
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_line_endings_and_realtime_bytes() {
        assert_eq!(format_bytes(b"G1 X10\n"), "G1 X10\\n");
        assert_eq!(format_bytes(&[0x85]), "\\x85");
        assert_eq!(format_bytes(b""), "");
    }
}
