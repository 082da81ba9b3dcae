//! Line-ending normalization applied before classification.

/// Remove every carriage-return byte, keeping all other bytes in order.
///
/// Both `\r\n` and a lone `\r` lose the `\r`; nothing is inserted in its place.
#[must_use]
pub fn normalize(raw: &[u8]) -> Vec<u8> {
    raw.iter().copied().filter(|&b| b != b'\r').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_crlf_and_lone_cr() {
        assert_eq!(normalize(b"a\r\nb\rc\n"), b"a\nbc\n");
    }

    #[test]
    fn test_preserves_other_bytes() {
        let raw = [0x00, 0xff, b'\n', 0x0c, 0x7f];
        assert_eq!(normalize(&raw), raw);
    }

    #[test]
    fn test_empty_and_all_cr() {
        assert!(normalize(b"").is_empty());
        assert!(normalize(b"\r\r\r").is_empty());
    }
}
