//! Latin-1 is the text encoding the CFA635 firmware understands on the
//! wire (version strings, error payloads, cell contents). Every Unicode
//! scalar value `<= 0xFF` maps to the identically-numbered byte.

/// Encodes `s` as Latin-1, or returns `None` if it contains a character
/// outside the Latin-1 range.
pub fn encode(s: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        let code_point = c as u32;
        if code_point > 0xFF {
            return None;
        }
        out.push(code_point as u8);
    }
    Some(out)
}

/// Decodes Latin-1 bytes into a `String`. Never fails: every byte value is
/// a valid Latin-1 code point.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_and_high_bytes() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let text = decode(&bytes);
        assert_eq!(encode(&text).unwrap(), bytes);
    }

    #[test]
    fn rejects_non_latin1_scalars() {
        assert_eq!(encode("héllo"), Some(vec![b'h', 0xE9, b'l', b'l', b'o']));
        assert_eq!(encode("日本語"), None);
    }
}
