/// Best-effort cleanup of untrusted bytes for logs and display: invalid
/// UTF-8 sequences are dropped and NUL bytes stripped.
///
/// Never apply this to request fields that get validated or stored; those
/// are rejected outright when the encoding is bad.
pub fn sanitize_for_display(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        out.extend(chunk.valid().chars().filter(|c| *c != '\0'));
    }
    out
}

/// Truncate at a char boundary at or below `max` bytes.
pub fn truncate_for_log(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_text_unchanged() {
        assert_eq!(sanitize_for_display("héllo wörld".as_bytes()), "héllo wörld");
    }

    #[test]
    fn strips_nul_bytes() {
        assert_eq!(sanitize_for_display(b"a\0b\0"), "ab");
    }

    #[test]
    fn drops_invalid_sequences() {
        assert_eq!(sanitize_for_display(b"ok\xff\xfeok"), "okok");
        assert_eq!(sanitize_for_display(b"\xc3"), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "aé";
        assert_eq!(truncate_for_log(s, 2), "a");
        assert_eq!(truncate_for_log(s, 3), "aé");
        assert_eq!(truncate_for_log("abc", 10), "abc");
    }
}
