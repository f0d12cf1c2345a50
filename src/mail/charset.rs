//! Charset decoding for message payloads and encoded-word headers.

use encoding_rs::{DecoderResult, Encoding};

/// Charset assumed when a part does not declare one.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Resolve a charset label to an encoding.
///
/// Labels follow the WHATWG encoding standard, so `latin1`, `iso-8859-1`
/// and `us-ascii` all resolve. Unknown labels are an error.
///
/// WHATWG maps the ISO-8859-1 and ASCII labels to windows-1252: bytes
/// 0x80..=0x9F come out as the cp1252 characters (0x80 is `€`) rather
/// than C1 control codes.
pub fn lookup(label: &str) -> Result<&'static Encoding, String> {
    Encoding::for_label_no_replacement(label.trim().as_bytes())
        .ok_or_else(|| format!("unknown encoding: {}", label.trim()))
}

/// Decode `bytes` with the named charset, dropping malformed sequences.
pub fn decode_lossy(label: &str, bytes: &[u8]) -> Result<String, String> {
    Ok(decode_ignoring_errors(lookup(label)?, bytes))
}

/// Decode with `encoding`, skipping any byte sequence that is malformed
/// rather than substituting U+FFFD.
///
/// A leading byte order mark is decoded like any other character, never
/// sniffed or stripped.
pub fn decode_ignoring_errors(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut out = String::with_capacity(
        decoder
            .max_utf8_buffer_length_without_replacement(bytes.len())
            .unwrap_or(bytes.len()),
    );
    let mut input = bytes;

    loop {
        let (result, read) = decoder.decode_to_string_without_replacement(input, &mut out, true);
        input = &input[read..];
        match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::Malformed(_, _) => continue,
            DecoderResult::OutputFull => {
                let extra = decoder
                    .max_utf8_buffer_length_without_replacement(input.len())
                    .unwrap_or(input.len() * 3)
                    .max(16);
                out.reserve(extra);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_roundtrips() {
        assert_eq!(decode_lossy("utf-8", "héllo".as_bytes()).unwrap(), "héllo");
    }

    #[test]
    fn latin1_decodes() {
        assert_eq!(
            decode_lossy("iso-8859-1", b"Caf\xe9 cr\xe8me").unwrap(),
            "Café crème"
        );
    }

    #[test]
    fn labels_are_case_insensitive() {
        assert_eq!(decode_lossy("UTF-8", b"ok").unwrap(), "ok");
        assert_eq!(decode_lossy(" Windows-1252 ", b"\x80").unwrap(), "€");
    }

    #[test]
    fn malformed_bytes_are_dropped() {
        assert_eq!(decode_lossy("utf-8", b"ab\xffcd\xc3").unwrap(), "abcd");
    }

    #[test]
    fn unknown_charset_is_error() {
        assert_eq!(
            decode_lossy("x-bogus", b"abc").unwrap_err(),
            "unknown encoding: x-bogus"
        );
    }

    #[test]
    fn latin1_label_uses_cp1252_high_range() {
        assert_eq!(decode_lossy("iso-8859-1", b"a\x80b").unwrap(), "a\u{20ac}b");
    }

    #[test]
    fn utf8_bom_is_kept() {
        assert_eq!(
            decode_lossy("utf-8", b"\xef\xbb\xbfhi").unwrap(),
            "\u{feff}hi"
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(decode_lossy("utf-8", b"").unwrap(), "");
    }
}
