//! RFC 2047 encoded-word decoding for header values.

use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;

use crate::mail::charset;

static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([bBqQ])\?([^?\s]*)\?=").expect("encoded-word pattern is valid")
});

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode every encoded word in a header value.
///
/// Whitespace that only separates two encoded words is dropped. Each
/// word's bytes are decoded with its declared charset, skipping bytes the
/// charset cannot decode. A word that cannot be decoded at all (bad
/// transfer encoding or unknown charset) is left as written.
pub fn decode_encoded_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for caps in ENCODED_WORD.captures_iter(value) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let between = &value[last_end..whole.start()];
        if !(previous_was_word && between.chars().all(char::is_whitespace)) {
            out.push_str(between);
        }

        match decode_word(&caps[1], &caps[2], &caps[3]) {
            Some(text) => out.push_str(&text),
            None => out.push_str(whole.as_str()),
        }

        last_end = whole.end();
        previous_was_word = true;
    }

    out.push_str(&value[last_end..]);
    out
}

fn decode_word(charset_label: &str, encoding: &str, text: &str) -> Option<String> {
    // RFC 2231 allows a language suffix: `utf-8*en`.
    let label = charset_label.split('*').next().unwrap_or(charset_label);
    let bytes = match encoding {
        "b" | "B" => LENIENT_BASE64.decode(text).ok()?,
        _ => decode_q(text)?,
    };
    charset::decode_lossy(label, &bytes).ok()
}

fn decode_q(text: &str) -> Option<Vec<u8>> {
    let raw = text.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = raw.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    Some(out)
}

/// Undo RFC 5322 header folding.
pub fn unfold(value: &str) -> String {
    value
        .replace("\r\n", "\n")
        .split('\n')
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string()
}
