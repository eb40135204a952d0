//! MIME encoding utilities.
//!
//! Supports Base64 and RFC 2047 header encoding. Decoding is never needed
//! on the sending side and is not provided.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Charset announced in every encoded word and text part.
pub const CHARSET: &str = "utf-8";

/// Encodes data as Base64.
///
/// Uses the standard `A-Z a-z 0-9 + /` alphabet. The output length is
/// always `4 * ceil(len / 3)`, with `=` filling the unused characters of
/// the final group. Empty input yields an empty string.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes a header value as an RFC 2047 encoded word.
///
/// Format: `=?utf-8?B?encoded-text?=`
///
/// Unlike a general-purpose header encoder this always encodes, even for
/// plain ASCII input, so subjects and display names are emitted uniformly.
#[must_use]
pub fn encoded_word(text: &str) -> String {
    format!("=?{CHARSET}?B?{}?=", encode_base64(text.as_bytes()))
}

/// Splits an encoded payload into lines of at most `width` characters.
///
/// Every character of `encoded` appears in exactly one line, in order;
/// the final line carries the remainder when the count is not a multiple
/// of `width`. Lines always end on a character boundary.
pub(crate) fn split_lines(encoded: &str, width: usize) -> impl Iterator<Item = &str> {
    let width = width.max(1);
    let mut rest = encoded;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(width)
            .map_or(rest.len(), |(index, _)| index);
        let (line, tail) = rest.split_at(end);
        rest = tail;
        Some(line)
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_known_vectors() {
        assert_eq!(encode_base64(b""), "");
        assert_eq!(encode_base64(b"a"), "YQ==");
        assert_eq!(encode_base64(b"ab"), "YWI=");
        assert_eq!(encode_base64(b"abc"), "YWJj");
        assert_eq!(encode_base64(b"hello"), "aGVsbG8=");
        assert_eq!(encode_base64(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_base64_binary_input() {
        assert_eq!(encode_base64(&[0x00, 0x00, 0x00]), "AAAA");
        assert_eq!(encode_base64(&[0xff, 0xff, 0xff]), "////");
        assert_eq!(encode_base64(&[0xfb, 0xef]), "++8=");
    }

    #[test]
    fn test_encoded_word() {
        assert_eq!(encoded_word("hi"), "=?utf-8?B?aGk=?=");
        assert_eq!(encoded_word(""), "=?utf-8?B??=");

        let encoded = encoded_word("Héllo");
        assert_eq!(encoded, "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_split_lines_exact_multiple() {
        let lines: Vec<&str> = split_lines("abcdef", 3).collect();
        assert_eq!(lines, vec!["abc", "def"]);
    }

    #[test]
    fn test_split_lines_keeps_remainder() {
        let lines: Vec<&str> = split_lines("abcdefg", 3).collect();
        assert_eq!(lines, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_split_lines_counts_characters_not_bytes() {
        let lines: Vec<&str> = split_lines("héllo wörld", 4).collect();
        assert_eq!(lines, vec!["héll", "o wö", "rld"]);
    }

    #[test]
    fn test_split_lines_short_and_empty() {
        assert_eq!(split_lines("ab", 1000).collect::<Vec<_>>(), vec!["ab"]);
        assert_eq!(split_lines("", 1000).count(), 0);
    }

    proptest! {
        #[test]
        fn base64_round_trips(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let encoded = encode_base64(&data);
            prop_assert_eq!(STANDARD.decode(&encoded).unwrap(), data);
        }

        #[test]
        fn base64_length_is_four_per_started_triple(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(encode_base64(&data).len(), 4 * data.len().div_ceil(3));
        }

        #[test]
        fn split_lines_covers_payload(payload in "[A-Za-z0-9+/]{0,5000}", width in 1usize..1200) {
            let lines: Vec<&str> = split_lines(&payload, width).collect();
            prop_assert_eq!(lines.len(), payload.len().div_ceil(width));
            prop_assert!(lines.iter().all(|line| line.len() <= width));
            prop_assert_eq!(lines.concat(), payload);
        }
    }
}
