//! Line-oriented `multipart/mixed` message generation.
//!
//! The builder never touches the network: each method returns the exact
//! lines (without CRLF) that the session writes during the `DATA` phase.

use crate::boundary::Boundary;
use crate::encoding::{CHARSET, encode_base64, encoded_word, split_lines};
use chrono::NaiveDateTime;

/// Length of each Base64 line in an attachment part.
pub const ATTACHMENT_LINE_LENGTH: usize = 1000;

/// Format of the `DATE:` header value, e.g. `02 Jan 24 03:04:05`.
const DATE_FORMAT: &str = "%d %b %y %H:%M:%S";

/// Top-level header fields of an outgoing message.
#[derive(Debug, Clone)]
pub struct MessageHeader<'a> {
    /// Local time the message is composed at.
    pub date: NaiveDateTime,
    /// Bare sender address.
    pub from: &'a str,
    /// Sender display name, already encoded as an RFC 2047 word.
    pub from_atom: Option<&'a str>,
    /// Bare recipient addresses, one `TO:` line each.
    pub to: Vec<&'a str>,
    /// Subject text, emitted as an encoded word.
    pub subject: &'a str,
}

/// A file attached to the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// Raw file contents.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates a new attachment.
    #[must_use]
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// File name with characters that would break a quoted header
    /// parameter replaced by `_`.
    fn header_filename(&self) -> String {
        self.filename.replace(['"', '\r', '\n'], "_")
    }
}

/// Produces the lines of a `multipart/mixed` message for one boundary.
#[derive(Debug, Clone, Copy)]
pub struct MessageBuilder<'a> {
    boundary: &'a Boundary,
}

impl<'a> MessageBuilder<'a> {
    /// Creates a builder that separates parts with `boundary`.
    #[must_use]
    pub const fn new(boundary: &'a Boundary) -> Self {
        Self { boundary }
    }

    /// Returns the message header lines.
    ///
    /// DATE, FROM, one TO per recipient, SUBJECT, MIME-Version and
    /// Content-Type, followed by a blank line that ends the header section
    /// before the first part delimiter.
    #[must_use]
    pub fn header_lines(&self, header: &MessageHeader<'_>) -> Vec<String> {
        let mut lines = Vec::with_capacity(header.to.len() + 7);

        lines.push(format!("DATE: {}", header.date.format(DATE_FORMAT)));
        lines.push(match header.from_atom {
            Some(atom) => format!("FROM: {atom} <{}>", header.from),
            None => format!("FROM: <{}>", header.from),
        });
        for to in &header.to {
            lines.push(format!("TO: <{to}>"));
        }
        lines.push(format!("SUBJECT: {}", encoded_word(header.subject)));
        lines.push("MIME-Version: 1.0".to_string());
        lines.push(format!(
            "Content-Type: multipart/mixed; boundary={}; charset={CHARSET}",
            self.boundary
        ));
        lines.push(String::new());

        lines
    }

    /// Returns a `text/plain` part carrying `text` as a single Base64 line.
    #[must_use]
    pub fn text_part_lines(&self, text: &str) -> Vec<String> {
        vec![
            self.boundary.delimiter(),
            format!("Content-Type: text/plain; charset={CHARSET}"),
            "Content-Transfer-Encoding: base64".to_string(),
            String::new(),
            encode_base64(text.as_bytes()),
        ]
    }

    /// Returns an `application/octet-stream` attachment part.
    ///
    /// The Base64 payload is split into lines of
    /// [`ATTACHMENT_LINE_LENGTH`] characters; the last line holds whatever
    /// remains, so the whole payload is always emitted.
    #[must_use]
    pub fn file_part_lines(&self, attachment: &Attachment) -> Vec<String> {
        let filename = attachment.header_filename();
        let encoded = encode_base64(&attachment.data);

        let mut lines = vec![
            self.boundary.delimiter(),
            format!("Content-Type: application/octet-stream; name=\"{filename}\";"),
            "Content-Transfer-Encoding: base64".to_string(),
            format!("Content-Disposition: attachment; filename=\"{filename}\";"),
            String::new(),
        ];
        lines.extend(split_lines(&encoded, ATTACHMENT_LINE_LENGTH).map(str::to_string));

        lines
    }

    /// Returns the delimiter that closes the last part.
    #[must_use]
    pub fn closing_line(&self) -> String {
        self.boundary.closing_delimiter()
    }
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
    use chrono::NaiveDate;
    use proptest::prelude::*;

    const PART_HEADER_LINES: usize = 5;

    fn boundary() -> Boundary {
        Boundary::from_token("b0undaryTOKEN").unwrap()
    }

    fn date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    #[test]
    fn test_header_lines() {
        let boundary = boundary();
        let builder = MessageBuilder::new(&boundary);
        let header = MessageHeader {
            date: date(),
            from: "alice@example.com",
            from_atom: None,
            to: vec!["bob@example.com", "carol@example.com"],
            subject: "hi",
        };

        assert_eq!(
            builder.header_lines(&header),
            vec![
                "DATE: 02 Jan 24 03:04:05",
                "FROM: <alice@example.com>",
                "TO: <bob@example.com>",
                "TO: <carol@example.com>",
                "SUBJECT: =?utf-8?B?aGk=?=",
                "MIME-Version: 1.0",
                "Content-Type: multipart/mixed; boundary=b0undaryTOKEN; charset=utf-8",
                "",
            ]
        );
    }

    #[test]
    fn test_header_from_with_display_name() {
        let boundary = boundary();
        let builder = MessageBuilder::new(&boundary);
        let header = MessageHeader {
            date: date(),
            from: "alice@example.com",
            from_atom: Some("=?utf-8?B?QWxpY2U=?="),
            to: vec!["bob@example.com"],
            subject: "",
        };

        let lines = builder.header_lines(&header);
        assert_eq!(lines[1], "FROM: =?utf-8?B?QWxpY2U=?= <alice@example.com>");
        assert_eq!(lines[3], "SUBJECT: =?utf-8?B??=");
    }

    #[test]
    fn test_text_part_lines() {
        let boundary = boundary();
        let builder = MessageBuilder::new(&boundary);

        assert_eq!(
            builder.text_part_lines("hello"),
            vec![
                "--b0undaryTOKEN",
                "Content-Type: text/plain; charset=utf-8",
                "Content-Transfer-Encoding: base64",
                "",
                "aGVsbG8=",
            ]
        );
    }

    #[test]
    fn test_file_part_headers() {
        let boundary = boundary();
        let builder = MessageBuilder::new(&boundary);
        let attachment = Attachment::new("report.pdf", b"abc".to_vec());

        assert_eq!(
            builder.file_part_lines(&attachment),
            vec![
                "--b0undaryTOKEN",
                "Content-Type: application/octet-stream; name=\"report.pdf\";",
                "Content-Transfer-Encoding: base64",
                "Content-Disposition: attachment; filename=\"report.pdf\";",
                "",
                "YWJj",
            ]
        );
    }

    #[test]
    fn test_file_part_keeps_final_partial_chunk() {
        let boundary = boundary();
        let builder = MessageBuilder::new(&boundary);
        // 1200 bytes encode to 1600 characters: one full line and one of 600.
        let attachment = Attachment::new("blob.bin", vec![0x5a; 1200]);

        let lines = builder.file_part_lines(&attachment);
        let payload = &lines[PART_HEADER_LINES..];
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].len(), ATTACHMENT_LINE_LENGTH);
        assert_eq!(payload[1].len(), 600);
    }

    #[test]
    fn test_empty_file_has_no_payload_lines() {
        let boundary = boundary();
        let builder = MessageBuilder::new(&boundary);
        let lines = builder.file_part_lines(&Attachment::new("empty", Vec::new()));
        assert_eq!(lines.len(), PART_HEADER_LINES);
    }

    #[test]
    fn test_filename_quotes_are_replaced() {
        let boundary = boundary();
        let builder = MessageBuilder::new(&boundary);
        let lines = builder.file_part_lines(&Attachment::new("a\"b.txt", vec![1]));
        assert_eq!(
            lines[1],
            "Content-Type: application/octet-stream; name=\"a_b.txt\";"
        );
    }

    #[test]
    fn test_closing_line() {
        let boundary = boundary();
        assert_eq!(MessageBuilder::new(&boundary).closing_line(), "--b0undaryTOKEN--");
    }

    proptest! {
        #[test]
        fn attachment_chunks_cover_whole_payload(data in proptest::collection::vec(any::<u8>(), 0..6000)) {
            let boundary = boundary();
            let builder = MessageBuilder::new(&boundary);
            let encoded = encode_base64(&data);

            let lines = builder.file_part_lines(&Attachment::new("f", data));
            let chunks = &lines[PART_HEADER_LINES..];

            prop_assert_eq!(chunks.len(), encoded.len().div_ceil(ATTACHMENT_LINE_LENGTH));
            prop_assert_eq!(chunks.concat(), encoded);
        }
    }
}
