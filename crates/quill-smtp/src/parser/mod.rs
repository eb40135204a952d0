//! SMTP response parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses one SMTP reply from its response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK`
/// - Multi: `250-First line`, `250-Second line`, `250 Last line`
///
/// The code is taken from the first line.
///
/// # Errors
///
/// Returns an error if the reply is malformed.
pub fn parse_reply(lines: &[&str]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };

    let code = parse_code(first)?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        parse_code(line)?;
        // Skip code and separator (e.g., "250-" or "250 ")
        message.push(line.get(4..).unwrap_or_default().to_string());
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

/// Splits a block of response lines into consecutive replies.
///
/// A reply ends at a line whose separator is a space (or a bare code). A
/// trailing run of continuation lines is kept as one more reply, since the
/// quiet period that closed the block is the only end marker available.
///
/// # Errors
///
/// Returns an error if any line is malformed.
pub fn parse_replies(lines: &[&str]) -> Result<Vec<Reply>> {
    let mut replies = Vec::new();
    let mut start = 0;

    for (i, line) in lines.iter().enumerate() {
        if is_last_reply_line(line) {
            replies.push(parse_reply(&lines[start..=i])?);
            start = i + 1;
        }
    }

    if start < lines.len() {
        replies.push(parse_reply(&lines[start..])?);
    }

    Ok(replies)
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last line.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    match line.as_bytes() {
        [_, _, _] => true,
        [_, _, _, sep, ..] => *sep == b' ',
        _ => false,
    }
}

fn parse_code(line: &str) -> Result<u16> {
    let code_str = line
        .get(0..3)
        .ok_or_else(|| Error::Protocol(format!("Reply too short: {line}")))?;

    if !code_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!("Invalid reply code: {code_str}")));
    }

    if let Some(&sep) = line.as_bytes().get(3)
        && sep != b' '
        && sep != b'-'
    {
        return Err(Error::Protocol(format!("Malformed reply line: {line}")));
    }

    code_str
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {code_str}")))
}
