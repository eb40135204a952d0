//! SMTP reply types.

use crate::error::{Error, Result};
use crate::parser::parse_replies;

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code.is_intermediate()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Converts a reply into the error a caller sees when it was not the
    /// expected one.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::smtp_error(self.code.as_u16(), self.message_text())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes the session looks for
impl ReplyCode {
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
}

/// Everything the server sent in reply to one request.
///
/// Reply completion is detected by a quiet period on the connection, so a
/// block may hold several replies when the server answered pipelined
/// commands back to back, or none at all when it stayed silent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyBlock {
    text: String,
}

impl ReplyBlock {
    /// Creates a block from raw received bytes, dropping the final CRLF.
    #[must_use]
    pub fn from_bytes(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        Self {
            text: text.trim_end_matches(['\r', '\n']).to_string(),
        }
    }

    /// Returns the raw text with internal line breaks preserved.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns true if `token` occurs anywhere in the block.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.text.contains(token)
    }

    /// Parses every reply in the block, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns an error if a line does not start with a reply code.
    pub fn replies(&self) -> Result<Vec<Reply>> {
        let lines: Vec<&str> = self.text.lines().filter(|l| !l.is_empty()).collect();
        parse_replies(&lines)
    }

    /// Returns the reply to the most recent command: the last reply in the
    /// block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is empty or malformed.
    pub fn last_reply(&self) -> Result<Reply> {
        self.replies()?
            .pop()
            .ok_or_else(|| Error::Protocol("No reply received".into()))
    }
}
