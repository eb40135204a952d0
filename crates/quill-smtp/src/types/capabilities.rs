//! Server capabilities advertised in the EHLO reply.

use super::ReplyBlock;

/// The subset of ESMTP extensions the session makes use of.
///
/// Derived once from the EHLO reply and never changed afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)] // One flag per extension
pub struct Capabilities {
    /// PIPELINING: RCPT TO commands may be sent without waiting.
    pub pipelining: bool,
    /// 8BITMIME: `BODY=8BITMIME` is appended to MAIL FROM.
    pub eight_bit_mime: bool,
    /// DSN: delivery status notification parameters are accepted.
    pub dsn: bool,
}

impl Capabilities {
    /// Parameter appended to MAIL FROM when 8BITMIME is supported.
    pub const BODY_8BITMIME: &'static str = "BODY=8BITMIME";

    /// Detects capabilities by plain substring search over the raw reply.
    ///
    /// No per-line keyword parsing is done: a token anywhere in the block
    /// counts as advertised.
    #[must_use]
    pub fn from_ehlo(block: &ReplyBlock) -> Self {
        Self {
            pipelining: block.contains("PIPELINING"),
            eight_bit_mime: block.contains("8BITMIME"),
            dsn: block.contains("DSN"),
        }
    }

    /// Returns the MAIL FROM body parameter, if any.
    #[must_use]
    pub const fn body_parameter(&self) -> Option<&'static str> {
        if self.eight_bit_mime {
            Some(Self::BODY_8BITMIME)
        } else {
            None
        }
    }
}
