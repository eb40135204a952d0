//! Email address types.

use crate::error::{Error, Result};
use quill_mime::encoding::encoded_word;

/// Punctuation allowed in a local part besides letters and digits.
const LOCAL_PART_PUNCTUATION: &[char] = &['.', '-', '_', '+'];

/// Email address for SMTP envelope.
///
/// Only the simple `local-part@domain` shape is accepted; anything else is
/// rejected before it can reach the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates an email address (basic validation).
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!("{addr}: missing @")));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "{addr}: local and domain parts cannot be empty"
            )));
        }

        if !local
            .chars()
            .all(|c| c.is_alphanumeric() || LOCAL_PART_PUNCTUATION.contains(&c))
        {
            return Err(Error::InvalidAddress(format!(
                "{addr}: unsupported character in local part"
            )));
        }

        if domain
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '@' | '<' | '>'))
        {
            return Err(Error::InvalidAddress(format!(
                "{addr}: unsupported character in domain"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: Address,
}

impl Mailbox {
    /// Parses `[Display Name ]local@domain`.
    ///
    /// The last whitespace-separated token is the address (angle brackets
    /// around it are tolerated); everything before it is the display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or the address is invalid.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (name, addr) = match input.rsplit_once(char::is_whitespace) {
            Some((name, addr)) => (Some(name.trim()), addr),
            None => (None, input),
        };
        let addr = addr.trim_start_matches('<').trim_end_matches('>');

        Ok(Self {
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
            address: Address::new(addr)?,
        })
    }

    /// Returns the display name as an RFC 2047 encoded word, if present.
    #[must_use]
    pub fn name_atom(&self) -> Option<String> {
        self.name.as_deref().map(encoded_word)
    }
}
