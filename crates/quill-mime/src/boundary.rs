//! Multipart boundary tokens.

use crate::error::{Error, Result};
use rand::Rng;
use std::fmt;

/// The 64-character Base64 alphabet.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Generated tokens draw only from the alphanumeric prefix of the alphabet,
/// so the unquoted `boundary=` parameter never contains a tspecial.
const GENERATED_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Shortest generated token.
const MIN_GENERATED_LEN: usize = 10;

/// Longest generated token.
const MAX_GENERATED_LEN: usize = 20;

/// RFC 2046 limit on boundary length.
const MAX_BOUNDARY_LEN: usize = 70;

/// Delimiter token separating the parts of a `multipart/mixed` body.
///
/// Generated once per session and reused for every part, the closing
/// delimiter, and the optional DSN envelope identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Generates a random 10 to 20 character token from the thread-local RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generates a random token from the given RNG.
    ///
    /// The boundary is a protocol delimiter, not a secret, so any
    /// reasonably distributed generator will do; tests use a seeded one.
    #[must_use]
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let len = rng.gen_range(MIN_GENERATED_LEN..=MAX_GENERATED_LEN);
        let token = (0..len)
            .map(|_| char::from(GENERATED_CHARS[rng.gen_range(0..GENERATED_CHARS.len())]))
            .collect();
        Self(token)
    }

    /// Wraps an existing token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty, longer than 70 characters, or
    /// contains a character outside the Base64 alphabet.
    pub fn from_token(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() || token.len() > MAX_BOUNDARY_LEN {
            return Err(Error::InvalidBoundary(format!(
                "length {} outside 1..={MAX_BOUNDARY_LEN}",
                token.len()
            )));
        }
        if let Some(bad) = token.bytes().find(|b| !ALPHABET.contains(b)) {
            return Err(Error::InvalidBoundary(format!(
                "character {:?} not allowed",
                char::from(bad)
            )));
        }
        Ok(Self(token))
    }

    /// Returns the bare token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the delimiter line that opens a part: `--token`.
    #[must_use]
    pub fn delimiter(&self) -> String {
        format!("--{}", self.0)
    }

    /// Returns the delimiter line that closes the body: `--token--`.
    #[must_use]
    pub fn closing_delimiter(&self) -> String {
        format!("--{}--", self.0)
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
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
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generated_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let boundary = Boundary::generate_with(&mut rng);
            let len = boundary.as_str().len();
            assert!((MIN_GENERATED_LEN..=MAX_GENERATED_LEN).contains(&len));
            assert!(boundary.as_str().bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = Boundary::generate_with(&mut StdRng::seed_from_u64(42));
        let b = Boundary::generate_with(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_thread_rng_tokens_differ() {
        let tokens: std::collections::HashSet<Boundary> =
            (0..50).map(|_| Boundary::generate()).collect();
        assert!(tokens.len() > 45);
    }

    #[test]
    fn test_delimiters() {
        let boundary = Boundary::from_token("abc123").unwrap();
        assert_eq!(boundary.delimiter(), "--abc123");
        assert_eq!(boundary.closing_delimiter(), "--abc123--");
        assert_eq!(boundary.to_string(), "abc123");
    }

    #[test]
    fn test_from_token_rejects_bad_tokens() {
        assert!(Boundary::from_token("").is_err());
        assert!(Boundary::from_token("has space").is_err());
        assert!(Boundary::from_token("semi;colon").is_err());
        assert!(Boundary::from_token("x".repeat(71)).is_err());
        assert!(Boundary::from_token("a+b/c").is_ok());
    }
}
