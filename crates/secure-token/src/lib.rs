//! Secure token primitives for claude-wrapper
//!
//! - Random token generation over the URL-safe unreserved alphabet
//! - Format validation against a configurable length bound
//! - Constant-time comparison for bearer tokens
//! - Short SHA-256 fingerprints and masks for log correlation
//!
//! Nothing in this crate is used for authorization decisions except
//! [`constant_time_equals`]. Hashes and masks exist so secrets can be
//! correlated in logs without ever being printed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Unreserved characters tokens are drawn from (RFC 3986 minus `.` and `~`).
///
/// 64 symbols, so `byte % 64` maps every random byte without modulo bias.
pub const TOKEN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Default minimum token length (inclusive)
pub const DEFAULT_MIN_LENGTH: usize = 8;

/// Default maximum token length (inclusive)
pub const DEFAULT_MAX_LENGTH: usize = 256;

/// Sentinel returned by [`safe_hash`] for empty input
pub const EMPTY_HASH: &str = "empty";

/// Number of hex characters kept from the digest
const HASH_PREFIX_LEN: usize = 8;

/// Visible prefix length used by [`mask_secret`]
const MASK_PREFIX_LEN: usize = 4;

/// Values shorter than this are masked without any visible prefix
const MASK_MIN_REVEAL_LEN: usize = 12;

/// Token utility errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Requested length is outside the generator's bound
    #[error("Token length {length} is outside the allowed range {min}-{max}")]
    LengthOutOfBounds {
        /// Requested length
        length: usize,
        /// Inclusive minimum
        min: usize,
        /// Inclusive maximum
        max: usize,
    },

    /// Generator bounds are unusable
    #[error("Invalid token bounds: min={min}, max={max}")]
    InvalidBounds {
        /// Requested minimum
        min: usize,
        /// Requested maximum
        max: usize,
    },
}

/// Token generator with an inclusive length bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGenerator {
    min_length: usize,
    max_length: usize,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl TokenGenerator {
    /// Generator using the default 8–256 bound
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator with a custom inclusive bound
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidBounds`] when `min` is zero or greater than `max`.
    pub fn with_bounds(min: usize, max: usize) -> Result<Self, TokenError> {
        if min == 0 || min > max {
            return Err(TokenError::InvalidBounds { min, max });
        }
        Ok(Self {
            min_length: min,
            max_length: max,
        })
    }

    /// Inclusive minimum length
    #[must_use]
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Inclusive maximum length
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Generate a token of exactly `length` characters.
    ///
    /// The bound is a precondition, not a clamp.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::LengthOutOfBounds`] when `length` is outside the bound.
    pub fn generate(&self, length: usize) -> Result<String, TokenError> {
        if !self.in_bounds(length) {
            return Err(TokenError::LengthOutOfBounds {
                length,
                min: self.min_length,
                max: self.max_length,
            });
        }

        let mut bytes = vec![0u8; length];
        rand::rng().fill(bytes.as_mut_slice());

        Ok(bytes
            .iter()
            .map(|b| char::from(TOKEN_ALPHABET[usize::from(*b) % TOKEN_ALPHABET.len()]))
            .collect())
    }

    /// Check that `token` has an in-bound length and only alphabet characters
    #[must_use]
    pub fn validate_format(&self, token: &str) -> bool {
        self.in_bounds(token.len()) && token.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
    }

    fn in_bounds(&self, length: usize) -> bool {
        (self.min_length..=self.max_length).contains(&length)
    }
}

/// Generate a token with the default bound
///
/// # Errors
///
/// Returns [`TokenError::LengthOutOfBounds`] when `length` is outside 8–256.
pub fn generate_token(length: usize) -> Result<String, TokenError> {
    TokenGenerator::default().generate(length)
}

/// Validate a token against the default bound
#[must_use]
pub fn validate_format(token: &str) -> bool {
    TokenGenerator::default().validate_format(token)
}

/// First 8 hex characters of the SHA-256 digest of `value`.
///
/// Returns [`EMPTY_HASH`] for empty input. Correlation only.
#[must_use]
pub fn safe_hash(value: &str) -> String {
    if value.is_empty() {
        return EMPTY_HASH.to_string();
    }
    let digest = Sha256::digest(value.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_PREFIX_LEN);
    hex
}

/// Compare two secrets without short-circuiting on content.
///
/// Length is not secret, so a length mismatch returns early.
#[must_use]
pub fn constant_time_equals(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Mask a secret for display: short prefix, stars and a hash fingerprint.
///
/// Values under 12 characters show no prefix at all.
#[must_use]
pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        return format!("**** (sha256:{EMPTY_HASH})");
    }
    let hash = safe_hash(value);
    if value.len() < MASK_MIN_REVEAL_LEN || !value.is_char_boundary(MASK_PREFIX_LEN) {
        return format!("**** (sha256:{hash})");
    }
    format!("{}**** (sha256:{hash})", &value[..MASK_PREFIX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_have_requested_length_and_valid_format() {
        for length in [8, 16, 32, 64, 128, 256] {
            let token = generate_token(length).unwrap();
            assert_eq!(token.len(), length);
            assert!(validate_format(&token), "token failed validation: {token}");
        }
    }

    #[test]
    fn generation_rejects_out_of_bound_lengths() {
        assert_eq!(
            generate_token(7),
            Err(TokenError::LengthOutOfBounds {
                length: 7,
                min: 8,
                max: 256
            })
        );
        assert!(generate_token(257).is_err());
        assert!(generate_token(0).is_err());
    }

    #[test]
    fn tokens_are_not_repeated() {
        let a = generate_token(32).unwrap();
        let b = generate_token(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn custom_bounds_apply_to_generation_and_validation() {
        let generator = TokenGenerator::with_bounds(16, 128).unwrap();
        assert!(generator.generate(15).is_err());
        assert!(generator.generate(129).is_err());

        let token = generator.generate(16).unwrap();
        assert!(generator.validate_format(&token));
        assert!(!generator.validate_format("short-token"));
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(TokenGenerator::with_bounds(0, 10).is_err());
        assert!(TokenGenerator::with_bounds(20, 10).is_err());
        assert!(TokenGenerator::with_bounds(10, 10).is_ok());
    }

    #[test]
    fn validate_format_rejects_foreign_characters() {
        assert!(validate_format("abcdEFGH1234-_xy"));
        assert!(!validate_format("abcd efgh 1234"));
        assert!(!validate_format("abcd.efgh~1234"));
        assert!(!validate_format("ключключключ"));
        assert!(!validate_format(""));
    }

    #[test]
    fn safe_hash_is_short_stable_and_marks_empty() {
        let h = safe_hash("secret-value");
        assert_eq!(h.len(), 8);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, safe_hash("secret-value"));
        assert_ne!(h, safe_hash("secret-valuf"));
        assert_eq!(safe_hash(""), EMPTY_HASH);
    }

    #[test]
    fn constant_time_equals_behaves_like_equality() {
        assert!(constant_time_equals("", ""));
        assert!(constant_time_equals("correct-key-1234567890", "correct-key-1234567890"));
        assert!(!constant_time_equals("correct-key-1234567890", "correct-key-1234567891"));
        assert!(!constant_time_equals("short", "longer-value"));
        assert!(!constant_time_equals("abc", ""));
    }

    #[test]
    fn mask_never_reveals_the_tail() {
        let masked = mask_secret("abcdefghijklmnop");
        assert!(masked.starts_with("abcd****"));
        assert!(!masked.contains("defghijklmnop"));
        assert!(masked.contains(&safe_hash("abcdefghijklmnop")));
    }

    #[test]
    fn mask_hides_short_values_completely() {
        let masked = mask_secret("tiny-key");
        assert!(masked.starts_with("****"));
        assert!(!masked.contains("tiny"));
        assert_eq!(mask_secret(""), "**** (sha256:empty)");
    }
}
