//! Reversible base62 encoding between identifiers and short codes.
//!
//! Alphabet order is digits, then uppercase, then lowercase, so `'0'` is the
//! zero digit used for left padding.

use serde_json::json;

use crate::error::AppError;

pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: u64 = 62;

/// Default width of generated short codes.
pub const DEFAULT_CODE_LENGTH: usize = 7;

/// Digits needed for `u64::MAX`; a codec of this width is fixed-length for
/// every identifier.
pub const MAX_CODE_LENGTH: usize = 11;

/// Returns the alphabet index of `c`, or `None` if it is not a base62 digit.
pub fn digit_value(c: char) -> Option<u64> {
    match c {
        '0'..='9' => Some(c as u64 - '0' as u64),
        'A'..='Z' => Some(c as u64 - 'A' as u64 + 10),
        'a'..='z' => Some(c as u64 - 'a' as u64 + 36),
        _ => None,
    }
}

pub fn is_base62(s: &str) -> bool {
    s.chars().all(|c| digit_value(c).is_some())
}

/// Encodes identifiers to left-padded base62 strings and back.
///
/// Padding is applied up to `length`. An identifier whose minimal
/// representation is longer than `length` is emitted in full rather than
/// truncated, so `decode(encode(i)) == i` holds for every `u64`.
#[derive(Debug, Clone, Copy)]
pub struct Base62Codec {
    length: usize,
}

impl Default for Base62Codec {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
        }
    }
}

impl Base62Codec {
    /// # Errors
    ///
    /// Returns [`AppError::Configuration`] if `length` is 0 or above
    /// [`MAX_CODE_LENGTH`].
    pub fn new(length: usize) -> Result<Self, AppError> {
        if length == 0 || length > MAX_CODE_LENGTH {
            return Err(AppError::Configuration(format!(
                "short code length must be between 1 and {MAX_CODE_LENGTH}, got {length}"
            )));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Largest identifier that encodes to exactly `length` characters.
    pub fn max_fixed_width_value(&self) -> u64 {
        BASE.checked_pow(self.length as u32)
            .map(|v| v - 1)
            .unwrap_or(u64::MAX)
    }

    pub fn encode(&self, id: u64) -> String {
        let mut digits = [0u8; MAX_CODE_LENGTH];
        let mut start = MAX_CODE_LENGTH;
        let mut n = id;

        loop {
            start -= 1;
            digits[start] = ALPHABET[(n % BASE) as usize];
            n /= BASE;
            if n == 0 {
                break;
            }
        }

        let significant = &digits[start..];
        let mut code = String::with_capacity(self.length.max(significant.len()));
        for _ in significant.len()..self.length {
            code.push(ALPHABET[0] as char);
        }
        code.extend(significant.iter().map(|&b| b as char));
        code
    }

    /// # Errors
    ///
    /// - [`AppError::InvalidCharacter`] naming the first character outside the alphabet
    /// - [`AppError::Validation`] for an empty code or one that overflows 64 bits
    pub fn decode(&self, code: &str) -> Result<u64, AppError> {
        if code.is_empty() {
            return Err(AppError::bad_request(
                "Short code must not be empty",
                json!({}),
            ));
        }

        let mut acc: u64 = 0;
        for (position, character) in code.chars().enumerate() {
            let value = digit_value(character).ok_or(AppError::InvalidCharacter {
                character,
                position,
            })?;

            acc = acc
                .checked_mul(BASE)
                .and_then(|v| v.checked_add(value))
                .ok_or_else(|| {
                    AppError::bad_request(
                        "Short code exceeds the 64-bit identifier range",
                        json!({ "code": code }),
                    )
                })?;
        }

        Ok(acc)
    }
}
