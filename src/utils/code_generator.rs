//! Short code minting and custom alias validation.
//!
//! Generated codes are the base62 form of a snowflake identifier and can be
//! decoded back to it. Custom aliases share the alphabet but carry no numeric
//! meaning and are never passed through the decoder.

use crate::error::AppError;
use crate::utils::base62::{Base62Codec, digit_value};
use crate::utils::snowflake::IdGenerator;
use serde_json::json;

pub const ALIAS_MIN_LENGTH: usize = 3;
pub const ALIAS_MAX_LENGTH: usize = 20;

/// Codes that would shadow service routes.
const RESERVED_CODES: &[&str] = &["api", "health", "admin", "metrics", "static", "links"];

/// Mints a fresh identifier and its short code.
pub fn generate_code(generator: &IdGenerator, codec: &Base62Codec) -> Result<(u64, String), AppError> {
    let id = generator.generate()?;
    Ok((id, codec.encode(id)))
}

/// Validates a user-provided custom alias.
///
/// # Rules
///
/// - Length: 3-20 characters
/// - Allowed characters: `0-9`, `A-Z`, `a-z`
/// - Cannot be a reserved route segment (case-insensitive)
///
/// # Errors
///
/// Returns [`AppError::Validation`] if any rule is violated.
pub fn validate_custom_alias(alias: &str) -> Result<(), AppError> {
    let length = alias.chars().count();
    if !(ALIAS_MIN_LENGTH..=ALIAS_MAX_LENGTH).contains(&length) {
        return Err(AppError::bad_request(
            format!("Custom alias must be {ALIAS_MIN_LENGTH}-{ALIAS_MAX_LENGTH} characters"),
            json!({ "provided_length": length }),
        ));
    }

    if let Some(bad) = alias.chars().find(|c| digit_value(*c).is_none()) {
        return Err(AppError::bad_request(
            "Custom alias can only contain letters and digits",
            json!({ "alias": alias, "character": bad.to_string() }),
        ));
    }

    if RESERVED_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(alias))
    {
        return Err(AppError::bad_request(
            "This alias is reserved",
            json!({ "alias": alias }),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use crate::utils::snowflake::{ClockRegressionPolicy, EPOCH_MILLIS};
    use std::sync::Arc;

    #[test]
    fn test_generate_code_round_trips_to_id() {
        let generator = IdGenerator::new(
            0,
            1,
            ClockRegressionPolicy::Wait,
            Arc::new(ManualClock::new(EPOCH_MILLIS + 5_000)),
        )
        .unwrap();
        let codec = Base62Codec::default();

        let (id, code) = generate_code(&generator, &codec).unwrap();

        assert_eq!(code.len(), 7);
        assert_eq!(codec.decode(&code).unwrap(), id);
    }

    #[test]
    fn test_generate_code_is_unique() {
        let generator = IdGenerator::with_system_clock(0, 2).unwrap();
        let codec = Base62Codec::default();

        let codes: std::collections::HashSet<String> = (0..1000)
            .map(|_| generate_code(&generator, &codec).unwrap().1)
            .collect();

        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_validate_length_bounds() {
        assert!(validate_custom_alias("abc").is_ok());
        assert!(validate_custom_alias("abcdefghij0123456789").is_ok());
        assert!(validate_custom_alias("ab").is_err());
        assert!(validate_custom_alias("abcdefghij0123456789x").is_err());
        assert!(validate_custom_alias("").is_err());
    }

    #[test]
    fn test_validate_mixed_case_allowed() {
        assert!(validate_custom_alias("MyLink2024").is_ok());
    }

    #[test]
    fn test_validate_rejects_non_alphabet_characters() {
        let err = validate_custom_alias("my-link").unwrap_err();
        assert!(err.to_string().contains("letters and digits"));

        assert!(validate_custom_alias("my_link").is_err());
        assert!(validate_custom_alias("my link").is_err());
        assert!(validate_custom_alias("café").is_err());
    }

    #[test]
    fn test_validate_all_reserved_codes() {
        for &reserved in RESERVED_CODES {
            assert!(
                validate_custom_alias(reserved).is_err(),
                "Reserved code '{}' should be invalid",
                reserved
            );
        }
        assert!(validate_custom_alias("API").is_err());
    }
}
