//! Building blocks shared across layers.
//!
//! - [`clock`] - Millisecond clock seam
//! - [`snowflake`] - Time-sortable 64-bit identifier generation
//! - [`base62`] - Reversible identifier ↔ short code encoding
//! - [`code_generator`] - Short code minting and custom alias validation
//! - [`url_validator`] - Target URL validation

pub mod base62;
pub mod clock;
pub mod code_generator;
pub mod snowflake;
pub mod url_validator;
