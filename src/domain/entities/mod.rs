//! Core domain entities.
//!
//! - [`Link`] - A short code bound to a target URL, with lifecycle status
//! - [`NewLink`] - Input for persisting a link
//! - [`LinkPatch`] - Partial update applied by the mutation path

pub mod link;

pub use link::{Link, LinkPatch, LinkStatus, NewLink};
