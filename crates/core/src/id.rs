//! Unique identifiers for Conductor entities.
//!
//! Identifiers are [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>`
//! wrappers parameterized by a domain marker, so a [`RunId`] can never be
//! confused with another UUID-shaped value. They are `Copy`, parse from
//! strings, and serialize as plain UUID strings.

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

define_uuid!(pub RunIdDomain => RunId);
