//! Identity resolution: folding sightings into one record per key.
//!
//! The [`Resolver`] owns the key → identity map; [`rules`] owns the per-field
//! merge policy.

pub mod resolver;
pub mod rules;

pub use resolver::Resolver;
pub use rules::{merge_into, Field, MergeRule, FIELD_RULES};
