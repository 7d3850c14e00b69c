//! Export processing pipeline.
//!
//! ```text
//! paths → import (archives, sources, batching)
//!       → extraction (JSON / HTML record walkers → sightings)
//!       → resolution (per-key merge → roster)
//! ```
//!
//! `normalize` holds the leaf helpers (timestamps, `@handle` scanning) every
//! extractor shares.

pub mod extraction;
pub mod import;
pub mod normalize;
pub mod resolution;
