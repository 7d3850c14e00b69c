//! Leaf normalizers shared by every extractor: timestamps and `@handle`
//! references. Both are pure and never fail.

pub mod mention;
pub mod timestamp;

pub use mention::scan_mentions;
pub use timestamp::{normalize_value, parse_epoch_text, parse_markup_timestamp, parse_timestamp};
