//! Record-shape extractors.
//!
//! Each export format gets one [`ExportExtractor`] that walks raw bytes and
//! yields [`Sighting`]s. Extractors never resolve identities themselves; they
//! only report what each record says.
//!
//! ```text
//! bytes → ExportExtractor::extract → Vec<Sighting> → Resolver
//! ```
//!
//! A container that cannot be parsed at all is a [`FormatError`]. Individual
//! records that do not have a usable shape are skipped and counted.

pub mod markup;
pub mod registry;
pub mod structured;

pub use markup::MarkupExtractor;
pub use registry::ExtractorRegistry;
pub use structured::StructuredExtractor;

use thiserror::Error;

use crate::models::Sighting;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unexpected container shape: {0}")]
    UnexpectedShape(String),

    #[error("Input is not valid UTF-8: {0}")]
    Encoding(String),
}

/// Turns one export file's bytes into observations.
pub trait ExportExtractor: Send + Sync {
    /// Extract every sighting in record order.
    fn extract(&self, bytes: &[u8]) -> Result<Vec<Sighting>, FormatError>;
}

/// Per-pass bookkeeping for logging skipped records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassCounters {
    pub records: usize,
    pub skipped: usize,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub(crate) fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}
