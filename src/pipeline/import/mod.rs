pub mod aggregator;
pub mod archive;
pub mod format;
pub mod source;

pub use aggregator::*;
pub use archive::*;
pub use format::*;
pub use source::*;

use thiserror::Error;

use crate::pipeline::extraction::FormatError;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb:.1}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: f64 },

    #[error("Malformed export: {0}")]
    Format(#[from] FormatError),

    #[error("No input file could be read and parsed")]
    NoUsableInput,
}

impl ExtractError {
    pub(crate) fn too_large(size_bytes: u64, max_bytes: u64) -> Self {
        const MB: f64 = 1024.0 * 1024.0;
        Self::FileTooLarge {
            size_mb: size_bytes as f64 / MB,
            max_mb: max_bytes as f64 / MB,
        }
    }
}
