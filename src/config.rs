use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "chat-roster";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest single export file admitted for reading (200MB).
pub const MAX_FILE_BYTES: u64 = 200 * 1024 * 1024;

/// Archive expansion limits.
pub const MAX_ARCHIVE_MEMBERS: usize = 10_000;
pub const MAX_ARCHIVE_UNCOMPRESSED_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    "warn,chat_roster=info".to_string()
}

/// Per-batch limits. Defaults come from the constants above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchConfig {
    /// Files larger than this are rejected before reading.
    pub max_file_bytes: u64,
    /// Archives with more entries than this are not expanded.
    pub max_archive_members: usize,
    /// Archives whose declared uncompressed total exceeds this are not expanded.
    pub max_archive_bytes: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: MAX_FILE_BYTES,
            max_archive_members: MAX_ARCHIVE_MEMBERS,
            max_archive_bytes: MAX_ARCHIVE_UNCOMPRESSED_BYTES,
        }
    }
}
