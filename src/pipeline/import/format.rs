use std::path::Path;

use serde::{Deserialize, Serialize};

/// Broad input categories we handle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    StructuredExport,
    MarkupExport,
    Archive,
    Unsupported,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredExport => "structured_export",
            Self::MarkupExport => "markup_export",
            Self::Archive => "archive",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive)
    }
}

/// ZIP signatures: local file header, and the end-of-central-directory record
/// an empty archive starts with.
const ZIP_MAGIC: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06"];

/// Categorize an input by its extension (case-insensitive).
pub fn detect_format(path: &Path) -> FileCategory {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => FileCategory::StructuredExport,
        Some("html") | Some("htm") => FileCategory::MarkupExport,
        Some("zip") => FileCategory::Archive,
        _ => FileCategory::Unsupported,
    }
}

/// Magic bytes check; extensions can be wrong.
pub fn looks_like_zip(header: &[u8]) -> bool {
    ZIP_MAGIC.iter().any(|magic| header.starts_with(magic))
}

/// Sanitize a filename for logs: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("export");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "export".to_string()
    } else {
        clean
    }
}

/// Log-friendly name of `path`.
pub fn display_name(path: &Path) -> String {
    sanitize_filename(&path.to_string_lossy())
}
