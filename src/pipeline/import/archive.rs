//! Archive expansion.
//!
//! Full-account exports are usually shipped as one `.zip`. Members are
//! written into a caller-provided working directory (the aggregator hands in
//! a fresh `TempDir`) and returned as paths in name order.
//!
//! Expansion is bounded: member count and declared uncompressed size are
//! checked up front, and actual decompressed bytes are capped while copying
//! so a lying header cannot exhaust the disk. Member names that would land
//! outside the working directory are rejected.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::format::looks_like_zip;
use crate::config::BatchConfig;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    #[error("Archive has {count} entries, limit is {max}")]
    TooManyMembers { count: usize, max: usize },

    #[error("Archive expands past {max} bytes")]
    TooLarge { max: u64 },

    #[error("Unsafe entry name: {0}")]
    UnsafeEntry(String),
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::Corrupt(other.to_string()),
        }
    }
}

/// Turns an archive into loose files under `dest`.
pub trait ArchiveExpander: Send + Sync {
    fn expand(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError>;
}

/// ZIP expansion with resource limits.
#[derive(Debug, Clone)]
pub struct ZipExpander {
    max_members: usize,
    max_bytes: u64,
    /// Lowercase extensions to write out; `None` writes every file entry.
    extensions: Option<Vec<String>>,
}

impl ZipExpander {
    pub fn new(max_members: usize, max_bytes: u64) -> Self {
        Self {
            max_members,
            max_bytes,
            extensions: None,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.max_archive_members, config.max_archive_bytes)
    }

    /// Only write members whose extension is in `extensions`. Media and
    /// other payloads in an export never reach the disk.
    pub fn only_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        );
        self
    }

    fn wants(&self, name: &Path) -> bool {
        let Some(extensions) = &self.extensions else {
            return true;
        };
        name.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|e| extensions.contains(&e))
    }
}

impl Default for ZipExpander {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

impl ArchiveExpander for ZipExpander {
    fn expand(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
        let mut file = File::open(archive)?;
        let mut header = [0u8; 4];
        let read = file.read(&mut header)?;
        if !looks_like_zip(&header[..read]) {
            return Err(ArchiveError::Corrupt("not a ZIP archive".into()));
        }

        let mut zip = zip::ZipArchive::new(BufReader::new(File::open(archive)?))?;

        if zip.len() > self.max_members {
            return Err(ArchiveError::TooManyMembers {
                count: zip.len(),
                max: self.max_members,
            });
        }

        // Select members from the central directory without decompressing.
        let mut selected: Vec<(usize, PathBuf)> = Vec::new();
        let mut declared: u64 = 0;
        for index in 0..zip.len() {
            let entry = zip.by_index_raw(index)?;
            if !entry.is_file() {
                continue;
            }
            let Some(relative) = entry.enclosed_name() else {
                return Err(ArchiveError::UnsafeEntry(entry.name().to_string()));
            };
            if !self.wants(&relative) {
                continue;
            }
            declared = declared.saturating_add(entry.size());
            selected.push((index, relative.to_path_buf()));
        }

        if declared > self.max_bytes {
            return Err(ArchiveError::TooLarge { max: self.max_bytes });
        }

        let mut written = Vec::with_capacity(selected.len());
        let mut budget = self.max_bytes;
        for (index, relative) in selected {
            let mut entry = zip.by_index(index)?;
            let target = dest.join(&relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut out = File::create(&target)?;
            let copied = io::copy(&mut entry.by_ref().take(budget.saturating_add(1)), &mut out)?;
            if copied > budget {
                return Err(ArchiveError::TooLarge { max: self.max_bytes });
            }
            budget -= copied;

            tracing::trace!(member = %relative.display(), bytes = copied, "Archive member written");
            written.push(target);
        }

        written.sort();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn expander_trait_is_object_safe() {
        fn _assert_expander(_: &dyn ArchiveExpander) {}
    }

    #[test]
    fn expands_all_members_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        write_zip(
            &archive,
            &[
                ("chats/chat_02/messages.html", "<html></html>"),
                ("result.json", "{}"),
                ("photos/p1.jpg", "jpeg"),
            ],
        );

        let dest = tempfile::tempdir().unwrap();
        let members = ZipExpander::default().expand(&archive, dest.path()).unwrap();

        assert_eq!(members.len(), 3);
        assert!(members.iter().all(|m| m.starts_with(dest.path())));
        assert_eq!(std::fs::read(dest.path().join("result.json")).unwrap(), b"{}");
        let mut sorted = members.clone();
        sorted.sort();
        assert_eq!(members, sorted);
    }

    #[test]
    fn extension_filter_skips_media() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        write_zip(
            &archive,
            &[("result.json", "{}"), ("photos/p1.jpg", "jpeg")],
        );

        let dest = tempfile::tempdir().unwrap();
        let members = ZipExpander::default()
            .only_extensions(["json", ".HTML"])
            .expand(&archive, dest.path())
            .unwrap();

        assert_eq!(members, vec![dest.path().join("result.json")]);
        assert!(!dest.path().join("photos").exists());
    }

    #[test]
    fn member_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        write_zip(&archive, &[("a.json", "{}"), ("b.json", "{}"), ("c.json", "{}")]);

        let dest = tempfile::tempdir().unwrap();
        let err = ZipExpander::new(2, u64::MAX)
            .expand(&archive, dest.path())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::TooManyMembers { count: 3, max: 2 }));
    }

    #[test]
    fn size_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        let payload = "x".repeat(4096);
        write_zip(&archive, &[("result.json", payload.as_str())]);

        let dest = tempfile::tempdir().unwrap();
        let err = ZipExpander::new(10, 1024)
            .expand(&archive, dest.path())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::TooLarge { max: 1024 }));
    }

    #[test]
    fn non_zip_input_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        std::fs::write(&archive, b"{\"messages\": []}").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let err = ZipExpander::default().expand(&archive, dest.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupt(_)));
    }

    #[test]
    fn truncated_zip_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        std::fs::write(&archive, b"PK\x03\x04garbage").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let err = ZipExpander::default().expand(&archive, dest.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupt(_) | ArchiveError::Io(_)));
    }

    #[test]
    fn missing_archive_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ZipExpander::default()
            .expand(&dir.path().join("absent.zip"), dir.path())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }
}
