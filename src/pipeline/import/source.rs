use std::io;
use std::path::Path;

/// Where export bytes come from.
pub trait FileSource: Send + Sync {
    /// Size in bytes, checked before reading.
    fn size(&self, path: &Path) -> io::Result<u64>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// The local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

impl FileSource for LocalFiles {
    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}
