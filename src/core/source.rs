//! Source file helpers: byte-exact loading and atomic replacement.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::errors::DevirtError;
use crate::core::position::{LineIndex, PositionError};

/// A snapshot of one file's bytes together with its line table.
///
/// Snapshots are never kept across edits; reload after writing.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    bytes: Vec<u8>,
    lines: LineIndex,
}

impl SourceFile {
    pub fn load(path: &Path) -> Result<Self, DevirtError> {
        let bytes = fs::read(path).map_err(|e| DevirtError::io(path, e))?;
        Ok(Self::from_bytes(path, bytes))
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        let lines = LineIndex::new(&bytes);
        Self {
            path: path.into(),
            bytes,
            lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Byte offset of a 1-based `(row, col)`, with the path attached on error.
    pub fn offset(&self, row: usize, col: usize) -> Result<usize, DevirtError> {
        self.lines
            .offset(row, col)
            .map_err(|e| DevirtError::position(&self.path, e))
    }

    /// Text of a 1-based row without its terminator.
    pub fn line(&self, row: usize) -> Result<&[u8], PositionError> {
        let range = self.lines.line_range(row)?;
        Ok(&self.bytes[range])
    }
}

/// Replaces the content of `path` with `bytes` as one rename.
///
/// The new content is written to a temporary sibling which takes over the
/// original permissions before it is renamed onto `path`, so readers see
/// either the old or the new file, never a prefix of it.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), DevirtError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)
        .map_err(|e| DevirtError::io(path, e))?
        .permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DevirtError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| DevirtError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| DevirtError::io(tmp.path(), e))?;
    fs::set_permissions(tmp.path(), permissions).map_err(|e| DevirtError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| DevirtError::io(path, e.error))?;
    Ok(())
}

/// Package identity is the containing directory.
pub fn same_package(a: &Path, b: &Path) -> bool {
    a.parent() == b.parent()
}

/// Package name as derived from the containing directory's name.
pub fn package_name(path: &Path) -> String {
    path.parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether `path` is a test source (`*_test.go`) the analysis must ignore.
pub fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with("_test.go"))
        .unwrap_or(false)
}
