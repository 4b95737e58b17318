/*!
# Position translation

Converts 1-based `(row, column)` locations, as reported by analysis tools,
into 0-based byte offsets. Columns count bytes, not characters.

Lines end at `\n`; a preceding `\r` belongs to the line terminator, so CRLF
and LF files translate identically. A trailing newline does not open an
extra line.
*/

use std::path::Path;

use crate::core::errors::DevirtError;
use crate::core::source::SourceFile;

/// Errors produced while translating positions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("row {row} is outside the file ({line_count} lines)")]
    RowOutOfRange { row: usize, line_count: usize },

    #[error("column {col} is outside row {row} ({line_len} bytes)")]
    ColumnOutOfRange { row: usize, col: usize, line_len: usize },
}

/// Line start table for fast row/column <-> offset mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    /// Byte length of each line without its terminator.
    line_lens: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &[u8]) -> Self {
        let mut line_starts = Vec::with_capacity(text.len() / 32 + 1);
        let mut line_lens = Vec::with_capacity(text.len() / 32 + 1);

        let mut start = 0usize;
        while start < text.len() {
            line_starts.push(start);
            match text[start..].iter().position(|&b| b == b'\n') {
                Some(nl) => {
                    let mut content = nl;
                    if content > 0 && text[start + content - 1] == b'\r' {
                        content -= 1;
                    }
                    line_lens.push(content);
                    start += nl + 1;
                }
                None => {
                    let mut content = text.len() - start;
                    if content > 0 && text[text.len() - 1] == b'\r' {
                        content -= 1;
                    }
                    line_lens.push(content);
                    start = text.len();
                }
            }
        }

        Self {
            line_starts,
            line_lens,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of `row` (1-based) without its terminator.
    pub fn line_range(&self, row: usize) -> Result<std::ops::Range<usize>, PositionError> {
        let idx = self.row_index(row)?;
        let start = self.line_starts[idx];
        Ok(start..start + self.line_lens[idx])
    }

    /// 1-based `(row, col)` to 0-based byte offset.
    ///
    /// Column 1 is the first byte of the row; `line_len + 1` addresses the
    /// byte right after the last one, which is still a valid splice point.
    pub fn offset(&self, row: usize, col: usize) -> Result<usize, PositionError> {
        let idx = self.row_index(row)?;
        let line_len = self.line_lens[idx];
        if col == 0 || col > line_len + 1 {
            return Err(PositionError::ColumnOutOfRange { row, col, line_len });
        }
        Ok(self.line_starts[idx] + col - 1)
    }

    fn row_index(&self, row: usize) -> Result<usize, PositionError> {
        if row == 0 || row > self.line_starts.len() {
            return Err(PositionError::RowOutOfRange {
                row,
                line_count: self.line_starts.len(),
            });
        }
        Ok(row - 1)
    }
}

/// Reads `path` and translates `(row, col)` into a byte offset.
///
/// The file is read on every call; offsets must never outlive an edit.
pub fn to_offset(path: &Path, row: usize, col: usize) -> Result<usize, DevirtError> {
    SourceFile::load(path)?.offset(row, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_lf() {
        let idx = LineIndex::new(b"package main\n\ntype A interface{}\n");
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.offset(1, 1).unwrap(), 0);
        assert_eq!(idx.offset(2, 1).unwrap(), 13);
        // "type " is five bytes, so column 6 is the name
        assert_eq!(idx.offset(3, 6).unwrap(), 19);
    }

    #[test]
    fn test_offsets_crlf() {
        let idx = LineIndex::new(b"ab\r\ncd\r\n");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.offset(2, 1).unwrap(), 4);
        assert_eq!(idx.line_range(1).unwrap(), 0..2);
        assert!(matches!(
            idx.offset(1, 4),
            Err(PositionError::ColumnOutOfRange { line_len: 2, .. })
        ));
    }

    #[test]
    fn test_last_line_without_newline() {
        let idx = LineIndex::new(b"a\nbcd");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.offset(2, 3).unwrap(), 4);
        assert_eq!(idx.offset(2, 4).unwrap(), 5);
    }

    #[test]
    fn test_row_out_of_range() {
        let idx = LineIndex::new(b"one\ntwo\n");
        assert_eq!(
            idx.offset(3, 1),
            Err(PositionError::RowOutOfRange { row: 3, line_count: 2 })
        );
        assert!(idx.offset(0, 1).is_err());
        assert!(LineIndex::new(b"").offset(1, 1).is_err());
    }

    #[test]
    fn test_to_offset_reads_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("adder.go");
        std::fs::write(&path, "package lib\n\n//noifgo:ifdef\ntype Adder interface {}\n").unwrap();

        assert_eq!(to_offset(&path, 4, 6).unwrap(), 33);
        assert!(matches!(
            to_offset(&path, 9, 1),
            Err(DevirtError::Position { source: PositionError::RowOutOfRange { row: 9, .. }, .. })
        ));
        assert!(matches!(
            to_offset(&dir.path().join("missing.go"), 1, 1),
            Err(DevirtError::Io { .. })
        ));
    }

    #[test]
    fn test_multibyte_columns_are_bytes() {
        // 'é' is two bytes; the tool reports byte columns
        let idx = LineIndex::new("// é\nx".as_bytes());
        assert_eq!(idx.line_range(1).unwrap(), 0..5);
        assert_eq!(idx.offset(2, 1).unwrap(), 6);
    }
}
