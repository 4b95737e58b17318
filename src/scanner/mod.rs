/*!
# Tag Scanner

Finds interface declarations marked for devirtualization:

```go
//noifgo:ifdef
type Adder interface {
```

The marker line must be followed directly by the declaration; a blank line in
between unmarks it. Every call walks the whole tree again, depth first in
file-name order, and returns the first marked interface whose
`(path, name)` pair the caller has not processed yet.
*/

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::{DevirtError, TaggedInterface};

/// Marker token announcing a devirtualization candidate
pub const INTERFACE_MARKER: &str = "noifgo:ifdef";

/// Declaration keyword plus the single space gofmt puts after it
const DECL_PREFIX: &str = "type ";

/// Keyword that must follow the name on the declaration line
const INTERFACE_KEYWORD: &str = "interface";

/// Column of the interface name: first byte after [`DECL_PREFIX`]
pub const NAME_COLUMN: usize = DECL_PREFIX.len() + 1;

/// `(path, name)` pairs the driver has already handled
pub type ProcessedSet = HashSet<(PathBuf, String)>;

/// Walks a source tree looking for marked interfaces
#[derive(Debug, Clone)]
pub struct TagScanner {
    root: PathBuf,
    extension: String,
}

impl TagScanner {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Next marked interface not contained in `processed`, if any.
    pub fn next_tag(&self, processed: &ProcessedSet) -> Result<Option<TaggedInterface>, DevirtError> {
        for path in self.source_files() {
            let path = path?;
            let bytes = fs::read(&path).map_err(|e| DevirtError::io(&path, e))?;
            let text = String::from_utf8_lossy(&bytes);

            for tag in scan_source(&path, &text) {
                if processed.contains(&tag.key()) {
                    continue;
                }
                tracing::debug!("found marked interface {}", tag);
                return Ok(Some(tag));
            }
        }
        Ok(None)
    }

    /// Every marked interface in the tree, in scan order.
    pub fn all_tags(&self) -> Result<Vec<TaggedInterface>, DevirtError> {
        let mut processed = ProcessedSet::new();
        let mut tags = Vec::new();
        while let Some(tag) = self.next_tag(&processed)? {
            processed.insert(tag.key());
            tags.push(tag);
        }
        Ok(tags)
    }

    fn source_files(&self) -> impl Iterator<Item = Result<PathBuf, DevirtError>> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let is_source = entry.file_type().is_file()
                        && entry.path().extension().and_then(|e| e.to_str())
                            == Some(self.extension.as_str());
                    is_source.then(|| Ok(entry.into_path()))
                }
                Err(err) => {
                    let path = err.path().unwrap_or(self.root.as_path()).to_path_buf();
                    Some(Err(DevirtError::io(path, err.into())))
                }
            })
    }
}

/// Marked interfaces of one file, in line order.
///
/// A marker above anything but a plain `type Name interface` line is
/// reported and skipped.
pub fn scan_source(path: &Path, text: &str) -> Vec<TaggedInterface> {
    let mut tags = Vec::new();
    for (row, line) in marked_lines(text) {
        match interface_name(line) {
            Some(name) => tags.push(TaggedInterface {
                path: path.to_path_buf(),
                name: name.to_string(),
                row,
                col: NAME_COLUMN,
            }),
            None => tracing::warn!(
                "{}:{}: `{}` above a line that is not an interface declaration, ignored",
                path.display(),
                row - 1,
                INTERFACE_MARKER
            ),
        }
    }
    tags
}

/// Lines directly below a marker, with their 1-based row.
fn marked_lines(text: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut marked = false;

    for (idx, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.contains(INTERFACE_MARKER) {
            marked = true;
            continue;
        }
        if marked {
            lines.push((idx + 1, line));
            marked = false;
        }
    }
    lines
}

/// Name declared by a `type <Name> ... interface ...` line.
fn interface_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DECL_PREFIX)?;
    let end = rest.find(' ')?;
    let name = &rest[..end];
    if !is_identifier(name) {
        return None;
    }
    rest[end..].contains(INTERFACE_KEYWORD).then_some(name)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ADDER: &str = "package lib\n\n//noifgo:ifdef\ntype Adder interface {\n\tAdd(a, b int) int\n}\n";

    #[test]
    fn test_scan_source_finds_marked_interface() {
        let tags = scan_source(Path::new("lib/adder.go"), ADDER);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Adder");
        assert_eq!(tags[0].row, 4);
        assert_eq!(tags[0].col, 6);
    }

    #[test]
    fn test_scan_source_rejects_non_declarations() {
        let cases = [
            // blank line between marker and declaration
            "//noifgo:ifdef\n\ntype A interface{}\n",
            // not an interface
            "//noifgo:ifdef\ntype A struct{}\n",
            // not a type declaration
            "//noifgo:ifdef\nvar A interface{}\n",
            // name glued to the keyword
            "//noifgo:ifdef\ntype A\n",
            // two spaces: the name would not start at the fixed column
            "//noifgo:ifdef\ntype  A interface{}\n",
            // unmarked
            "type A interface{}\n",
        ];
        for case in cases {
            assert!(scan_source(Path::new("x.go"), case).is_empty(), "{case:?}");
        }
    }

    #[test]
    fn test_generic_interface_marker_is_skipped() {
        let text = "package lib\n\n//noifgo:ifdef\ntype Adder[T any] interface {\n\tAdd(a, b T) T\n}\n";
        assert_eq!(marked_lines(text), vec![(4, "type Adder[T any] interface {")]);
        assert_eq!(interface_name("type Adder[T any] interface {"), None);
        assert!(scan_source(Path::new("generic.go"), text).is_empty());
    }

    #[test]
    fn test_scan_source_crlf() {
        let text = "//noifgo:ifdef\r\ntype Store interface {\r\n}\r\n";
        let tags = scan_source(Path::new("s.go"), text);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Store");
    }

    #[test]
    fn test_next_tag_skips_processed_and_terminates() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/adder.go"), ADDER).unwrap();
        fs::write(
            dir.path().join("main.go"),
            "package main\n//noifgo:ifdef\ntype Runner interface { Run() }\n//noifgo:ifdef\ntype Stopper interface { Stop() }\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "//noifgo:ifdef\ntype X interface{}\n").unwrap();

        let scanner = TagScanner::new(dir.path(), "go");
        let mut processed = ProcessedSet::new();
        let mut names = Vec::new();
        while let Some(tag) = scanner.next_tag(&processed).unwrap() {
            assert!(processed.insert(tag.key()), "{} returned twice", tag);
            names.push(tag.name);
        }

        assert_eq!(names, vec!["Adder", "Runner", "Stopper"]);
        // repeated calls stay exhausted
        assert!(scanner.next_tag(&processed).unwrap().is_none());
    }

    #[test]
    fn test_all_tags_on_untagged_tree() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        assert!(TagScanner::new(dir.path(), "go").all_tags().unwrap().is_empty());
    }
}
