//! Symbols the engine moves between its stages.

use std::fmt;
use std::path::{Path, PathBuf};

/// A 1-based `(row, col)` location in one file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub row: usize,
    pub col: usize,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>, row: usize, col: usize) -> Self {
        Self {
            path: path.into(),
            row,
            col,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.row, self.col)
    }
}

/// An interface declaration preceded by the devirtualization marker.
///
/// Identified by `(path, name)`; `col` addresses the first byte of the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedInterface {
    pub path: PathBuf,
    pub name: String,
    pub row: usize,
    pub col: usize,
}

impl TaggedInterface {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(&self.path, self.row, self.col)
    }

    pub fn key(&self) -> (PathBuf, String) {
        (self.path.clone(), self.name.clone())
    }
}

impl fmt::Display for TaggedInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.location())
    }
}

/// The only concrete type implementing a [`TaggedInterface`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Implementation {
    pub path: PathBuf,
    pub name: String,
    pub row: usize,
    pub col: usize,
}

impl Implementation {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(&self.path, self.row, self.col)
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.location())
    }
}

/// A use site of a symbol, as reported by a resolver
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    pub path: PathBuf,
    pub row: usize,
    pub col: usize,
}

impl Reference {
    pub fn new(path: impl Into<PathBuf>, row: usize, col: usize) -> Self {
        Self {
            path: path.into(),
            row,
            col,
        }
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(&self.path, self.row, self.col)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl From<&Implementation> for Reference {
    fn from(implementation: &Implementation) -> Self {
        Reference::new(&implementation.path, implementation.row, implementation.col)
    }
}

/// Sorts by `(path, row, col)` and drops duplicates.
///
/// Same-row references must be handled left to right.
pub fn normalize_references(references: &mut Vec<Reference>) {
    references.sort();
    references.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_orders_same_row_by_column() {
        let mut refs = vec![
            Reference::new("b.go", 1, 1),
            Reference::new("a.go", 3, 30),
            Reference::new("a.go", 3, 10),
            Reference::new("a.go", 3, 10),
        ];
        normalize_references(&mut refs);
        assert_eq!(
            refs,
            vec![
                Reference::new("a.go", 3, 10),
                Reference::new("a.go", 3, 30),
                Reference::new("b.go", 1, 1),
            ]
        );
    }

    #[test]
    fn test_location_display() {
        let tag = TaggedInterface {
            path: PathBuf::from("lib/adder.go"),
            name: "Adder".into(),
            row: 4,
            col: 6,
        };
        assert_eq!(tag.to_string(), "Adder (lib/adder.go:4:6)");
    }
}
