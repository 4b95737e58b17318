/*!
# Error taxonomy

Every failure of the rewrite engine is fail-fast and carries enough context
(file, row, column, symbol) for the operator to fix the annotation or report
a defect. No stage retries.
*/

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::position::PositionError;
use crate::resolver::ResolveError;
use crate::tags::TagError;
use crate::toolchain::ToolError;

/// Umbrella error of the rewrite engine
#[derive(Debug, thiserror::Error)]
pub enum DevirtError {
    /// Zero or several implementations, unusable reference results
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// Malformed reference tag comment
    #[error("malformed reference tag: {0}")]
    TagGrammar(#[from] TagError),

    /// Row/column outside the file
    #[error("{}: {source}", .path.display())]
    Position {
        path: PathBuf,
        #[source]
        source: PositionError,
    },

    /// Read/write/copy failure
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes at a computed span are not the text the resolver promised
    #[error(
        "{}:{row}:{col}: expected `{expected}` but found `{found}`",
        .path.display()
    )]
    TextMismatch {
        path: PathBuf,
        row: usize,
        col: usize,
        expected: String,
        found: String,
    },

    /// Two planned edits of one file cover the same bytes
    #[error(
        "overlapping edits in {}: {first_start}..{first_end} and {second_start}..{second_end}",
        .path.display()
    )]
    OverlappingEdits {
        path: PathBuf,
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },

    /// Import fixer or compiler could not do its job
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A backup from an earlier, unfinished run is still on disk
    #[error(
        "backup {} already exists; restore it over {} before running again",
        .backup.display(),
        .path.display()
    )]
    StaleBackup { path: PathBuf, backup: PathBuf },
}

impl DevirtError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn position(path: impl AsRef<Path>, source: PositionError) -> Self {
        Self::Position {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Short category name used in operator output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "ResolutionError",
            Self::TagGrammar(_) => "TagGrammarError",
            Self::Position { .. } => "PositionError",
            Self::Io { .. } | Self::StaleBackup { .. } => "IOError",
            Self::TextMismatch { .. } | Self::OverlappingEdits { .. } => "RewriteError",
            Self::Tool(_) => "ToolError",
        }
    }
}

/// States of the driver; used to tag failures with where they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Scanning,
    Resolving,
    BackingUp,
    Rewriting,
    FixingImports,
    Building,
    Restoring,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scanning => "scanning",
            Stage::Resolving => "resolving",
            Stage::BackingUp => "backing up",
            Stage::Rewriting => "rewriting",
            Stage::FixingImports => "fixing imports",
            Stage::Building => "building",
            Stage::Restoring => "restoring",
        };
        f.write_str(name)
    }
}

/// A [`DevirtError`] annotated with the driver stage that raised it
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed ({}): {source}", .source.kind())]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: DevirtError,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<DevirtError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_location() {
        let err = DevirtError::TextMismatch {
            path: PathBuf::from("lib/a.go"),
            row: 4,
            col: 6,
            expected: "Adder".to_string(),
            found: "Other".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "lib/a.go:4:6: expected `Adder` but found `Other`"
        );
        assert_eq!(err.kind(), "RewriteError");
    }

    #[test]
    fn test_stage_error_display() {
        let err = StageError::new(
            Stage::Rewriting,
            DevirtError::position("a.go", PositionError::RowOutOfRange { row: 9, line_count: 3 }),
        );
        let text = err.to_string();
        assert!(text.starts_with("rewriting failed (PositionError)"));
        assert!(text.contains("row 9"));
    }
}
