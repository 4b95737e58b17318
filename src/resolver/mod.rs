/*!
# Resolver

Symbol analysis the rewrite engine depends on, behind one trait:

- `find_implementation`: the single concrete type implementing the
  interface declared at a location
- `find_references`: every use site of the symbol declared at a location,
  excluding the declaration itself and test files

Two backends are provided. [`SyntaxResolver`] works in-process on
tree-sitter syntax trees; [`GuruResolver`] shells out to the `guru` tool and
parses its line-oriented output.
*/

use std::path::PathBuf;

use crate::core::{DevirtError, Implementation, Reference, SourceLocation};

pub mod guru;
pub mod syntax;

pub use guru::GuruResolver;
pub use syntax::SyntaxResolver;

/// Failures of symbol resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no implementation of {symbol} at {location}")]
    NoImplementation { symbol: String, location: SourceLocation },

    #[error("{symbol} at {location} has several implementations: {}", .candidates.join(", "))]
    AmbiguousImplementation {
        symbol: String,
        location: SourceLocation,
        candidates: Vec<String>,
    },

    #[error("{symbol} at {location} is never referenced")]
    NoReferences { symbol: String, location: SourceLocation },

    #[error("no symbol at {0}")]
    SymbolNotFound(SourceLocation),

    #[error("{symbol} at {location} is not an interface")]
    NotAnInterface { symbol: String, location: SourceLocation },

    #[error("`{command}` exited with {status}: {stderr}")]
    Tool {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected line {line_no} in `{command}` output: {line:?}")]
    Garbled {
        command: String,
        line_no: usize,
        line: String,
    },

    #[error("`{command}` printed nothing")]
    EmptyOutput { command: String },

    #[error("cannot load the Go grammar: {0}")]
    Grammar(String),

    #[error("failed to parse {}", .path.display())]
    Parse { path: PathBuf },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The queried location could not be read or translated
    #[error(transparent)]
    Source(Box<DevirtError>),
}

impl From<DevirtError> for ResolveError {
    fn from(err: DevirtError) -> Self {
        Self::Source(Box::new(err))
    }
}

/// Symbol analysis backend
pub trait Resolver {
    /// Unique non-test concrete type implementing the interface at `location`.
    fn find_implementation(&self, location: &SourceLocation) -> Result<Implementation, ResolveError>;

    /// Use sites of the symbol declared at `location`.
    ///
    /// Test files and the declaration itself are never reported. The list
    /// may be empty.
    fn find_references(&self, location: &SourceLocation) -> Result<Vec<Reference>, ResolveError>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn find_implementation(&self, location: &SourceLocation) -> Result<Implementation, ResolveError> {
        (**self).find_implementation(location)
    }

    fn find_references(&self, location: &SourceLocation) -> Result<Vec<Reference>, ResolveError> {
        (**self).find_references(location)
    }
}

impl<R: Resolver + ?Sized> Resolver for Box<R> {
    fn find_implementation(&self, location: &SourceLocation) -> Result<Implementation, ResolveError> {
        (**self).find_implementation(location)
    }

    fn find_references(&self, location: &SourceLocation) -> Result<Vec<Reference>, ResolveError> {
        (**self).find_references(location)
    }
}

/// Picks the only candidate, or reports none/several.
pub(crate) fn single_implementation(
    symbol: &str,
    location: &SourceLocation,
    mut candidates: Vec<Implementation>,
) -> Result<Implementation, ResolveError> {
    match candidates.len() {
        0 => Err(ResolveError::NoImplementation {
            symbol: symbol.to_string(),
            location: location.clone(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(ResolveError::AmbiguousImplementation {
            symbol: symbol.to_string(),
            location: location.clone(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }),
    }
}
