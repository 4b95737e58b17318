/*!
# Core Module

Types shared by every stage of the rewrite engine: positions, source file
snapshots, the symbols resolvers produce, and the error taxonomy.
*/

pub mod errors;
pub mod position;
pub mod source;
pub mod symbols;

pub use errors::{DevirtError, Stage, StageError};
pub use position::{to_offset, LineIndex, PositionError};
pub use source::{is_test_file, package_name, same_package, write_atomically, SourceFile};
pub use symbols::{normalize_references, Implementation, Reference, SourceLocation, TaggedInterface};
