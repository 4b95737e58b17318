/*!
# NoIFGo

Go build wrapper that devirtualizes marked interfaces. Every interface
annotated with `//noifgo:ifdef` is resolved to its single implementation,
the implementation is exported under a prefixed name, and every reference
to the interface is replaced with the concrete type (pointer or value, as
the `//noifgo:{Name,p}` tag above the reference says). The `go` tool then
builds the rewritten tree and the original sources are restored.

## Architecture

```text
noifgo
├── Configuration   - project root discovery, marker file settings
├── Scanner         - finds //noifgo:ifdef tags
├── Tags            - per-reference conversion tags
├── Resolver        - implementation and reference queries (syntax | guru)
├── Rewrite         - edit planning, validation, application
├── Backup          - pristine copies and restoration
├── Toolchain       - goimports and go
└── Driver          - the per-tag state machine
```

## Usage

```bash
# in a project whose root contains a .noifgo file
noifgo build -a -gcflags "-m -m"
```

### Library
```rust,no_run
use noifgo::{Project, ProjectDriver};

let cwd = std::env::current_dir()?;
if let Some(project) = Project::locate(&cwd)? {
    let report = ProjectDriver::for_project(&project).run(&["build".to_string()]);
    println!("success: {}", report.success());
}
# Ok::<(), anyhow::Error>(())
```
*/

pub mod backup;
pub mod cli_common;
pub mod configuration;
pub mod core;
pub mod driver;
pub mod resolver;
pub mod rewrite;
pub mod scanner;
pub mod tags;
pub mod toolchain;

pub use backup::{BackupSession, RestoreReport};
pub use configuration::{Project, ResolverBackend, Settings, MARKER_FILE};
pub use self::core::{DevirtError, Implementation, Reference, SourceLocation, Stage, StageError, TaggedInterface};
pub use driver::{Driver, ProjectDriver, RunReport};
pub use resolver::{GuruResolver, ResolveError, Resolver, SyntaxResolver};
pub use rewrite::{ResolvedTag, Rewriter, Strategy};
pub use scanner::{ProcessedSet, TagScanner};
pub use tags::{Conversion, TagError};
pub use toolchain::{BuildOutcome, Compiler, GoImports, GoToolchain, ImportFixer, NoImportFixer, ToolError};
