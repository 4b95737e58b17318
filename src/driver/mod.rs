/*!
# Driver

Runs the whole rewrite, one marked interface at a time:

```text
Scanning -> Resolving -> BackingUp -> Rewriting -> FixingImports   (per tag)
Building -> Restoring                                              (once)
```

The first failure ends the per-tag loop. The build still runs on whatever
has been rewritten so far, and every backed up file is restored afterwards
whatever happened before.
*/

use std::path::PathBuf;

use crate::backup::{BackupSession, RestoreReport};
use crate::configuration::{Project, ResolverBackend};
use crate::core::{DevirtError, Stage, StageError, TaggedInterface};
use crate::resolver::{GuruResolver, ResolveError, Resolver, SyntaxResolver};
use crate::rewrite::{ResolvedTag, Rewriter};
use crate::scanner::{ProcessedSet, TagScanner};
use crate::toolchain::{BuildOutcome, Compiler, GoImports, GoToolchain, ImportFixer, NoImportFixer};

/// What a run did
#[derive(Debug)]
pub struct RunReport {
    /// Tags rewritten completely, in processing order
    pub processed: Vec<TaggedInterface>,
    /// The failure that ended the run early, if any
    pub error: Option<StageError>,
    /// `None` if the compiler could not be started
    pub build: Option<BuildOutcome>,
    pub restore: RestoreReport,
}

impl RunReport {
    /// Every tag rewritten, the build passed and all files restored.
    pub fn success(&self) -> bool {
        self.error.is_none()
            && self.build.as_ref().map_or(false, |b| b.success)
            && self.restore.is_complete()
    }
}

/// Driver wired from a project's settings
pub type ProjectDriver = Driver<Box<dyn Resolver>, Box<dyn ImportFixer>, Box<dyn Compiler>>;

/// Orchestrates scanning, resolution, rewriting, building and restoring
pub struct Driver<R, F, C> {
    scanner: TagScanner,
    resolver: R,
    import_fixer: F,
    compiler: C,
    rewriter: Rewriter,
    backup_suffix: String,
}

impl ProjectDriver {
    pub fn for_project(project: &Project) -> Self {
        let settings = &project.settings;
        let extension = settings.rewrite.source_extension.clone();

        let resolver: Box<dyn Resolver> = match settings.resolver.backend {
            ResolverBackend::Syntax => Box::new(SyntaxResolver::new(&project.root, &extension)),
            ResolverBackend::Guru => {
                Box::new(GuruResolver::new(&settings.resolver.guru).with_working_dir(&project.root))
            }
        };
        let import_fixer: Box<dyn ImportFixer> = if settings.tools.goimports.is_empty() {
            Box::new(NoImportFixer)
        } else {
            Box::new(GoImports::new(&settings.tools.goimports))
        };
        let compiler: Box<dyn Compiler> = Box::new(GoToolchain::new(&settings.tools.go, &project.root));

        Driver::new(
            TagScanner::new(&project.root, extension),
            resolver,
            import_fixer,
            compiler,
            Rewriter::new(settings.rewrite.strategy, &settings.rewrite.export_prefix),
            &settings.rewrite.backup_suffix,
        )
    }
}

impl<R: Resolver, F: ImportFixer, C: Compiler> Driver<R, F, C> {
    pub fn new(
        scanner: TagScanner,
        resolver: R,
        import_fixer: F,
        compiler: C,
        rewriter: Rewriter,
        backup_suffix: impl Into<String>,
    ) -> Self {
        Self {
            scanner,
            resolver,
            import_fixer,
            compiler,
            rewriter,
            backup_suffix: backup_suffix.into(),
        }
    }

    /// Rewrites every tag, builds with `args`, restores the sources.
    pub fn run(&self, args: &[String]) -> RunReport {
        let mut session = BackupSession::new(&self.backup_suffix);
        let mut processed = Vec::new();

        let mut error = self.rewrite_all(&mut session, &mut processed).err();
        if let Some(err) = &error {
            tracing::error!("{}", err);
        }

        tracing::debug!("state: {}", Stage::Building);
        let build = match self.compiler.build(args) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                let err = StageError::new(Stage::Building, err);
                tracing::error!("{}", err);
                if error.is_none() {
                    error = Some(err);
                }
                None
            }
        };

        tracing::debug!("state: {}", Stage::Restoring);
        let restore = session.restore_all();
        tracing::info!("restore: {}", restore);

        RunReport {
            processed,
            error,
            build,
            restore,
        }
    }

    fn rewrite_all(
        &self,
        session: &mut BackupSession,
        done: &mut Vec<TaggedInterface>,
    ) -> Result<(), StageError> {
        let mut processed = ProcessedSet::new();
        loop {
            tracing::debug!("state: {}", Stage::Scanning);
            let tag = match self
                .scanner
                .next_tag(&processed)
                .map_err(|e| StageError::new(Stage::Scanning, e))?
            {
                Some(tag) => tag,
                None => return Ok(()),
            };
            processed.insert(tag.key());
            tracing::info!("devirtualizing {}", tag);

            tracing::debug!("state: {}", Stage::Resolving);
            let resolved = self
                .resolve(&tag)
                .map_err(|e| StageError::new(Stage::Resolving, e))?;

            tracing::debug!("state: {}", Stage::BackingUp);
            for path in resolved.files() {
                session
                    .ensure_backup(&path)
                    .map_err(|e| StageError::new(Stage::BackingUp, e))?;
            }

            tracing::debug!("state: {}", Stage::Rewriting);
            let touched = self
                .rewriter
                .rewrite(&resolved)
                .map_err(|e| StageError::new(Stage::Rewriting, e))?;

            tracing::debug!("state: {}", Stage::FixingImports);
            self.fix_imports(&touched)
                .map_err(|e| StageError::new(Stage::FixingImports, e))?;

            tracing::info!(
                "{} -> {}: {} references in {} files",
                tag.name,
                resolved.implementation.name,
                resolved.interface_refs.len(),
                touched.len()
            );
            done.push(tag);
        }
    }

    fn resolve(&self, tag: &TaggedInterface) -> Result<ResolvedTag, DevirtError> {
        let location = tag.location();
        let implementation = self.resolver.find_implementation(&location)?;
        tracing::debug!("implementation of {}: {}", tag.name, implementation);

        let interface_refs = self.resolver.find_references(&location)?;
        if interface_refs.is_empty() {
            return Err(ResolveError::NoReferences {
                symbol: tag.name.clone(),
                location,
            }
            .into());
        }
        let implementation_refs = self.resolver.find_references(&implementation.location())?;

        Ok(ResolvedTag::new(
            tag.clone(),
            implementation,
            interface_refs,
            implementation_refs,
        ))
    }

    fn fix_imports(&self, files: &[PathBuf]) -> Result<(), DevirtError> {
        for path in files {
            self.import_fixer.fix_imports(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Implementation, Reference, SourceLocation};
    use crate::rewrite::Strategy;
    use crate::toolchain::ToolError;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const ADDER: &str = "package lib

//noifgo:ifdef
type Adder interface {
	Add(a, b int) int
}

type adder struct{}

func (x *adder) Add(a, b int) int { return a + b }
";

    const NEW: &str = "package lib

//noifgo:{Adder,p}
func New() Adder { return &adder{} }
";

    /// Answers from fixed tables
    #[derive(Default)]
    struct StaticResolver {
        implementation: Option<Implementation>,
        ambiguous: bool,
        references: HashMap<SourceLocation, Vec<Reference>>,
    }

    impl Resolver for StaticResolver {
        fn find_implementation(&self, location: &SourceLocation) -> Result<Implementation, ResolveError> {
            if self.ambiguous {
                return Err(ResolveError::AmbiguousImplementation {
                    symbol: "Adder".into(),
                    location: location.clone(),
                    candidates: vec!["adder".into(), "other".into()],
                });
            }
            self.implementation.clone().ok_or_else(|| ResolveError::NoImplementation {
                symbol: "Adder".into(),
                location: location.clone(),
            })
        }

        fn find_references(&self, location: &SourceLocation) -> Result<Vec<Reference>, ResolveError> {
            Ok(self.references.get(location).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingFixer {
        calls: RefCell<Vec<PathBuf>>,
    }

    impl ImportFixer for RecordingFixer {
        fn fix_imports(&self, path: &Path) -> Result<(), ToolError> {
            self.calls.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    /// Records the arguments and what the watched files contain at build time
    struct RecordingCompiler {
        watch: Vec<PathBuf>,
        succeed: bool,
        args: RefCell<Vec<String>>,
        seen: RefCell<Vec<String>>,
    }

    impl RecordingCompiler {
        fn new(watch: Vec<PathBuf>, succeed: bool) -> Self {
            Self {
                watch,
                succeed,
                args: RefCell::default(),
                seen: RefCell::default(),
            }
        }
    }

    impl Compiler for RecordingCompiler {
        fn build(&self, args: &[String]) -> Result<BuildOutcome, ToolError> {
            *self.args.borrow_mut() = args.to_vec();
            for path in &self.watch {
                self.seen.borrow_mut().push(fs::read_to_string(path).unwrap());
            }
            Ok(BuildOutcome {
                success: self.succeed,
                code: Some(if self.succeed { 0 } else { 2 }),
                output: String::new(),
            })
        }
    }

    struct Fixture {
        dir: TempDir,
        resolver: StaticResolver,
    }

    impl Fixture {
        fn adder() -> Self {
            let dir = TempDir::new().unwrap();
            let lib = dir.path().join("lib");
            fs::create_dir(&lib).unwrap();
            fs::write(lib.join("adder.go"), ADDER).unwrap();
            fs::write(lib.join("new.go"), NEW).unwrap();

            let implementation = Implementation {
                path: lib.join("adder.go"),
                name: "adder".into(),
                row: 8,
                col: 6,
            };
            let mut references = HashMap::new();
            references.insert(
                SourceLocation::new(lib.join("adder.go"), 4, 6),
                vec![Reference::new(lib.join("new.go"), 4, 12)],
            );
            references.insert(
                implementation.location(),
                vec![
                    Reference::new(lib.join("adder.go"), 10, 10),
                    Reference::new(lib.join("new.go"), 4, 28),
                ],
            );
            let resolver = StaticResolver {
                implementation: Some(implementation),
                ambiguous: false,
                references,
            };
            Self { dir, resolver }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn driver<'a>(
            &'a self,
            fixer: &'a RecordingFixer,
            compiler: &'a RecordingCompiler,
            strategy: Strategy,
        ) -> Driver<&'a StaticResolver, &'a RecordingFixer, &'a RecordingCompiler> {
            Driver::new(
                TagScanner::new(self.dir.path(), "go"),
                &self.resolver,
                fixer,
                compiler,
                Rewriter::new(strategy, "NoIFGo"),
                ".noifgo.bak",
            )
        }

        fn backups(&self) -> Vec<PathBuf> {
            walkdir::WalkDir::new(self.dir.path())
                .into_iter()
                .filter_map(Result::ok)
                .map(|e| e.into_path())
                .filter(|p| p.to_string_lossy().ends_with(".noifgo.bak"))
                .collect()
        }
    }

    fn args() -> Vec<String> {
        vec!["build".to_string(), "-gcflags".to_string(), "-m -m".to_string()]
    }

    #[test]
    fn test_untagged_project_is_left_identical() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("main.go");
        fs::write(&main, "package main\n\nfunc main() {}\n").unwrap();

        let fixer = RecordingFixer::default();
        let compiler = RecordingCompiler::new(vec![main.clone()], true);
        let resolver = StaticResolver::default();
        let driver = Driver::new(
            TagScanner::new(dir.path(), "go"),
            &resolver,
            &fixer,
            &compiler,
            Rewriter::new(Strategy::Batch, "NoIFGo"),
            ".noifgo.bak",
        );

        let report = driver.run(&args());
        assert!(report.success());
        assert!(report.processed.is_empty());
        assert!(report.restore.restored.is_empty());
        assert_eq!(*compiler.args.borrow(), args());
        assert_eq!(fs::read_to_string(&main).unwrap(), "package main\n\nfunc main() {}\n");
        assert!(fixer.calls.borrow().is_empty());
    }

    #[test]
    fn test_rewritten_sources_are_built_then_restored() {
        for strategy in [Strategy::Batch, Strategy::Sequential] {
            let fx = Fixture::adder();
            let fixer = RecordingFixer::default();
            let compiler = RecordingCompiler::new(vec![fx.path("lib/adder.go"), fx.path("lib/new.go")], true);

            let report = fx.driver(&fixer, &compiler, strategy).run(&args());

            assert!(report.success(), "{:?}", report.error);
            assert_eq!(report.processed.len(), 1);
            assert_eq!(report.processed[0].name, "Adder");
            assert_eq!(
                *compiler.seen.borrow(),
                vec![
                    ADDER
                        .replace("type adder struct", "type NoIFGoadder struct")
                        .replace("(x *adder)", "(x *NoIFGoadder)"),
                    NEW.replace(
                        "func New() Adder { return &adder{} }",
                        "func New() *NoIFGoadder { return &NoIFGoadder{} }"
                    ),
                ]
            );
            assert_eq!(*fixer.calls.borrow(), vec![fx.path("lib/adder.go"), fx.path("lib/new.go")]);

            // restored byte for byte, no backups left
            assert_eq!(fs::read_to_string(fx.path("lib/adder.go")).unwrap(), ADDER);
            assert_eq!(fs::read_to_string(fx.path("lib/new.go")).unwrap(), NEW);
            assert_eq!(report.restore.restored.len(), 2);
            assert!(fx.backups().is_empty());
        }
    }

    #[test]
    fn test_ambiguous_implementation_aborts_before_backup() {
        let mut fx = Fixture::adder();
        fx.resolver.ambiguous = true;
        let fixer = RecordingFixer::default();
        let compiler = RecordingCompiler::new(vec![fx.path("lib/adder.go")], true);

        let report = fx.driver(&fixer, &compiler, Strategy::Batch).run(&args());

        let err = report.error.as_ref().unwrap();
        assert_eq!(err.stage, Stage::Resolving);
        assert_eq!(err.source.kind(), "ResolutionError");
        assert!(!report.success());
        // the build still ran, on untouched sources
        assert_eq!(*compiler.seen.borrow(), vec![ADDER.to_string()]);
        assert!(report.restore.restored.is_empty());
        assert!(fx.backups().is_empty());
    }

    #[test]
    fn test_interface_without_references_is_a_resolution_error() {
        let mut fx = Fixture::adder();
        fx.resolver.references.clear();
        let fixer = RecordingFixer::default();
        let compiler = RecordingCompiler::new(Vec::new(), true);

        let report = fx.driver(&fixer, &compiler, Strategy::Batch).run(&args());
        let err = report.error.unwrap();
        assert!(matches!(
            err.source,
            DevirtError::Resolution(ResolveError::NoReferences { .. })
        ));
    }

    #[test]
    fn test_malformed_tag_restores_every_backup() {
        for strategy in [Strategy::Batch, Strategy::Sequential] {
            let fx = Fixture::adder();
            let broken = NEW.replace("{Adder,p}", "{Adder;p}");
            fs::write(fx.path("lib/new.go"), &broken).unwrap();
            let fixer = RecordingFixer::default();
            let compiler = RecordingCompiler::new(Vec::new(), true);

            let report = fx.driver(&fixer, &compiler, strategy).run(&args());

            let err = report.error.as_ref().unwrap();
            assert_eq!(err.stage, Stage::Rewriting);
            assert_eq!(err.source.kind(), "TagGrammarError");
            assert!(report.restore.is_complete());
            assert_eq!(fs::read_to_string(fx.path("lib/adder.go")).unwrap(), ADDER);
            assert_eq!(fs::read_to_string(fx.path("lib/new.go")).unwrap(), broken);
            assert!(fx.backups().is_empty());
        }
    }

    #[test]
    fn test_failed_build_still_restores() {
        let fx = Fixture::adder();
        let fixer = RecordingFixer::default();
        let compiler = RecordingCompiler::new(Vec::new(), false);

        let report = fx.driver(&fixer, &compiler, Strategy::Batch).run(&args());

        assert!(report.error.is_none());
        assert_eq!(report.build.as_ref().map(|b| b.success), Some(false));
        assert!(!report.success());
        assert_eq!(fs::read_to_string(fx.path("lib/new.go")).unwrap(), NEW);
    }

    #[test]
    fn test_stale_backup_stops_the_run() {
        let fx = Fixture::adder();
        fs::write(fx.path("lib/new.go.noifgo.bak"), "pristine").unwrap();
        let fixer = RecordingFixer::default();
        let compiler = RecordingCompiler::new(Vec::new(), true);

        let report = fx.driver(&fixer, &compiler, Strategy::Batch).run(&args());

        let err = report.error.as_ref().unwrap();
        assert_eq!(err.stage, Stage::BackingUp);
        // the foreign backup is left alone, the session's own one restored
        assert_eq!(fs::read_to_string(fx.path("lib/new.go.noifgo.bak")).unwrap(), "pristine");
        assert_eq!(report.restore.restored, vec![fx.path("lib/adder.go")]);
    }
}
