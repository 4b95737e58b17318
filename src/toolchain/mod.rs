/*!
# Toolchain

The external programs the engine hands work to after rewriting: the import
fixer that is run on every rewritten file, and the compiler that receives the
operator's arguments verbatim.
*/

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Failures of external tools
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` failed on {}: {output}", .path.display())]
    Failed {
        program: String,
        path: PathBuf,
        output: String,
    },
}

/// Result of the build step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

/// Normalizes the import declarations of one file in place
pub trait ImportFixer {
    fn fix_imports(&self, path: &Path) -> Result<(), ToolError>;
}

/// Runs the build with the operator's arguments
pub trait Compiler {
    fn build(&self, args: &[String]) -> Result<BuildOutcome, ToolError>;
}

impl<T: ImportFixer + ?Sized> ImportFixer for &T {
    fn fix_imports(&self, path: &Path) -> Result<(), ToolError> {
        (**self).fix_imports(path)
    }
}

impl<T: ImportFixer + ?Sized> ImportFixer for Box<T> {
    fn fix_imports(&self, path: &Path) -> Result<(), ToolError> {
        (**self).fix_imports(path)
    }
}

impl<T: Compiler + ?Sized> Compiler for &T {
    fn build(&self, args: &[String]) -> Result<BuildOutcome, ToolError> {
        (**self).build(args)
    }
}

impl<T: Compiler + ?Sized> Compiler for Box<T> {
    fn build(&self, args: &[String]) -> Result<BuildOutcome, ToolError> {
        (**self).build(args)
    }
}

/// `goimports -w FILE`
#[derive(Debug, Clone)]
pub struct GoImports {
    program: String,
}

impl GoImports {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ImportFixer for GoImports {
    fn fix_imports(&self, path: &Path) -> Result<(), ToolError> {
        tracing::debug!("{} -w {}", self.program, path.display());
        let output = run(Command::new(&self.program).arg("-w").arg(path), &self.program)?;
        if !output.status.success() {
            return Err(ToolError::Failed {
                program: self.program.clone(),
                path: path.to_path_buf(),
                output: combined(&output),
            });
        }
        Ok(())
    }
}

/// Import fixer that leaves files alone
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImportFixer;

impl ImportFixer for NoImportFixer {
    fn fix_imports(&self, path: &Path) -> Result<(), ToolError> {
        tracing::debug!("import fixing disabled, skipping {}", path.display());
        Ok(())
    }
}

/// The `go` command, run from the project root
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
    working_dir: PathBuf,
}

impl GoToolchain {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }
}

impl Compiler for GoToolchain {
    fn build(&self, args: &[String]) -> Result<BuildOutcome, ToolError> {
        tracing::info!("running {} {}", self.program, args.join(" "));
        let output = run(
            Command::new(&self.program).args(args).current_dir(&self.working_dir),
            &self.program,
        )?;
        Ok(BuildOutcome {
            success: output.status.success(),
            code: output.status.code(),
            output: combined(&output),
        })
    }
}

fn run(command: &mut Command, program: &str) -> Result<Output, ToolError> {
    command.output().map_err(|source| ToolError::Spawn {
        program: program.to_string(),
        source,
    })
}

fn combined(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let fixer = GoImports::new("noifgo-no-such-goimports");
        let err = fixer.fix_imports(Path::new("main.go")).unwrap_err();
        assert!(matches!(err, ToolError::Spawn { ref program, .. } if program == "noifgo-no-such-goimports"));

        let go = GoToolchain::new("noifgo-no-such-go", ".");
        assert!(matches!(go.build(&["build".to_string()]), Err(ToolError::Spawn { .. })));
    }

    #[test]
    fn test_no_import_fixer() {
        assert!(NoImportFixer.fix_imports(Path::new("does/not/exist.go")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_build_outcome_captures_status_and_output() {
        let sh = GoToolchain::new("sh", ".");
        let ok = sh
            .build(&["-c".to_string(), "echo built; echo warn >&2".to_string()])
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.code, Some(0));
        assert_eq!(ok.output, "built\nwarn\n");

        let failed = sh.build(&["-c".to_string(), "exit 3".to_string()]).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.code, Some(3));
    }
}
