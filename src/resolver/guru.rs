//! Resolver backed by the external `guru` tool.
//!
//! `guru` prints one location per line, `PATH:ROW.COL-ROW.COL: text`, where
//! the first line describes the queried symbol and the rest are the answers.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{single_implementation, ResolveError, Resolver};
use crate::core::{is_test_file, to_offset, Implementation, Reference, SourceLocation};

static LOCATION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?):(\d+)\.(\d+)(?:-(\d+)\.(\d+))?:\s*(.*)$").expect("valid location regex")
});

const IMPLEMENTED_BY: &str = "is implemented by";
const INTERFACE_TYPE: &str = "interface type";

/// One `PATH:ROW.COL[-ROW.COL]: text` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuruLine {
    pub path: PathBuf,
    pub row: usize,
    pub col: usize,
    pub text: String,
}

/// Runs `guru implements|referrers FILE:#OFFSET`
#[derive(Debug, Clone)]
pub struct GuruResolver {
    program: String,
    working_dir: Option<PathBuf>,
}

impl GuruResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn query(&self, mode: &str, location: &SourceLocation) -> Result<(String, String), ResolveError> {
        let offset = to_offset(&location.path, location.row, location.col)?;
        let target = format!("{}:#{}", location.path.display(), offset);
        let command = format!("{} {} {}", self.program, mode, target);
        tracing::debug!("running {}", command);

        let mut cmd = Command::new(&self.program);
        cmd.arg(mode).arg(&target);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|source| ResolveError::Spawn {
            command: command.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(ResolveError::Tool {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok((command, String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

impl Resolver for GuruResolver {
    fn find_implementation(&self, location: &SourceLocation) -> Result<Implementation, ResolveError> {
        let (command, stdout) = self.query("implements", location)?;
        let (symbol, candidates) = parse_implements(&command, &stdout)?;
        single_implementation(&symbol, location, candidates)
    }

    fn find_references(&self, location: &SourceLocation) -> Result<Vec<Reference>, ResolveError> {
        let (command, stdout) = self.query("referrers", location)?;
        parse_referrers(&command, &stdout)
    }
}

/// Parses one output line; `None` if it does not start with a location.
pub fn parse_line(line: &str) -> Option<GuruLine> {
    let caps = LOCATION_LINE.captures(line)?;
    Some(GuruLine {
        path: PathBuf::from(&caps[1]),
        row: caps[2].parse().ok()?,
        col: caps[3].parse().ok()?,
        text: caps[6].trim().to_string(),
    })
}

/// Splits output into the header and the answer lines, dropping test files.
fn answers(command: &str, output: &str) -> Result<(GuruLine, Vec<(usize, GuruLine)>), ResolveError> {
    let mut lines = output
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or_else(|| ResolveError::EmptyOutput {
        command: command.to_string(),
    })?;
    let header = parse_line(header).ok_or_else(|| ResolveError::Garbled {
        command: command.to_string(),
        line_no: 1,
        line: header.to_string(),
    })?;

    let mut parsed = Vec::new();
    for (idx, line) in lines {
        let entry = parse_line(line).ok_or_else(|| ResolveError::Garbled {
            command: command.to_string(),
            line_no: idx + 1,
            line: line.to_string(),
        })?;
        if is_test_file(&entry.path) {
            continue;
        }
        parsed.push((idx + 1, entry));
    }
    Ok((header, parsed))
}

/// Queried interface name and every concrete type implementing it.
pub fn parse_implements(command: &str, output: &str) -> Result<(String, Vec<Implementation>), ResolveError> {
    let (header, lines) = answers(command, output)?;
    let symbol = type_name(&header.text).unwrap_or_default();

    let candidates = lines
        .into_iter()
        .filter(|(_, line)| line.text.starts_with(IMPLEMENTED_BY) && !line.text.contains(INTERFACE_TYPE))
        .map(|(line_no, line)| {
            let name = type_name(&line.text).ok_or_else(|| ResolveError::Garbled {
                command: command.to_string(),
                line_no,
                line: line.text.clone(),
            })?;
            Ok(Implementation {
                path: line.path,
                name,
                row: line.row,
                col: line.col,
            })
        })
        .collect::<Result<Vec<_>, ResolveError>>()?;
    Ok((symbol, candidates))
}

/// Use sites listed by `referrers`, header excluded.
pub fn parse_referrers(command: &str, output: &str) -> Result<Vec<Reference>, ResolveError> {
    let (_, lines) = answers(command, output)?;
    Ok(lines
        .into_iter()
        .map(|(_, line)| Reference::new(line.path, line.row, line.col))
        .collect())
}

/// `struct type example.com/app/lib.adder` -> `adder`
fn type_name(text: &str) -> Option<String> {
    let last = text.split_whitespace().last()?;
    let last = last.trim_start_matches('*');
    let base = Path::new(last).file_name()?.to_str()?;
    let name = base.rsplit('.').next()?;
    (!name.is_empty()).then(|| name.to_string())
}
