/*!
# Project Configuration

The project root is the nearest directory, starting at the working directory
and walking up through its ancestors, that contains the `.noifgo` marker
file. The marker may be empty or hold TOML settings:

```toml
[resolver]
backend = "syntax"
guru = "guru"

[tools]
go = "go"
goimports = "goimports"   # "" disables import fixing

[rewrite]
strategy = "batch"
export_prefix = "NoIFGo"
backup_suffix = ".noifgo.bak"
source_extension = "go"
```
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::backup::DEFAULT_BACKUP_SUFFIX;
use crate::rewrite::Strategy;

/// Name of the file marking the project root
pub const MARKER_FILE: &str = ".noifgo";

/// Which [`Resolver`](crate::resolver::Resolver) answers symbol queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolverBackend {
    /// In-process tree-sitter analysis
    #[default]
    Syntax,
    /// External `guru` tool
    Guru,
}

impl fmt::Display for ResolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverBackend::Syntax => write!(f, "syntax"),
            ResolverBackend::Guru => write!(f, "guru"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverSettings {
    #[serde(default)]
    pub backend: ResolverBackend,

    /// `guru` executable
    #[serde(default = "default_guru")]
    pub guru: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            backend: ResolverBackend::Syntax,
            guru: default_guru(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSettings {
    /// Compiler executable
    #[serde(default = "default_go")]
    pub go: String,

    /// Import fixer executable; empty disables import fixing
    #[serde(default = "default_goimports")]
    pub goimports: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            go: default_go(),
            goimports: default_goimports(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewriteSettings {
    #[serde(default)]
    pub strategy: Strategy,

    /// Prepended to the implementation name to export it
    #[serde(default = "default_export_prefix")]
    pub export_prefix: String,

    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    /// Extension of the source files scanned for tags
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Batch,
            export_prefix: default_export_prefix(),
            backup_suffix: default_backup_suffix(),
            source_extension: default_source_extension(),
        }
    }
}

/// Contents of the marker file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub rewrite: RewriteSettings,
}

fn default_guru() -> String {
    "guru".to_string()
}

fn default_go() -> String {
    "go".to_string()
}

fn default_goimports() -> String {
    "goimports".to_string()
}

fn default_export_prefix() -> String {
    "NoIFGo".to_string()
}

fn default_backup_suffix() -> String {
    DEFAULT_BACKUP_SUFFIX.to_string()
}

fn default_source_extension() -> String {
    "go".to_string()
}

impl Settings {
    /// Parses marker file contents; blank content yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = toml::from_str(content).context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.rewrite.backup_suffix.is_empty() {
            anyhow::bail!("rewrite.backup_suffix must not be empty");
        }
        if self.rewrite.source_extension.is_empty() {
            anyhow::bail!("rewrite.source_extension must not be empty");
        }
        if self.tools.go.is_empty() {
            anyhow::bail!("tools.go must not be empty");
        }
        Ok(())
    }
}

/// A located project: its root and the settings of its marker file
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub settings: Settings,
}

impl Project {
    /// Finds the marker file in `start` or the nearest ancestor.
    ///
    /// `Ok(None)` when no ancestor has one.
    pub fn locate(start: &Path) -> Result<Option<Self>> {
        for dir in start.ancestors() {
            let marker = dir.join(MARKER_FILE);
            if !marker.is_file() {
                continue;
            }
            let root = dir
                .canonicalize()
                .with_context(|| format!("Failed to resolve {}", dir.display()))?;
            tracing::debug!("project root: {}", root.display());
            let settings = Settings::load_from_file(&marker)?;
            return Ok(Some(Self { root, settings }));
        }
        Ok(None)
    }

    /// Backup files left behind by an interrupted run.
    pub fn stale_backups(&self) -> Result<Vec<PathBuf>> {
        let suffix = self.settings.rewrite.backup_suffix.as_str();
        let mut stale = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.context("Failed to walk project tree")?;
            let is_backup = entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.ends_with(suffix));
            if is_backup {
                stale.push(entry.into_path());
            }
        }
        Ok(stale)
    }
}
