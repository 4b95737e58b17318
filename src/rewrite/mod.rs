/*!
# Rewrite

Turns a resolved tag into file edits.

For one tag the implementation type is renamed to its exported name at its
declaration and every use, then every interface reference is replaced by the
concrete type as its reference tag prescribes.

Two strategies are available:

- [`Strategy::Batch`]: plan every edit against one snapshot per file, then
  apply each file's edits in a single pass. A bad tag or a stale position
  aborts before any byte is written.
- [`Strategy::Sequential`]: apply edits one at a time, re-reading the file
  for each and shifting columns by the growth of earlier edits on the same
  row.
*/

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{normalize_references, DevirtError, Implementation, Reference, SourceFile, TaggedInterface};
use crate::tags::read_reference_tag;

pub mod applier;
pub mod planner;

pub use applier::{apply_edit, EditBatch, FileEdits};
pub use planner::{EditPlan, GrowthLedger, Qualifier, SubstitutionPlanner};

/// How the edits of one tag reach the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Batch,
    Sequential,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Batch => f.write_str("batch"),
            Strategy::Sequential => f.write_str("sequential"),
        }
    }
}

/// A tag together with everything resolution found for it
#[derive(Debug, Clone)]
pub struct ResolvedTag {
    pub interface: TaggedInterface,
    pub implementation: Implementation,
    pub interface_refs: Vec<Reference>,
    pub implementation_refs: Vec<Reference>,
}

impl ResolvedTag {
    pub fn new(
        interface: TaggedInterface,
        implementation: Implementation,
        mut interface_refs: Vec<Reference>,
        implementation_refs: Vec<Reference>,
    ) -> Self {
        normalize_references(&mut interface_refs);
        // the declaration is renamed along with its uses
        let mut implementation_refs = implementation_refs;
        implementation_refs.push(Reference::from(&implementation));
        normalize_references(&mut implementation_refs);
        Self {
            interface,
            implementation,
            interface_refs,
            implementation_refs,
        }
    }

    /// Interface file, implementation file and every referencing file
    pub fn files(&self) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        files.insert(self.interface.path.clone());
        files.insert(self.implementation.path.clone());
        files.extend(self.interface_refs.iter().map(|r| r.path.clone()));
        files.extend(self.implementation_refs.iter().map(|r| r.path.clone()));
        files
    }
}

/// Applies the edits of resolved tags
#[derive(Debug, Clone)]
pub struct Rewriter {
    strategy: Strategy,
    export_prefix: String,
}

impl Rewriter {
    pub fn new(strategy: Strategy, export_prefix: impl Into<String>) -> Self {
        Self {
            strategy,
            export_prefix: export_prefix.into(),
        }
    }

    /// Rewrites one tag; returns the files that were written.
    pub fn rewrite(&self, tag: &ResolvedTag) -> Result<Vec<PathBuf>, DevirtError> {
        tracing::debug!(
            "rewriting {} -> {}{} ({} strategy)",
            tag.interface,
            self.export_prefix,
            tag.implementation.name,
            self.strategy
        );
        match self.strategy {
            Strategy::Batch => self.rewrite_batch(tag),
            Strategy::Sequential => self.rewrite_sequential(tag),
        }
    }

    fn rewrite_batch(&self, tag: &ResolvedTag) -> Result<Vec<PathBuf>, DevirtError> {
        let planner = SubstitutionPlanner::new(&tag.interface, &tag.implementation, &self.export_prefix);
        let mut snapshots = BTreeMap::new();
        for path in tag.files() {
            let source = SourceFile::load(&path)?;
            snapshots.insert(path, source);
        }

        let mut batch = EditBatch::new();
        for reference in &tag.implementation_refs {
            batch.push(planner.plan_rename(snapshot(&snapshots, &reference.path)?, reference, 0)?);
        }
        for reference in &tag.interface_refs {
            let source = snapshot(&snapshots, &reference.path)?;
            let conversion = read_reference_tag(source, reference.row, &tag.interface.name)?;
            batch.push(planner.plan_reference(source, reference, conversion, 0)?);
        }
        batch.commit(&snapshots)
    }

    fn rewrite_sequential(&self, tag: &ResolvedTag) -> Result<Vec<PathBuf>, DevirtError> {
        let planner = SubstitutionPlanner::new(&tag.interface, &tag.implementation, &self.export_prefix);
        let mut ledger = GrowthLedger::new();
        let mut written = BTreeSet::new();

        for reference in &tag.implementation_refs {
            let source = SourceFile::load(&reference.path)?;
            let shift = ledger.shift(&reference.path, reference.row, reference.col);
            let plan = planner.plan_rename(&source, reference, shift)?;
            apply_edit(&plan)?;
            ledger.record(&reference.path, reference.row, reference.col, plan.delta());
            written.insert(plan.path);
        }

        for reference in &tag.interface_refs {
            let source = SourceFile::load(&reference.path)?;
            let conversion = read_reference_tag(&source, reference.row, &tag.interface.name)?;
            let shift = ledger.shift(&reference.path, reference.row, reference.col);
            let plan = planner.plan_reference(&source, reference, conversion, shift)?;
            apply_edit(&plan)?;
            ledger.record(&reference.path, reference.row, reference.col, plan.delta());
            written.insert(plan.path);
        }
        Ok(written.into_iter().collect())
    }
}

fn snapshot<'a>(
    snapshots: &'a BTreeMap<PathBuf, SourceFile>,
    path: &Path,
) -> Result<&'a SourceFile, DevirtError> {
    snapshots
        .get(path)
        .ok_or_else(|| DevirtError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound)))
}
