/*!
# Edit applier

Byte-exact substitution of planned edits. Every write goes through
[`write_atomically`], so a file is either fully rewritten or untouched.

[`apply_edit`] handles a single plan against the current file content.
[`FileEdits`] collects all plans of one file computed against one snapshot;
they are checked for overlap and applied in descending offset order, so no
edit moves the span of another.
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::planner::EditPlan;
use crate::core::{write_atomically, DevirtError, SourceFile};

/// Returns `bytes` with `old_len` bytes at `offset` replaced by `new_text`.
///
/// The span must lie inside `bytes`; callers check it with [`check_old_text`].
pub(crate) fn splice(bytes: &[u8], offset: usize, old_len: usize, new_text: &[u8]) -> Vec<u8> {
    debug_assert!(
        offset.checked_add(old_len).is_some_and(|end| end <= bytes.len()),
        "splice span {}+{} outside {} bytes",
        offset,
        old_len,
        bytes.len()
    );
    let mut out = Vec::with_capacity(bytes.len() - old_len + new_text.len());
    out.extend_from_slice(&bytes[..offset]);
    out.extend_from_slice(new_text);
    out.extend_from_slice(&bytes[offset + old_len..]);
    out
}

/// Fails unless the planned span of `bytes` holds `plan.old_text`.
fn check_old_text(path: &Path, bytes: &[u8], plan: &EditPlan) -> Result<(), DevirtError> {
    let end = plan.end().min(bytes.len());
    let start = plan.offset.min(end);
    if plan.end() <= bytes.len() && &bytes[start..end] == plan.old_text.as_bytes() {
        return Ok(());
    }
    Err(DevirtError::TextMismatch {
        path: path.to_path_buf(),
        row: plan.row,
        col: plan.col,
        expected: plan.old_text.clone(),
        found: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
    })
}

/// Applies one plan to the file on disk.
pub fn apply_edit(plan: &EditPlan) -> Result<(), DevirtError> {
    let source = SourceFile::load(&plan.path)?;
    check_old_text(&plan.path, source.bytes(), plan)?;
    let updated = splice(source.bytes(), plan.offset, plan.old_len(), plan.new_text.as_bytes());
    write_atomically(&plan.path, &updated)?;
    tracing::debug!(
        "{}:{}:{}: `{}` -> `{}`",
        plan.path.display(),
        plan.row,
        plan.col,
        plan.old_text,
        plan.new_text
    );
    Ok(())
}

/// Edits of one file, all computed against the same snapshot
#[derive(Debug, Clone)]
pub struct FileEdits {
    path: PathBuf,
    edits: Vec<EditPlan>,
}

impl FileEdits {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            edits: Vec::new(),
        }
    }

    pub fn push(&mut self, plan: EditPlan) {
        self.edits.push(plan);
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// Sorts by offset, collapses exact duplicates and rejects overlaps.
    pub fn validate(&mut self) -> Result<(), DevirtError> {
        self.edits
            .sort_by(|a, b| (a.offset, a.end()).cmp(&(b.offset, b.end())));
        self.edits.dedup_by(|b, a| {
            a.offset == b.offset && a.old_text == b.old_text && a.new_text == b.new_text
        });

        for pair in self.edits.windows(2) {
            let (first, second) = (&pair[0], &pair[1]);
            if second.offset < first.end() {
                return Err(DevirtError::OverlappingEdits {
                    path: self.path.clone(),
                    first_start: first.offset,
                    first_end: first.end(),
                    second_start: second.offset,
                    second_end: second.end(),
                });
            }
        }
        Ok(())
    }

    /// Applies validated edits to `bytes`, last span first.
    pub fn apply_to(&self, bytes: &[u8]) -> Result<Vec<u8>, DevirtError> {
        for plan in &self.edits {
            check_old_text(&self.path, bytes, plan)?;
        }
        let mut out = bytes.to_vec();
        for plan in self.edits.iter().rev() {
            out = splice(&out, plan.offset, plan.old_len(), plan.new_text.as_bytes());
        }
        Ok(out)
    }
}

/// Every edit of one tag, grouped by file
#[derive(Debug, Default)]
pub struct EditBatch {
    files: BTreeMap<PathBuf, FileEdits>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, plan: EditPlan) {
        self.files
            .entry(plan.path.clone())
            .or_insert_with(|| FileEdits::new(&plan.path))
            .push(plan);
    }

    /// Validates and applies every file against `snapshots`, then writes.
    ///
    /// Nothing is written unless every file validated. Returns the files
    /// written, in path order.
    pub fn commit(
        mut self,
        snapshots: &BTreeMap<PathBuf, SourceFile>,
    ) -> Result<Vec<PathBuf>, DevirtError> {
        let mut updated = Vec::with_capacity(self.files.len());
        for (path, edits) in self.files.iter_mut() {
            edits.validate()?;
            let snapshot = match snapshots.get(path) {
                Some(snapshot) => snapshot.bytes().to_vec(),
                None => SourceFile::load(path)?.into_bytes(),
            };
            updated.push((path.clone(), edits.apply_to(&snapshot)?, edits.edit_count()));
        }

        let mut written = Vec::with_capacity(updated.len());
        for (path, bytes, count) in updated {
            write_atomically(&path, &bytes)?;
            tracing::debug!("applied {} edits to {}", count, path.display());
            written.push(path);
        }
        Ok(written)
    }
}
