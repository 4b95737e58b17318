/*!
# Substitution planner

Computes, for one reference, the byte span to replace and the text that
replaces it.

An interface reference becomes `[*][pkg.]<prefix><Impl>`:

- `*` when the reference tag says `p`
- `pkg.` (the implementation's directory name) when the reference lives in
  another package than the implementation
- the implementation name behind the export prefix, so the type is visible
  from other packages even when it was unexported

When the reference lives in another package than the interface, the text
being replaced is the qualified `ifacepkg.Name` and the span starts at the
qualifier, `1 + len(ifacepkg)` bytes left of the reported column.
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::{
    package_name, same_package, DevirtError, Implementation, PositionError, Reference, SourceFile,
    TaggedInterface,
};
use crate::tags::Conversion;

/// How an interface reference was qualified when it was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qualifier {
    pub pointer: bool,
    pub same_package_as_interface: bool,
    pub same_package_as_implementation: bool,
}

/// One planned substitution: replace `old_text` at `offset` with `new_text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    pub path: PathBuf,
    /// Row and column the span was computed from, for diagnostics
    pub row: usize,
    pub col: usize,
    pub offset: usize,
    pub old_text: String,
    pub new_text: String,
    /// `None` for implementation renames
    pub qualifier: Option<Qualifier>,
}

impl EditPlan {
    pub fn old_len(&self) -> usize {
        self.old_text.len()
    }

    pub fn end(&self) -> usize {
        self.offset + self.old_text.len()
    }

    /// Byte length change caused by the substitution
    pub fn delta(&self) -> isize {
        self.new_text.len() as isize - self.old_text.len() as isize
    }
}

/// Plans the substitutions of one tagged interface
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionPlanner<'a> {
    interface: &'a TaggedInterface,
    implementation: &'a Implementation,
    export_prefix: &'a str,
}

impl<'a> SubstitutionPlanner<'a> {
    pub fn new(
        interface: &'a TaggedInterface,
        implementation: &'a Implementation,
        export_prefix: &'a str,
    ) -> Self {
        Self {
            interface,
            implementation,
            export_prefix,
        }
    }

    /// `NoIFGoadder` for `adder`
    pub fn exported_name(&self) -> String {
        format!("{}{}", self.export_prefix, self.implementation.name)
    }

    /// Rewrites one occurrence of the implementation's own name.
    ///
    /// `col_shift` is the growth of earlier edits on the same row; pass 0
    /// when planning against an unedited snapshot.
    pub fn plan_rename(
        &self,
        source: &SourceFile,
        reference: &Reference,
        col_shift: isize,
    ) -> Result<EditPlan, DevirtError> {
        let col = shifted(source.path(), reference, col_shift)?;
        let offset = source.offset(reference.row, col)?;
        Ok(EditPlan {
            path: source.path().to_path_buf(),
            row: reference.row,
            col,
            offset,
            old_text: self.implementation.name.clone(),
            new_text: self.exported_name(),
            qualifier: None,
        })
    }

    /// Rewrites one reference to the interface name.
    pub fn plan_reference(
        &self,
        source: &SourceFile,
        reference: &Reference,
        conversion: Conversion,
        col_shift: isize,
    ) -> Result<EditPlan, DevirtError> {
        let qualifier = Qualifier {
            pointer: conversion == Conversion::Pointer,
            same_package_as_interface: same_package(&reference.path, &self.interface.path),
            same_package_as_implementation: same_package(&reference.path, &self.implementation.path),
        };

        let mut new_text = conversion.sigil().to_string();
        if !qualifier.same_package_as_implementation {
            new_text.push_str(&package_name(&self.implementation.path));
            new_text.push('.');
        }
        new_text.push_str(&self.exported_name());

        let col = shifted(source.path(), reference, col_shift)?;
        let mut offset = source.offset(reference.row, col)?;
        let old_text = if qualifier.same_package_as_interface {
            self.interface.name.clone()
        } else {
            let interface_package = package_name(&self.interface.path);
            let qualifier_len = interface_package.len() + 1;
            offset = offset.checked_sub(qualifier_len).ok_or_else(|| {
                DevirtError::position(
                    source.path(),
                    PositionError::ColumnOutOfRange {
                        row: reference.row,
                        col,
                        line_len: qualifier_len,
                    },
                )
            })?;
            format!("{}.{}", interface_package, self.interface.name)
        };

        Ok(EditPlan {
            path: source.path().to_path_buf(),
            row: reference.row,
            col,
            offset,
            old_text,
            new_text,
            qualifier: Some(qualifier),
        })
    }
}

fn shifted(path: &Path, reference: &Reference, col_shift: isize) -> Result<usize, DevirtError> {
    let col = reference.col as isize + col_shift;
    if col < 1 {
        return Err(DevirtError::position(
            path,
            PositionError::ColumnOutOfRange {
                row: reference.row,
                col: 0,
                line_len: 0,
            },
        ));
    }
    Ok(col as usize)
}

/// Byte growth of edits already applied, per `(file, row)`.
///
/// Entries are recorded at the column the resolver reported, before any
/// shift, so later lookups compare positions in the original line.
#[derive(Debug, Default)]
pub struct GrowthLedger {
    rows: HashMap<(PathBuf, usize), Vec<(usize, isize)>>,
}

impl GrowthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that an edit at original `col` changed the row by `delta` bytes.
    pub fn record(&mut self, path: &Path, row: usize, col: usize, delta: isize) {
        self.rows
            .entry((path.to_path_buf(), row))
            .or_default()
            .push((col, delta));
    }

    /// Sum of the deltas of recorded edits left of `col` on the same row.
    pub fn shift(&self, path: &Path, row: usize, col: usize) -> isize {
        self.rows
            .get(&(path.to_path_buf(), row))
            .map(|edits| {
                edits
                    .iter()
                    .filter(|(edit_col, _)| *edit_col < col)
                    .map(|(_, delta)| delta)
                    .sum()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> (TaggedInterface, Implementation) {
        (
            TaggedInterface {
                path: PathBuf::from("/app/lib/adder.go"),
                name: "Adder".into(),
                row: 4,
                col: 6,
            },
            Implementation {
                path: PathBuf::from("/app/lib/adder.go"),
                name: "adder".into(),
                row: 8,
                col: 6,
            },
        )
    }

    #[test]
    fn test_same_package_pointer() {
        let (iface, imp) = adder();
        let planner = SubstitutionPlanner::new(&iface, &imp, "NoIFGo");
        let src = SourceFile::from_bytes(
            "/app/lib/new.go",
            b"package lib\n\n//noifgo:{Adder,p}\nfunc New() Adder { return &adder{} }\n".to_vec(),
        );

        let plan = planner
            .plan_reference(&src, &Reference::new("/app/lib/new.go", 4, 12), Conversion::Pointer, 0)
            .unwrap();
        assert_eq!(plan.old_text, "Adder");
        assert_eq!(plan.new_text, "*NoIFGoadder");
        assert_eq!(&src.bytes()[plan.offset..plan.end()], b"Adder");
        assert_eq!(plan.delta(), 7);
        assert_eq!(
            plan.qualifier,
            Some(Qualifier {
                pointer: true,
                same_package_as_interface: true,
                same_package_as_implementation: true,
            })
        );
    }

    #[test]
    fn test_other_package_value() {
        let (iface, imp) = adder();
        let planner = SubstitutionPlanner::new(&iface, &imp, "NoIFGo");
        let src = SourceFile::from_bytes(
            "/app/main.go",
            b"package main\n\t//noifgo:{Adder,v}\n\tvar a lib.Adder\n".to_vec(),
        );

        let plan = planner
            .plan_reference(&src, &Reference::new("/app/main.go", 3, 12), Conversion::Value, 0)
            .unwrap();
        // span starts at the `lib.` qualifier
        assert_eq!(plan.old_text, "lib.Adder");
        assert_eq!(&src.bytes()[plan.offset..plan.end()], b"lib.Adder");
        assert_eq!(plan.new_text, "lib.NoIFGoadder");
    }

    #[test]
    fn test_implementation_in_third_package() {
        let (iface, _) = adder();
        let imp = Implementation {
            path: PathBuf::from("/app/impl/sum.go"),
            name: "Summer".into(),
            row: 3,
            col: 6,
        };
        let planner = SubstitutionPlanner::new(&iface, &imp, "NoIFGo");

        // reference inside the implementation's package needs no prefix
        let src = SourceFile::from_bytes("/app/impl/use.go", b"var s lib.Adder\n".to_vec());
        let plan = planner
            .plan_reference(&src, &Reference::new("/app/impl/use.go", 1, 11), Conversion::Pointer, 0)
            .unwrap();
        assert_eq!(plan.old_text, "lib.Adder");
        assert_eq!(plan.new_text, "*NoIFGoSummer");

        // reference inside the interface's package gets the impl package
        let src = SourceFile::from_bytes("/app/lib/use.go", b"var s Adder\n".to_vec());
        let plan = planner
            .plan_reference(&src, &Reference::new("/app/lib/use.go", 1, 7), Conversion::Value, 0)
            .unwrap();
        assert_eq!(plan.old_text, "Adder");
        assert_eq!(plan.new_text, "impl.NoIFGoSummer");
    }

    #[test]
    fn test_rename_plan() {
        let (iface, imp) = adder();
        let planner = SubstitutionPlanner::new(&iface, &imp, "NoIFGo");
        let src = SourceFile::from_bytes("/app/lib/adder.go", b"x\nx\nx\nx\nx\nx\nx\ntype adder struct{}\n".to_vec());
        let plan = planner.plan_rename(&src, &Reference::from(&imp), 0).unwrap();
        assert_eq!(&src.bytes()[plan.offset..plan.end()], b"adder");
        assert_eq!(plan.new_text, "NoIFGoadder");
        assert_eq!(plan.qualifier, None);
    }

    #[test]
    fn test_ledger_shifts_later_columns_on_same_row() {
        let mut ledger = GrowthLedger::new();
        let path = Path::new("a.go");
        ledger.record(path, 5, 10, 6);

        assert_eq!(30 + ledger.shift(path, 5, 30), 36);
        // earlier column and other rows are unaffected
        assert_eq!(ledger.shift(path, 5, 4), 0);
        assert_eq!(ledger.shift(path, 6, 30), 0);
        assert_eq!(ledger.shift(Path::new("b.go"), 5, 30), 0);

        ledger.record(path, 5, 30, 6);
        assert_eq!(ledger.shift(path, 5, 50), 12);
    }

    #[test]
    fn test_shifted_plan_lands_on_widened_line() {
        let (iface, imp) = adder();
        let planner = SubstitutionPlanner::new(&iface, &imp, "NoIFGo");
        // `func f(a Adder, b Adder)` after the first Adder became *NoIFGoadder
        let src = SourceFile::from_bytes(
            "/app/lib/f.go",
            b"func f(a *NoIFGoadder, b Adder) {}\n".to_vec(),
        );
        let second = Reference::new("/app/lib/f.go", 1, 19);
        let plan = planner
            .plan_reference(&src, &second, Conversion::Value, 7)
            .unwrap();
        assert_eq!(plan.col, 26);
        assert_eq!(&src.bytes()[plan.offset..plan.end()], b"Adder");
    }
}
