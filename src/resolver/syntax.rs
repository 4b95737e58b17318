/*!
# Syntax resolver

In-process [`Resolver`] built on tree-sitter syntax trees of the Go sources.

The project is parsed again for every query, so answers always reflect the
tree as it is on disk, including rewrites of earlier tags. Test files are
never indexed.

Package identity is the directory: a type declared in `lib/` is referenced
by its bare name from files in `lib/` and as `lib.Name` everywhere else.
An implementation is a non-interface type whose methods, with value or
pointer receivers, cover the method names of the interface.
*/

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tree_sitter::{Language, Node, Parser, Tree};
use walkdir::WalkDir;

use super::{single_implementation, ResolveError, Resolver};
use crate::core::{is_test_file, normalize_references, Implementation, Reference, SourceLocation};

/// Type declared by a `type_spec`
#[derive(Debug, Clone)]
struct TypeDecl {
    name: String,
    row: usize,
    col: usize,
    /// `None` for concrete types
    interface: Option<InterfaceShape>,
}

#[derive(Debug, Clone, Default)]
struct InterfaceShape {
    methods: Vec<String>,
    embedded: Vec<String>,
}

/// Occurrence of a type name outside its declaration
#[derive(Debug, Clone)]
struct TypeUse {
    /// Qualifier of `pkg.Name`, `None` for a bare name
    package: Option<String>,
    name: String,
    row: usize,
    col: usize,
}

/// What one source file declares and uses
#[derive(Debug, Default)]
struct FileFacts {
    path: PathBuf,
    types: Vec<TypeDecl>,
    /// `(receiver type, method name)`
    methods: Vec<(String, String)>,
    uses: Vec<TypeUse>,
}

impl FileFacts {
    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// Facts of every non-test source file under the root
#[derive(Debug, Default)]
struct ProjectIndex {
    files: Vec<FileFacts>,
}

/// A declaration located in the index
struct Symbol<'a> {
    dir: &'a Path,
    path: &'a Path,
    decl: &'a TypeDecl,
}

impl ProjectIndex {
    fn decls(&self) -> impl Iterator<Item = Symbol<'_>> {
        self.files.iter().flat_map(|file| {
            file.types.iter().map(move |decl| Symbol {
                dir: file.dir(),
                path: &file.path,
                decl,
            })
        })
    }

    /// Declaration at `location`, or declaration of the type used there.
    fn symbol_at(&self, location: &SourceLocation) -> Option<Symbol<'_>> {
        let file = self.files.iter().find(|f| f.path == location.path)?;
        let covers = |row: usize, col: usize, name: &str| {
            row == location.row && col <= location.col && location.col < col + name.len()
        };

        if let Some(decl) = file.types.iter().find(|d| covers(d.row, d.col, &d.name)) {
            return Some(Symbol {
                dir: file.dir(),
                path: &file.path,
                decl,
            });
        }

        let used = file.uses.iter().find(|u| covers(u.row, u.col, &u.name))?;
        let mut matches = self.decls().filter(|sym| {
            sym.decl.name == used.name
                && match &used.package {
                    None => sym.dir == file.dir(),
                    Some(pkg) => sym.dir != file.dir() && dir_name(sym.dir) == *pkg,
                }
        });
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Method names declared on each `(dir, type)`.
    fn method_sets(&self) -> HashMap<(&Path, &str), HashSet<&str>> {
        let mut sets: HashMap<(&Path, &str), HashSet<&str>> = HashMap::new();
        for file in &self.files {
            for (receiver, method) in &file.methods {
                sets.entry((file.dir(), receiver.as_str()))
                    .or_default()
                    .insert(method.as_str());
            }
        }
        sets
    }

    /// Methods of the interface `name` in `dir`, including embedded
    /// interfaces of the same package.
    fn required_methods<'a>(&'a self, dir: &Path, name: &str) -> HashSet<&'a str> {
        let mut required = HashSet::new();
        let mut seen = HashSet::new();
        let mut pending = vec![name.to_string()];

        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let shape = self
                .decls()
                .find(|sym| sym.dir == dir && sym.decl.name == current)
                .and_then(|sym| sym.decl.interface.as_ref());
            if let Some(shape) = shape {
                required.extend(shape.methods.iter().map(String::as_str));
                pending.extend(shape.embedded.iter().cloned());
            }
        }
        required
    }
}

/// Resolver working on tree-sitter-go syntax trees
#[derive(Debug, Clone)]
pub struct SyntaxResolver {
    root: PathBuf,
    extension: String,
}

impl SyntaxResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    fn index(&self) -> Result<ProjectIndex, ResolveError> {
        let mut parser = Parser::new();
        let language: Language = tree_sitter_go::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| ResolveError::Grammar(e.to_string()))?;

        let mut index = ProjectIndex::default();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| ResolveError::Io {
                path: e.path().unwrap_or(self.root.as_path()).to_path_buf(),
                source: e.into(),
            })?;
            let path = entry.path();
            let is_source = entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
                && !is_test_file(path);
            if !is_source {
                continue;
            }

            let source = std::fs::read(path).map_err(|source| ResolveError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let tree = parser.parse(&source, None).ok_or_else(|| ResolveError::Parse {
                path: path.to_path_buf(),
            })?;
            if tree.root_node().has_error() {
                tracing::warn!("syntax errors in {}, results may be incomplete", path.display());
            }
            index.files.push(collect_facts(path, &source, &tree));
        }
        tracing::debug!("indexed {} source files under {}", index.files.len(), self.root.display());
        Ok(index)
    }
}

impl Resolver for SyntaxResolver {
    fn find_implementation(&self, location: &SourceLocation) -> Result<Implementation, ResolveError> {
        let index = self.index()?;
        let symbol = index
            .symbol_at(location)
            .ok_or_else(|| ResolveError::SymbolNotFound(location.clone()))?;
        if symbol.decl.interface.is_none() {
            return Err(ResolveError::NotAnInterface {
                symbol: symbol.decl.name.clone(),
                location: location.clone(),
            });
        }

        let required = index.required_methods(symbol.dir, &symbol.decl.name);
        // unexported methods can only be implemented inside the package
        let package_only = required.iter().any(|m| !is_exported(m));
        let method_sets = index.method_sets();
        let empty = HashSet::new();

        let candidates = index
            .decls()
            .filter(|sym| sym.decl.interface.is_none())
            .filter(|sym| !package_only || sym.dir == symbol.dir)
            .filter(|sym| {
                let methods = method_sets
                    .get(&(sym.dir, sym.decl.name.as_str()))
                    .unwrap_or(&empty);
                required.iter().all(|m| methods.contains(m))
            })
            .map(|sym| Implementation {
                path: sym.path.to_path_buf(),
                name: sym.decl.name.clone(),
                row: sym.decl.row,
                col: sym.decl.col,
            })
            .collect();

        single_implementation(&symbol.decl.name, location, candidates)
    }

    fn find_references(&self, location: &SourceLocation) -> Result<Vec<Reference>, ResolveError> {
        let index = self.index()?;
        let symbol = index
            .symbol_at(location)
            .ok_or_else(|| ResolveError::SymbolNotFound(location.clone()))?;
        let package = dir_name(symbol.dir);

        let mut references = Vec::new();
        for file in &index.files {
            let local = file.dir() == symbol.dir;
            for used in file.uses.iter().filter(|u| u.name == symbol.decl.name) {
                let matches = match &used.package {
                    None => local,
                    Some(qualifier) => !local && *qualifier == package,
                };
                if matches {
                    references.push(Reference::new(&file.path, used.row, used.col));
                }
            }
        }
        normalize_references(&mut references);
        Ok(references)
    }
}

/// Package name implied by a directory
fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_exported(name: &str) -> bool {
    name.chars().next().map_or(false, char::is_uppercase)
}

fn collect_facts(path: &Path, source: &[u8], tree: &Tree) -> FileFacts {
    let mut facts = FileFacts {
        path: path.to_path_buf(),
        ..FileFacts::default()
    };

    visit(tree.root_node(), &mut |node| match node.kind() {
        "type_spec" => {
            let Some(name) = node.child_by_field_name("name") else {
                return;
            };
            let interface = node
                .child_by_field_name("type")
                .filter(|ty| ty.kind() == "interface_type")
                .map(|ty| interface_shape(ty, source));
            let (row, col) = start(name);
            facts.types.push(TypeDecl {
                name: text(name, source).to_string(),
                row,
                col,
                interface,
            });
        }
        "method_declaration" => {
            let receiver = receiver_type(node, source);
            let method = node.child_by_field_name("name").map(|n| text(n, source));
            if let (Some(receiver), Some(method)) = (receiver, method) {
                facts.methods.push((receiver.to_string(), method.to_string()));
            }
        }
        "qualified_type" => {
            let package = node.child_by_field_name("package");
            let name = node.child_by_field_name("name");
            if let (Some(package), Some(name)) = (package, name) {
                let (row, col) = start(name);
                facts.uses.push(TypeUse {
                    package: Some(text(package, source).to_string()),
                    name: text(name, source).to_string(),
                    row,
                    col,
                });
            }
        }
        "call_expression" => {
            if let Some(used) = node
                .child_by_field_name("function")
                .and_then(|callee| conversion_type(callee, source))
            {
                facts.uses.push(used);
            }
        }
        "type_identifier" => {
            if is_declared_name(node) || node.parent().map_or(false, |p| p.kind() == "qualified_type") {
                return;
            }
            let (row, col) = start(node);
            facts.uses.push(TypeUse {
                package: None,
                name: text(node, source).to_string(),
                row,
                col,
            });
        }
        _ => {}
    });
    facts
}

/// Type named by the callee of a conversion-shaped call.
///
/// `adder(x)` and `(*adder)(nil)` parse as expressions, `lib.Summer(x)` as a
/// selector; ordinary calls yield names that never match a type.
fn conversion_type(callee: Node<'_>, source: &[u8]) -> Option<TypeUse> {
    let mut node = callee;
    loop {
        node = match node.kind() {
            "parenthesized_expression" => first_named_child(node)?,
            "unary_expression" => {
                let deref = node
                    .child_by_field_name("operator")
                    .map_or(false, |op| text(op, source) == "*");
                if !deref {
                    return None;
                }
                node.child_by_field_name("operand")?
            }
            _ => break,
        };
    }

    match node.kind() {
        "identifier" => {
            let (row, col) = start(node);
            Some(TypeUse {
                package: None,
                name: text(node, source).to_string(),
                row,
                col,
            })
        }
        "selector_expression" => {
            let package = node
                .child_by_field_name("operand")
                .filter(|operand| operand.kind() == "identifier")?;
            let field = node.child_by_field_name("field")?;
            let (row, col) = start(field);
            Some(TypeUse {
                package: Some(text(package, source).to_string()),
                name: text(field, source).to_string(),
                row,
                col,
            })
        }
        _ => None,
    }
}

/// Whether `node` is the name a `type_spec` or alias declares.
fn is_declared_name(node: Node<'_>) -> bool {
    node.parent()
        .filter(|p| matches!(p.kind(), "type_spec" | "type_alias"))
        .and_then(|p| p.child_by_field_name("name"))
        .map_or(false, |name| name.id() == node.id())
}

fn interface_shape(interface: Node<'_>, source: &[u8]) -> InterfaceShape {
    let mut shape = InterfaceShape::default();
    let mut cursor = interface.walk();
    for child in interface.named_children(&mut cursor) {
        match child.kind() {
            "method_elem" | "method_spec" => {
                if let Some(name) = child.child_by_field_name("name") {
                    shape.methods.push(text(name, source).to_string());
                }
            }
            "type_elem" | "constraint_elem" => {
                let mut inner = child.walk();
                for ty in child.named_children(&mut inner) {
                    if ty.kind() == "type_identifier" {
                        shape.embedded.push(text(ty, source).to_string());
                    }
                }
            }
            "type_identifier" | "interface_type_name" => {
                shape.embedded.push(text(child, source).to_string());
            }
            _ => {}
        }
    }
    shape
}

/// `func (a *adder[T]) ...` -> `adder`
fn receiver_type<'s>(method: Node<'_>, source: &'s [u8]) -> Option<&'s str> {
    let params = method.child_by_field_name("receiver")?;
    let mut cursor = params.walk();
    let param = params
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;

    let mut ty = param.child_by_field_name("type")?;
    if ty.kind() == "pointer_type" {
        ty = first_named_child(ty)?;
    }
    if ty.kind() == "generic_type" {
        ty = ty.child_by_field_name("type")?;
    }
    (ty.kind() == "type_identifier").then(|| text(ty, source))
}

fn first_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).next();
    first
}

fn text<'s>(node: Node<'_>, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// 1-based row and byte column of the node start
fn start(node: Node<'_>) -> (usize, usize) {
    let point = node.start_position();
    (point.row + 1, point.column + 1)
}

/// Depth-first pre-order visit of every named node.
fn visit<'t>(root: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_named() {
            f(node);
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}
