//! Attribute and volume registries derived from a program.
//!
//! Every `@name` access in the tree becomes one [`RegistryEntry`],
//! deduplicated by name, typed by its first use and marked writable if any
//! use is an assignment target. Entry indices follow first-seen order and
//! are the slot numbers baked into generated code and used at bind time.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{walk, Node, NodeId, Tree, Visitor, Walk};
use crate::diagnostic::{Diagnostic, DiagnosticSink, ErrorKind, SourceMap};
use crate::types::Ty;

/// Execution target of a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Runs once per point; `@name` is a point attribute.
    Points,
    /// Runs once per active voxel; `@name` is a grid.
    Volumes,
}

impl TargetKind {
    /// What a registry entry is called for this target.
    pub fn entry_kind(self) -> &'static str {
        match self {
            TargetKind::Points => "attribute",
            TargetKind::Volumes => "volume",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Points => f.write_str("points"),
            TargetKind::Volumes => f.write_str("volumes"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub ty: Ty,
    pub writable: bool,
    /// Slot number, in first-seen order.
    pub index: usize,
}

/// Deduplicated `(name, type, writable)` entries of one program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    target: TargetKind,
    entries: IndexMap<String, RegistryEntry>,
}

/// Registry of a point program.
pub type AttributeRegistry = Registry;
/// Registry of a volume program.
pub type VolumeRegistry = Registry;

impl Registry {
    pub fn new(target: TargetKind) -> Self {
        Self {
            target,
            entries: IndexMap::new(),
        }
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn by_index(&self, index: usize) -> Option<&RegistryEntry> {
        self.entries.get_index(index).map(|(_, e)| e)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn writable(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values().filter(|e| e.writable)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one use of `name`. Returns the first-seen type when it differs
    /// from `ty`; writability is promoted either way.
    pub fn register(&mut self, name: &str, ty: Ty, writable: bool) -> Result<usize, Ty> {
        let next = self.entries.len();
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| RegistryEntry {
                name: name.to_string(),
                ty,
                writable: false,
                index: next,
            });
        entry.writable |= writable;
        if entry.ty != ty {
            return Err(entry.ty);
        }
        Ok(entry.index)
    }

    /// Scan `tree` for attribute accesses.
    ///
    /// A name used with two different types is a type conflict; volume
    /// programs additionally reject string grids.
    pub fn build(
        tree: &Tree,
        target: TargetKind,
        source_map: &SourceMap,
        sink: &mut DiagnosticSink,
    ) -> Registry {
        let mut scan = Scan {
            registry: Registry::new(target),
            written: HashSet::new(),
            source_map,
            sink,
        };
        walk(&mut scan, tree, tree.root());
        let registry = scan.registry;
        debug!(
            target = %target,
            entries = registry.len(),
            writable = registry.writable().count(),
            "registry built"
        );
        registry
    }
}

struct Scan<'a> {
    registry: Registry,
    /// Attribute nodes that are assignment targets.
    written: HashSet<NodeId>,
    source_map: &'a SourceMap,
    sink: &'a mut DiagnosticSink,
}

impl Scan<'_> {
    /// Mark the attribute at the root of an lvalue chain as written.
    fn mark_written(&mut self, tree: &Tree, mut target: NodeId) {
        loop {
            match tree.get(target) {
                Some(Node::ArrayUnpack { array, .. }) => target = *array,
                Some(Node::Attribute { .. }) => {
                    self.written.insert(target);
                    return;
                }
                _ => return,
            }
        }
    }
}

impl Visitor for Scan<'_> {
    fn visit_assign(&mut self, tree: &Tree, id: NodeId) -> Walk {
        if let Some(Node::Assign { target, .. }) = tree.get(id) {
            self.mark_written(tree, *target);
        }
        Walk::Continue
    }

    fn visit_crement(&mut self, tree: &Tree, id: NodeId) -> Walk {
        if let Some(Node::Crement { target, .. }) = tree.get(id) {
            self.mark_written(tree, *target);
        }
        Walk::Continue
    }

    fn visit_attribute(&mut self, tree: &Tree, id: NodeId) -> Walk {
        let Some(Node::Attribute {
            name,
            ty,
            inferred,
            writable: hint,
        }) = tree.get(id)
        else {
            return Walk::Continue;
        };
        let span = self.source_map.lookup(tree, id);
        let target = self.registry.target();
        if target == TargetKind::Volumes && !ty.is_numeric() {
            self.sink.push(Diagnostic::error(
                ErrorKind::Semantic,
                format!("volume '@{}' cannot hold {}", name, ty),
                span,
            ));
            return Walk::Continue;
        }
        let writable = *hint || self.written.contains(&id);
        if let Err(first) = self.registry.register(name, *ty, writable) {
            let mut diag = Diagnostic::error(
                ErrorKind::TypeConflict,
                format!(
                    "{} '@{}' is used as {} but was first used as {}",
                    target.entry_kind(),
                    name,
                    ty,
                    first
                ),
                span,
            );
            if *inferred {
                diag = diag.with_note(format!("'@{}' without a type prefix is float", name));
            }
            self.sink.push(
                diag.with_help(format!("use one type for every access to '@{}'", name)),
            );
        }
        Walk::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Literal};

    fn build(tree: &Tree, target: TargetKind) -> (Registry, Vec<Diagnostic>) {
        let mut sink = DiagnosticSink::new(None, false);
        let registry = Registry::build(tree, target, &SourceMap::new(tree), &mut sink);
        (registry, sink.into_diagnostics())
    }

    fn entry(name: &str, ty: Ty, writable: bool, index: usize) -> RegistryEntry {
        RegistryEntry {
            name: name.to_string(),
            ty,
            writable,
            index,
        }
    }

    /// `@a = @b + 1;`
    fn assign_sum() -> Tree {
        let mut tree = Tree::new();
        let a = tree.attribute_inferred("a");
        let b = tree.attribute_inferred("b");
        let one = tree.value(Literal::Int32(1));
        let sum = tree.binary(BinaryOp::Add, b, one);
        let assign = tree.assign(a, sum);
        tree.append(assign);
        tree
    }

    #[test]
    fn test_assign_marks_target_writable() {
        let (registry, diags) = build(&assign_sum(), TargetKind::Points);
        assert!(diags.is_empty());
        let entries: Vec<_> = registry.entries().cloned().collect();
        assert_eq!(
            entries,
            vec![entry("a", Ty::FLOAT, true, 0), entry("b", Ty::FLOAT, false, 1)]
        );
    }

    #[test]
    fn test_read_then_write_merges_into_one_writable_entry() {
        let mut tree = Tree::new();
        let read = tree.attribute("a", Ty::FLOAT);
        let x = tree.declare(Ty::FLOAT, "x", Some(read));
        tree.append(x);
        let target = tree.attribute("a", Ty::FLOAT);
        let two = tree.value(Literal::Float(2.0));
        let assign = tree.assign(target, two);
        tree.append(assign);

        let (registry, diags) = build(&tree, TargetKind::Points);
        assert!(diags.is_empty());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a"), Some(&entry("a", Ty::FLOAT, true, 0)));
    }

    #[test]
    fn test_identical_redeclaration_is_idempotent() {
        let mut tree = Tree::new();
        for _ in 0..2 {
            let a = tree.attribute("a", Ty::INT32);
            let two = tree.value(Literal::Int32(2));
            let assign = tree.assign(a, two);
            tree.append(assign);
        }
        let (registry, diags) = build(&tree, TargetKind::Points);
        assert!(diags.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_types_are_reported() {
        let mut tree = Tree::new();
        let a = tree.attribute("a", Ty::INT32);
        let two = tree.value(Literal::Int32(2));
        let assign = tree.assign(a, two);
        tree.append(assign);
        let a = tree.attribute("a", Ty::FLOAT);
        let two = tree.value(Literal::Float(2.0));
        let assign = tree.assign(a, two);
        tree.append(assign);

        let (registry, diags) = build(&tree, TargetKind::Points);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, ErrorKind::TypeConflict);
        assert!(diags[0].message.contains("used as float"));
        assert_eq!(registry.get("a").map(|e| e.ty), Some(Ty::INT32));
    }

    #[test]
    fn test_component_write_marks_vector_writable() {
        let mut tree = Tree::new();
        let p = tree.attribute("P", Ty::VEC3F);
        let zero = tree.value(Literal::Int32(0));
        let component = tree.unpack(p, zero);
        let one = tree.value(Literal::Float(1.0));
        let assign = tree.compound_assign(BinaryOp::Add, component, one);
        tree.append(assign);

        let (registry, _) = build(&tree, TargetKind::Points);
        assert_eq!(registry.get("P"), Some(&entry("P", Ty::VEC3F, true, 0)));
    }

    #[test]
    fn test_write_hint_marks_a_read_writable() {
        let mut tree = Tree::new();
        let hinted = tree.writable_attribute("mask", Ty::INT32);
        tree.append(hinted);
        let plain = tree.attribute("mask", Ty::INT32);
        tree.append(plain);
        let (registry, diags) = build(&tree, TargetKind::Points);
        assert!(diags.is_empty());
        assert_eq!(registry.get("mask"), Some(&entry("mask", Ty::INT32, true, 0)));
    }

    #[test]
    fn test_volume_rejects_string_grids() {
        let mut tree = Tree::new();
        let s = tree.attribute("name", Ty::Str);
        tree.append(s);
        let (registry, diags) = build(&tree, TargetKind::Volumes);
        assert!(registry.is_empty());
        assert_eq!(diags[0].kind, ErrorKind::Semantic);
    }

    #[test]
    fn test_registry_round_trips_through_json() {
        let (registry, _) = build(&assign_sum(), TargetKind::Volumes);
        let json = serde_json::to_string(&registry).unwrap();
        let back: Registry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, registry);
        assert_eq!(back.by_index(1).map(|e| e.name.as_str()), Some("b"));
    }
}
