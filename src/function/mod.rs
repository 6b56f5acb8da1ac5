//! Function library and overload resolution.
//!
//! A [`FunctionGroup`] is a named, ordered list of overloads. Each overload
//! is either a native Rust function invoked through a pointer or a
//! generator that emits IR inline at the call site. Resolution picks the
//! first overload of the best [`MatchTier`]; registration order breaks
//! ties and is therefore part of the library's contract.

mod builtins;
mod emitted;
mod native;
#[cfg(test)]
mod tests;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::ir::{IrBuilder, Operand};
use crate::runtime::{CustomData, Value};
use crate::types::Ty;

/// Native entry point. Arguments arrive converted to the declared
/// parameter types.
pub type NativeFn = fn(&[Value]) -> Value;

/// Inline generator. Returns the result operand, `None` for void.
pub type EmitFn = fn(&mut FunctionEmitter<'_>, &[Operand]) -> Option<Operand>;

#[derive(Clone, Copy)]
pub enum FunctionImpl {
    Native(NativeFn),
    Emitted(EmitFn),
}

impl fmt::Debug for FunctionImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionImpl::Native(_) => f.write_str("Native"),
            FunctionImpl::Emitted(_) => f.write_str("Emitted"),
        }
    }
}

// ─── Signatures ────────────────────────────────────────────────────

/// Parameter types, return type and per-parameter read-only flags.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub ret: Ty,
    /// The final parameter type also accepts any number of extra arguments.
    pub variadic: bool,
    pub readonly: Vec<bool>,
}

impl Signature {
    pub fn new(params: Vec<Ty>, ret: Ty) -> Self {
        let readonly = vec![false; params.len()];
        Self {
            params,
            ret,
            variadic: false,
            readonly,
        }
    }

    /// Mark every parameter read-only.
    pub fn readonly(mut self) -> Self {
        self.readonly = vec![true; self.params.len()];
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Whether `count` arguments fit this signature.
    pub fn accepts_count(&self, count: usize) -> bool {
        if self.variadic {
            count >= self.params.len()
        } else {
            count == self.params.len()
        }
    }

    /// Type and read-only flag of the parameter receiving argument `index`.
    pub fn param(&self, index: usize) -> Option<(Ty, bool)> {
        let slot = match self.params.len() {
            0 => return None,
            n if self.variadic && index >= n => n - 1,
            _ => index,
        };
        Some((*self.params.get(slot)?, self.readonly.get(slot).copied().unwrap_or(false)))
    }

    fn matches(&self, args: &[Ty], tier: MatchTier) -> bool {
        self.accepts_count(args.len())
            && args.iter().enumerate().all(|(i, arg)| match self.param(i) {
                Some((param, readonly)) => match tier {
                    MatchTier::Explicit => *arg == param,
                    _ => arg.converts_to_parameter(&param, readonly),
                },
                None => false,
            })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        if self.variadic {
            write!(f, "...")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    pub signature: Signature,
    pub implementation: FunctionImpl,
}

/// Outcome class of overload resolution, best first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchTier {
    /// Argument types equal the parameter types.
    Explicit,
    /// Every argument converts implicitly.
    Implicit,
    /// Only the argument count matches.
    Size,
    /// No overload takes this many arguments.
    None,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchTier::Explicit => "explicit",
            MatchTier::Implicit => "implicit",
            MatchTier::Size => "size",
            MatchTier::None => "none",
        };
        f.write_str(s)
    }
}

/// A successful resolution.
#[derive(Clone, Copy, Debug)]
pub struct Resolution<'a> {
    pub function: &'a Function,
    pub tier: MatchTier,
    /// Registration index of the chosen overload.
    pub index: usize,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}", describe_resolution(.name, .args, .tier))]
pub struct ResolutionError {
    pub name: String,
    pub args: Vec<Ty>,
    /// [`MatchTier::Size`] or [`MatchTier::None`].
    pub tier: MatchTier,
    pub candidates: Vec<Signature>,
}

fn describe_resolution(name: &str, args: &[Ty], tier: &MatchTier) -> String {
    let list = args
        .iter()
        .map(Ty::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match tier {
        MatchTier::Size => format!("invalid argument types for {}({})", name, list),
        _ => format!(
            "no overload of '{}' takes {} argument(s): {}({})",
            name,
            args.len(),
            name,
            list
        ),
    }
}

/// An inline generator produced an invalid result.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("built-in {name}{signature} produced no value")]
    NoValue { name: String, signature: Signature },

    #[error("built-in {name}{signature} produced {found}, declared {expected}")]
    TypeMismatch {
        name: String,
        signature: Signature,
        expected: Ty,
        found: Ty,
    },
}

// ─── Groups ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct FunctionGroup {
    name: String,
    functions: Vec<Function>,
    volume_only: bool,
    doc: &'static str,
}

impl FunctionGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: Vec::new(),
            volume_only: false,
            doc: "",
        }
    }

    pub fn native(mut self, params: Vec<Ty>, ret: Ty, func: NativeFn) -> Self {
        self.push(Signature::new(params, ret), FunctionImpl::Native(func));
        self
    }

    pub fn emitted(mut self, signature: Signature, func: EmitFn) -> Self {
        self.push(signature, FunctionImpl::Emitted(func));
        self
    }

    pub fn push(&mut self, signature: Signature, implementation: FunctionImpl) {
        self.functions.push(Function {
            signature,
            implementation,
        });
    }

    /// Restrict the group to volume programs.
    pub fn volume_only(mut self) -> Self {
        self.volume_only = true;
        self
    }

    pub fn with_doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &'static str {
        self.doc
    }

    pub fn is_volume_only(&self) -> bool {
        self.volume_only
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.functions.iter().map(|f| &f.signature)
    }

    /// Match `args` against the overloads, Explicit before Implicit, first
    /// registered first.
    pub fn resolve(&self, args: &[Ty]) -> Result<Resolution<'_>, ResolutionError> {
        for tier in [MatchTier::Explicit, MatchTier::Implicit] {
            if let Some((index, function)) = self
                .functions
                .iter()
                .enumerate()
                .find(|(_, f)| f.signature.matches(args, tier))
            {
                trace!(name = %self.name, %tier, index, "call resolved");
                return Ok(Resolution {
                    function,
                    tier,
                    index,
                });
            }
        }
        let sized = self
            .functions
            .iter()
            .any(|f| f.signature.accepts_count(args.len()));
        let tier = if sized { MatchTier::Size } else { MatchTier::None };
        trace!(name = %self.name, %tier, "call unresolved");
        Err(ResolutionError {
            name: self.name.clone(),
            args: args.to_vec(),
            tier,
            candidates: self.signatures().cloned().collect(),
        })
    }
}

// ─── Registry ──────────────────────────────────────────────────────

/// Named function groups. Immutable once shared.
#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    groups: IndexMap<String, FunctionGroup>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard library, built once per process.
    pub fn standard() -> Arc<FunctionRegistry> {
        static STANDARD: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Arc::new(builtins::standard_library()))
            .clone()
    }

    /// Add a group, replacing any group of the same name.
    pub fn insert(&mut self, group: FunctionGroup) {
        self.groups.insert(group.name.clone(), group);
    }

    pub fn with(mut self, group: FunctionGroup) -> Self {
        self.insert(group);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FunctionGroup> {
        self.groups.get(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &FunctionGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve a call by name. Unknown names resolve to [`MatchTier::None`]
    /// with no candidates.
    pub fn resolve(&self, name: &str, args: &[Ty]) -> Result<Resolution<'_>, ResolutionError> {
        match self.groups.get(name) {
            Some(group) => group.resolve(args),
            None => Err(ResolutionError {
                name: name.to_string(),
                args: args.to_vec(),
                tier: MatchTier::None,
                candidates: Vec::new(),
            }),
        }
    }
}

// ─── Emission ──────────────────────────────────────────────────────

/// Handed to inline generators: the IR builder of the function being
/// generated plus the host's custom data.
pub struct FunctionEmitter<'a> {
    builder: &'a mut IrBuilder,
    custom_data: &'a CustomData,
}

impl<'a> FunctionEmitter<'a> {
    pub fn new(builder: &'a mut IrBuilder, custom_data: &'a CustomData) -> Self {
        Self {
            builder,
            custom_data,
        }
    }

    pub fn custom_data(&self) -> &CustomData {
        self.custom_data
    }
}

impl Deref for FunctionEmitter<'_> {
    type Target = IrBuilder;

    fn deref(&self) -> &IrBuilder {
        self.builder
    }
}

impl DerefMut for FunctionEmitter<'_> {
    fn deref_mut(&mut self) -> &mut IrBuilder {
        self.builder
    }
}
