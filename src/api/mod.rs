//! Public entry points: compile a tree into an executable, then run it
//! against host data.
//!
//! Compilation walks a linear state machine (see [`Stage`]). Every stage
//! records into one [`DiagnosticSink`](crate::diagnostic::DiagnosticSink);
//! the first stage that ends with an error aborts the pipeline and the
//! caller gets the full diagnostic list. Warnings alone still yield an
//! executable, which keeps them for inspection.

mod executable;
mod pipeline;
#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use tracing::info;

pub use crate::ir::OptLevel;
pub use crate::registry::TargetKind;
pub use executable::{
    ExecuteOptions, ExecuteReport, Executable, Interrupt, PointExecutable, VolumeExecutable,
};

use crate::ast::Tree;
use crate::diagnostic::{Diagnostic, ErrorKind, SourceMap};
use crate::error::SyntaxError;
use crate::function::FunctionRegistry;
use crate::runtime::CustomData;

// ─── Configuration ─────────────────────────────────────────────────

/// Immutable compiler configuration.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub opt_level: OptLevel,
    /// Replaces the standard library when set.
    pub functions: Option<Arc<FunctionRegistry>>,
    pub custom_data: Arc<CustomData>,
    /// Errors recorded per compile; further errors are only counted.
    pub max_errors: Option<usize>,
    pub warnings_as_errors: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::default(),
            functions: None,
            custom_data: Arc::new(CustomData::new()),
            max_errors: Some(32),
            warnings_as_errors: false,
        }
    }
}

impl CompileOptions {
    pub fn with_opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    pub fn with_functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_custom_data(mut self, custom_data: CustomData) -> Self {
        self.custom_data = Arc::new(custom_data);
        self
    }

    pub fn with_max_errors(mut self, max_errors: Option<usize>) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    /// The function registry calls resolve against.
    pub fn function_registry(&self) -> Arc<FunctionRegistry> {
        self.functions
            .clone()
            .unwrap_or_else(FunctionRegistry::standard)
    }
}

// ─── Stages ────────────────────────────────────────────────────────

/// Pipeline states, in order. There are no backward transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Unparsed,
    Parsed,
    RegistryBuilt,
    CodeGenerated,
    BackendCompiled,
    Bound,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Unparsed => "unparsed",
            Stage::Parsed => "parsed",
            Stage::RegistryBuilt => "registry built",
            Stage::CodeGenerated => "code generated",
            Stage::BackendCompiled => "backend compiled",
            Stage::Bound => "bound",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Front end seam ────────────────────────────────────────────────

/// A parsed program and the source locations of its nodes.
#[derive(Debug)]
pub struct ParsedSource {
    pub tree: Tree,
    pub source_map: SourceMap,
}

impl ParsedSource {
    /// A tree without location information.
    pub fn new(tree: Tree) -> Self {
        let source_map = SourceMap::new(&tree);
        Self { tree, source_map }
    }

    pub fn with_source_map(tree: Tree, source_map: SourceMap) -> Self {
        Self { tree, source_map }
    }
}

/// Turns program text into a tree. Parsing lives outside this crate.
pub trait Frontend {
    fn parse(&self, source: &str) -> Result<ParsedSource, SyntaxError>;
}

// ─── Compiler ──────────────────────────────────────────────────────

/// Compiles trees into executables. Each call is a fresh pipeline run; the
/// input tree is never modified.
#[derive(Clone, Debug, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Parse `source` with `frontend` and compile it for `target`. A syntax
    /// error is the only diagnostic reported; no later stage runs.
    pub fn compile_source<F: Frontend + ?Sized>(
        &self,
        frontend: &F,
        source: &str,
        target: TargetKind,
    ) -> Result<Executable, Vec<Diagnostic>> {
        let parsed = match frontend.parse(source) {
            Ok(parsed) => parsed,
            Err(err) => {
                info!(stage = %Stage::Unparsed, error = %err, "parse failed");
                return Err(vec![Diagnostic::error(
                    ErrorKind::Syntax,
                    err.message,
                    err.span,
                )]);
            }
        };
        let tree = &parsed.tree;
        let map = Some(&parsed.source_map);
        match target {
            TargetKind::Points => self.compile_points(tree, map).map(Executable::Points),
            TargetKind::Volumes => self.compile_volumes(tree, map).map(Executable::Volumes),
        }
    }

    /// Compile a point program.
    pub fn compile_points(
        &self,
        tree: &Tree,
        source_map: Option<&SourceMap>,
    ) -> Result<PointExecutable, Vec<Diagnostic>> {
        pipeline::compile(tree, source_map, TargetKind::Points, &self.options)
            .map(PointExecutable::new)
    }

    /// Compile a volume program.
    pub fn compile_volumes(
        &self,
        tree: &Tree,
        source_map: Option<&SourceMap>,
    ) -> Result<VolumeExecutable, Vec<Diagnostic>> {
        pipeline::compile(tree, source_map, TargetKind::Volumes, &self.options)
            .map(VolumeExecutable::new)
    }
}
