//! The compile pipeline shared by every target.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{CompileOptions, Stage};
use crate::ast::Tree;
use crate::backend::{Backend, ClosureBackend, CompiledFunction};
use crate::codegen::{CodeGenerator, CodegenContext};
use crate::diagnostic::{Diagnostic, DiagnosticSink, ErrorKind, SourceMap};
use crate::ir::{optimize, IrFunction};
use crate::passes;
use crate::registry::{Registry, TargetKind};

/// Everything an executable is built from.
pub(crate) struct Artifact {
    pub registry: Registry,
    pub ir: Arc<IrFunction>,
    pub function: CompiledFunction,
    pub warnings: Vec<Diagnostic>,
}

/// Run every stage on a private copy of `tree`.
#[instrument(skip_all, fields(target = %target, nodes = tree.len()))]
pub(crate) fn compile(
    tree: &Tree,
    source_map: Option<&SourceMap>,
    target: TargetKind,
    options: &CompileOptions,
) -> Result<Artifact, Vec<Diagnostic>> {
    let mut sink = DiagnosticSink::new(options.max_errors, options.warnings_as_errors);
    let mut copy = tree.copy();
    let mut map = match source_map {
        Some(map) => map.rebase(&copy),
        None => SourceMap::new(&copy),
    };
    info!(stage = %Stage::Parsed, "stage complete");

    passes::run(&mut copy, &mut map, &mut sink);
    if sink.has_fatal() {
        return Err(abort(Stage::Parsed, sink));
    }

    let registry = Registry::build(&copy, target, &map, &mut sink);
    if sink.has_fatal() {
        return Err(abort(Stage::Parsed, sink));
    }
    info!(
        stage = %Stage::RegistryBuilt,
        entries = registry.len(),
        writable = registry.writable().count(),
        "stage complete"
    );

    let functions = options.function_registry();
    let ctx = CodegenContext {
        registry: &registry,
        functions: &functions,
        custom_data: &options.custom_data,
        source_map: &map,
    };
    let mut ir = CodeGenerator::new(&copy, ctx, &mut sink).generate();
    if sink.has_fatal() {
        return Err(abort(Stage::RegistryBuilt, sink));
    }
    optimize(&mut ir, options.opt_level);
    info!(
        stage = %Stage::CodeGenerated,
        instructions = ir.len(),
        registers = ir.regs.len(),
        "stage complete"
    );

    let backend = ClosureBackend;
    let function = match backend.compile(&ir) {
        Ok(function) => function,
        Err(err) => {
            sink.push(Diagnostic::error(ErrorKind::Backend, err.to_string(), None));
            return Err(abort(Stage::CodeGenerated, sink));
        }
    };
    info!(stage = %Stage::BackendCompiled, backend = backend.name(), "stage complete");

    let warnings = sink.into_diagnostics();
    debug!(warnings = warnings.len(), "compile finished");
    Ok(Artifact {
        registry,
        ir: Arc::new(ir),
        function,
        warnings,
    })
}

fn abort(stage: Stage, sink: DiagnosticSink) -> Vec<Diagnostic> {
    info!(%stage, errors = sink.error_count(), "compile aborted");
    sink.into_diagnostics()
}
