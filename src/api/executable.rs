//! Compiled programs bound to host data at execute time.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::pipeline::Artifact;
use super::Stage;
use crate::backend::CompiledFunction;
use crate::diagnostic::Diagnostic;
use crate::error::{AccessError, BindingError, ExecuteError};
use crate::ir::IrFunction;
use crate::registry::{AttributeRegistry, Registry, VolumeRegistry};
use crate::runtime::{Coord, ElementState, Handle, PointData, Value, VolumeData};
use crate::types::Ty;

/// Polled between chunks; returning `true` stops the run.
pub type Interrupt = Arc<dyn Fn() -> bool + Send + Sync>;

/// Per-call execution settings.
#[derive(Clone)]
pub struct ExecuteOptions {
    /// Element indices to run; all elements when `None`. For volumes the
    /// indices address the ordered list of iterated voxels.
    pub selection: Option<Vec<usize>>,
    /// Evaluate the elements of each chunk on the rayon pool.
    pub parallel: bool,
    pub chunk_size: usize,
    pub interrupt: Option<Interrupt>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            selection: None,
            parallel: false,
            chunk_size: 1024,
            interrupt: None,
        }
    }
}

impl ExecuteOptions {
    pub fn with_selection(mut self, selection: Vec<usize>) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_interrupt(mut self, interrupt: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.interrupt = Some(Arc::new(interrupt));
        self
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("selection", &self.selection)
            .field("parallel", &self.parallel)
            .field("chunk_size", &self.chunk_size)
            .field("interrupt", &self.interrupt.is_some())
            .finish()
    }
}

/// Outcome of one successful `execute` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    /// Elements the program ran on.
    pub processed: usize,
    /// Chunks evaluated.
    pub chunks: usize,
    /// Writable entries the data set lacked and that were created.
    pub created: Vec<String>,
}

// ─── Binding ───────────────────────────────────────────────────────

/// Resolve one handle per registry entry, in registry order.
fn bind<D: ?Sized>(
    registry: &Registry,
    data: &mut D,
    get: fn(&D, &str, &Ty) -> Result<Handle, AccessError>,
    create: fn(&mut D, &str, &Ty, &Value) -> Result<Handle, AccessError>,
    created: &mut Vec<String>,
) -> Result<Vec<Handle>, BindingError> {
    let kind = registry.target().entry_kind();
    let mut handles = Vec::with_capacity(registry.len());
    for entry in registry.entries() {
        let name = entry.name.as_str();
        let handle = match get(data, name, &entry.ty) {
            Ok(handle) => handle,
            Err(AccessError::Missing(_)) if entry.writable => {
                let handle = create(data, name, &entry.ty, &Value::zero(&entry.ty)).map_err(
                    |source| BindingError::Create {
                        kind,
                        name: name.to_string(),
                        source,
                    },
                )?;
                info!(kind, name, ty = %entry.ty, "created missing entry");
                created.push(name.to_string());
                handle
            }
            Err(AccessError::Missing(_)) => {
                return Err(BindingError::MissingReadOnly {
                    kind,
                    name: name.to_string(),
                    ty: entry.ty,
                })
            }
            Err(AccessError::TypeMismatch { found, .. }) => {
                return Err(BindingError::TypeMismatch {
                    kind,
                    name: name.to_string(),
                    expected: entry.ty,
                    found,
                })
            }
            Err(source @ AccessError::Unsupported { .. }) => {
                return Err(BindingError::Create {
                    kind,
                    name: name.to_string(),
                    source,
                })
            }
        };
        debug!(kind, name, writable = entry.writable, handle = handle.0, "bound");
        handles.push(handle);
    }
    Ok(handles)
}

/// Slot-indexed write-back targets: `Some(handle)` for writable entries.
fn write_targets(registry: &Registry, handles: &[Handle]) -> Vec<Option<Handle>> {
    registry
        .entries()
        .zip(handles)
        .map(|(entry, &handle)| entry.writable.then_some(handle))
        .collect()
}

fn select<E: Copy>(elements: Vec<E>, selection: Option<&[usize]>) -> Result<Vec<E>, ExecuteError> {
    let Some(selection) = selection else {
        return Ok(elements);
    };
    selection
        .iter()
        .map(|&index| {
            elements
                .get(index)
                .copied()
                .ok_or(ExecuteError::SelectionOutOfRange {
                    index,
                    len: elements.len(),
                })
        })
        .collect()
}

// ─── Element loop ──────────────────────────────────────────────────

/// Gather, evaluate and scatter `elements` chunk by chunk.
fn run_chunks<D: ?Sized, E: Copy>(
    function: &CompiledFunction,
    data: &mut D,
    elements: &[E],
    options: &ExecuteOptions,
    gather: impl Fn(&D, E) -> ElementState,
    scatter: impl Fn(&mut D, E, ElementState),
) -> Result<ExecuteReport, ExecuteError> {
    let mut report = ExecuteReport::default();
    for chunk in elements.chunks(options.chunk_size.max(1)) {
        if options.interrupt.as_ref().is_some_and(|interrupt| interrupt()) {
            warn!(
                completed = report.processed,
                total = elements.len(),
                "execution interrupted"
            );
            return Err(ExecuteError::Interrupted {
                completed: report.processed,
                total: elements.len(),
            });
        }
        let mut states: Vec<ElementState> = chunk.iter().map(|&e| gather(data, e)).collect();
        if options.parallel {
            states.par_iter_mut().for_each(|state| function.call(state));
        } else {
            states.iter_mut().for_each(|state| function.call(state));
        }
        for (&element, state) in chunk.iter().zip(states) {
            scatter(data, element, state);
        }
        report.processed += chunk.len();
        report.chunks += 1;
    }
    Ok(report)
}

// ─── Point programs ────────────────────────────────────────────────

/// A compiled point program.
#[derive(Clone, Debug)]
pub struct PointExecutable {
    registry: AttributeRegistry,
    ir: Arc<IrFunction>,
    function: CompiledFunction,
    warnings: Vec<Diagnostic>,
}

impl PointExecutable {
    pub(crate) fn new(artifact: Artifact) -> Self {
        Self {
            registry: artifact.registry,
            ir: artifact.ir,
            function: artifact.function,
            warnings: artifact.warnings,
        }
    }

    /// Attributes the program reads and writes, for host pre-flight checks.
    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// Optimized IR the program was compiled from.
    pub fn ir(&self) -> &IrFunction {
        &self.ir
    }

    pub fn function(&self) -> &CompiledFunction {
        &self.function
    }

    /// Diagnostics recorded by a compile that succeeded.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Run the program once per selected point.
    #[instrument(skip_all, fields(points = data.len()))]
    pub fn execute<D: PointData + ?Sized>(
        &self,
        data: &mut D,
        options: &ExecuteOptions,
    ) -> Result<ExecuteReport, ExecuteError> {
        let points: Vec<usize> =
            select((0..data.len()).collect(), options.selection.as_deref())?;
        let mut created = Vec::new();
        let handles = bind(
            &self.registry,
            data,
            D::get,
            D::create_if_missing,
            &mut created,
        )?;
        info!(stage = %Stage::Bound, attributes = handles.len(), "stage complete");
        let targets = write_targets(&self.registry, &handles);

        let mut report = run_chunks(
            &self.function,
            data,
            &points,
            options,
            |data, point| {
                ElementState::new(handles.iter().map(|&h| data.read(h, point)).collect())
            },
            |data, point, state| {
                for (slot, value) in state.into_written() {
                    if let Some(Some(handle)) = targets.get(slot) {
                        data.write(*handle, point, value);
                    }
                }
            },
        )?;
        report.created = created;
        info!(processed = report.processed, chunks = report.chunks, "points executed");
        Ok(report)
    }
}

// ─── Volume programs ───────────────────────────────────────────────

/// A compiled volume program.
#[derive(Clone, Debug)]
pub struct VolumeExecutable {
    registry: VolumeRegistry,
    ir: Arc<IrFunction>,
    function: CompiledFunction,
    warnings: Vec<Diagnostic>,
}

impl VolumeExecutable {
    pub(crate) fn new(artifact: Artifact) -> Self {
        Self {
            registry: artifact.registry,
            ir: artifact.ir,
            function: artifact.function,
            warnings: artifact.warnings,
        }
    }

    pub fn registry(&self) -> &VolumeRegistry {
        &self.registry
    }

    pub fn ir(&self) -> &IrFunction {
        &self.ir
    }

    pub fn function(&self) -> &CompiledFunction {
        &self.function
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Run the program once per voxel of the union of active voxels of the
    /// written grids (of every grid when none is written), in coordinate
    /// order.
    #[instrument(skip_all, fields(grids = self.registry.len()))]
    pub fn execute<D: VolumeData + ?Sized>(
        &self,
        data: &mut D,
        options: &ExecuteOptions,
    ) -> Result<ExecuteReport, ExecuteError> {
        let mut created = Vec::new();
        let handles = bind(
            &self.registry,
            data,
            D::get,
            D::create_if_missing,
            &mut created,
        )?;
        info!(stage = %Stage::Bound, grids = handles.len(), "stage complete");
        let targets = write_targets(&self.registry, &handles);

        let written: Vec<Handle> = targets.iter().flatten().copied().collect();
        let iterated = if written.is_empty() {
            handles.clone()
        } else {
            written
        };
        let voxels: BTreeSet<Coord> = iterated
            .iter()
            .flat_map(|&h| data.active_voxels(h))
            .collect();
        let voxels: Vec<Coord> =
            select(voxels.into_iter().collect(), options.selection.as_deref())?;

        let mut report = run_chunks(
            &self.function,
            data,
            &voxels,
            options,
            |data, coord| {
                ElementState::at(handles.iter().map(|&h| data.read(h, coord)).collect(), coord)
            },
            |data, coord, state| {
                for (slot, value) in state.into_written() {
                    if let Some(Some(handle)) = targets.get(slot) {
                        data.write(*handle, coord, value);
                    }
                }
            },
        )?;
        report.created = created;
        info!(processed = report.processed, chunks = report.chunks, "voxels executed");
        Ok(report)
    }
}

// ─── Either target ─────────────────────────────────────────────────

/// The result of compiling source text for a target chosen at run time.
#[derive(Clone, Debug)]
pub enum Executable {
    Points(PointExecutable),
    Volumes(VolumeExecutable),
}

impl Executable {
    pub fn registry(&self) -> &Registry {
        match self {
            Executable::Points(exe) => exe.registry(),
            Executable::Volumes(exe) => exe.registry(),
        }
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        match self {
            Executable::Points(exe) => exe.warnings(),
            Executable::Volumes(exe) => exe.warnings(),
        }
    }

    pub fn into_points(self) -> Option<PointExecutable> {
        match self {
            Executable::Points(exe) => Some(exe),
            Executable::Volumes(_) => None,
        }
    }

    pub fn into_volumes(self) -> Option<VolumeExecutable> {
        match self {
            Executable::Volumes(exe) => Some(exe),
            Executable::Points(_) => None,
        }
    }
}
