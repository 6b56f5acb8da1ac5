//! Host data-layer contract consumed by executables.
//!
//! The core never owns point or voxel storage. Hosts implement
//! [`PointData`] or [`VolumeData`]; executables resolve one [`Handle`]
//! per registry entry before the element loop and then read and write
//! through those handles only. [`memory`] holds in-memory reference
//! implementations used by tests and benchmarks.

pub mod memory;
pub mod value;

use indexmap::IndexMap;

use crate::error::AccessError;
use crate::types::Ty;
pub use memory::{PointDataset, VolumeDataset};
pub use value::Value;

/// Integer voxel coordinate `[x, y, z]`; ordering is lexicographic.
pub type Coord = [i32; 3];

/// Host-defined accessor token for one attribute or grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub usize);

/// Values one element sees while the compiled function runs: one slot per
/// registry entry, in registry index order.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementState {
    pub values: Vec<Value>,
    /// Slots the program assigned during this call.
    pub written: Vec<bool>,
    /// Voxel being processed; `None` for point programs.
    pub coord: Option<Coord>,
}

impl ElementState {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            written: vec![false; values.len()],
            values,
            coord: None,
        }
    }

    pub fn at(values: Vec<Value>, coord: Coord) -> Self {
        Self {
            written: vec![false; values.len()],
            values,
            coord: Some(coord),
        }
    }

    /// Values of the slots the program assigned, with their slot index.
    pub fn into_written(self) -> impl Iterator<Item = (usize, Value)> {
        self.values
            .into_iter()
            .zip(self.written)
            .enumerate()
            .filter_map(|(slot, (value, written))| written.then_some((slot, value)))
    }
}

/// Point attribute storage.
pub trait PointData {
    /// Number of points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accessor for an existing attribute of exactly `ty`.
    fn get(&self, name: &str, ty: &Ty) -> Result<Handle, AccessError>;

    /// Accessor for `name`, creating it with every point set to `default`
    /// when absent.
    fn create_if_missing(
        &mut self,
        name: &str,
        ty: &Ty,
        default: &Value,
    ) -> Result<Handle, AccessError>;

    fn read(&self, handle: Handle, index: usize) -> Value;

    fn write(&mut self, handle: Handle, index: usize, value: Value);
}

/// Sparse voxel grid storage.
pub trait VolumeData {
    fn get(&self, name: &str, ty: &Ty) -> Result<Handle, AccessError>;

    /// Accessor for `name`, creating an empty grid with `background` as its
    /// inactive value when absent.
    fn create_if_missing(
        &mut self,
        name: &str,
        ty: &Ty,
        background: &Value,
    ) -> Result<Handle, AccessError>;

    /// Active voxel coordinates of one grid, in ascending order.
    fn active_voxels(&self, handle: Handle) -> Vec<Coord>;

    /// Voxel value, or the grid background when inactive.
    fn read(&self, handle: Handle, coord: Coord) -> Value;

    /// Store a voxel value, activating the voxel.
    fn write(&mut self, handle: Handle, coord: Coord, value: Value);
}

/// Read-only named values supplied by the host, consulted by external
/// variable reads at compile time.
#[derive(Clone, Debug, Default)]
pub struct CustomData {
    values: IndexMap<String, Value>,
}

impl CustomData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
