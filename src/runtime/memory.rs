//! In-memory point and voxel data sets.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use super::{Coord, Handle, PointData, Value, VolumeData};
use crate::error::AccessError;
use crate::types::Ty;

#[derive(Clone, Debug)]
struct Column {
    ty: Ty,
    values: Vec<Value>,
}

/// Fixed-length point set with named typed attribute columns.
#[derive(Clone, Debug, Default)]
pub struct PointDataset {
    len: usize,
    columns: IndexMap<String, Column>,
}

impl PointDataset {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: IndexMap::new(),
        }
    }

    /// Add (or replace) an attribute holding `value` on every point.
    pub fn with_uniform(mut self, name: &str, value: Value) -> Self {
        let ty = value.ty();
        let values = vec![value; self.len];
        self.columns.insert(name.to_string(), Column { ty, values });
        self
    }

    /// Add (or replace) an attribute from explicit per-point values. Missing
    /// trailing values are zero; extra values are dropped.
    pub fn with_values(mut self, name: &str, ty: Ty, mut values: Vec<Value>) -> Self {
        values.resize(self.len, Value::zero(&ty));
        self.columns.insert(name.to_string(), Column { ty, values });
        self
    }

    pub fn ty(&self, name: &str) -> Option<Ty> {
        self.columns.get(name).map(|c| c.ty)
    }

    pub fn values(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|c| c.values.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

impl PointData for PointDataset {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, name: &str, ty: &Ty) -> Result<Handle, AccessError> {
        let (index, _, column) = self
            .columns
            .get_full(name)
            .ok_or_else(|| AccessError::Missing(name.to_string()))?;
        if column.ty != *ty {
            return Err(AccessError::TypeMismatch {
                name: name.to_string(),
                expected: *ty,
                found: column.ty,
            });
        }
        Ok(Handle(index))
    }

    fn create_if_missing(
        &mut self,
        name: &str,
        ty: &Ty,
        default: &Value,
    ) -> Result<Handle, AccessError> {
        if *ty == Ty::Void {
            return Err(AccessError::Unsupported {
                name: name.to_string(),
                ty: *ty,
                reason: "attributes cannot be void".to_string(),
            });
        }
        if !self.columns.contains_key(name) {
            let values = vec![default.clone(); self.len];
            self.columns
                .insert(name.to_string(), Column { ty: *ty, values });
        }
        self.get(name, ty)
    }

    fn read(&self, handle: Handle, index: usize) -> Value {
        self.columns
            .get_index(handle.0)
            .and_then(|(_, c)| c.values.get(index).cloned())
            .unwrap_or(Value::Void)
    }

    fn write(&mut self, handle: Handle, index: usize, value: Value) {
        if let Some(slot) = self
            .columns
            .get_index_mut(handle.0)
            .and_then(|(_, c)| c.values.get_mut(index))
        {
            *slot = value;
        }
    }
}

#[derive(Clone, Debug)]
struct Grid {
    ty: Ty,
    background: Value,
    voxels: BTreeMap<Coord, Value>,
}

/// Named sparse grids keyed by integer coordinate.
#[derive(Clone, Debug, Default)]
pub struct VolumeDataset {
    grids: IndexMap<String, Grid>,
}

impl VolumeDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an empty grid whose inactive value is `background`.
    pub fn with_grid(mut self, name: &str, background: Value) -> Self {
        let ty = background.ty();
        self.grids.insert(
            name.to_string(),
            Grid {
                ty,
                background,
                voxels: BTreeMap::new(),
            },
        );
        self
    }

    /// Activate a voxel with `value`. Returns false if the grid does not exist.
    pub fn set(&mut self, name: &str, coord: Coord, value: Value) -> bool {
        match self.grids.get_mut(name) {
            Some(grid) => {
                grid.voxels.insert(coord, value);
                true
            }
            None => false,
        }
    }

    pub fn value(&self, name: &str, coord: Coord) -> Option<&Value> {
        let grid = self.grids.get(name)?;
        Some(grid.voxels.get(&coord).unwrap_or(&grid.background))
    }

    pub fn active_count(&self, name: &str) -> usize {
        self.grids.get(name).map_or(0, |g| g.voxels.len())
    }

    pub fn ty(&self, name: &str) -> Option<Ty> {
        self.grids.get(name).map(|g| g.ty)
    }
}

impl VolumeData for VolumeDataset {
    fn get(&self, name: &str, ty: &Ty) -> Result<Handle, AccessError> {
        let (index, _, grid) = self
            .grids
            .get_full(name)
            .ok_or_else(|| AccessError::Missing(name.to_string()))?;
        if grid.ty != *ty {
            return Err(AccessError::TypeMismatch {
                name: name.to_string(),
                expected: *ty,
                found: grid.ty,
            });
        }
        Ok(Handle(index))
    }

    fn create_if_missing(
        &mut self,
        name: &str,
        ty: &Ty,
        background: &Value,
    ) -> Result<Handle, AccessError> {
        if !ty.is_numeric() {
            return Err(AccessError::Unsupported {
                name: name.to_string(),
                ty: *ty,
                reason: "grids hold numeric values only".to_string(),
            });
        }
        if !self.grids.contains_key(name) {
            self.grids.insert(
                name.to_string(),
                Grid {
                    ty: *ty,
                    background: background.clone(),
                    voxels: BTreeMap::new(),
                },
            );
        }
        self.get(name, ty)
    }

    fn active_voxels(&self, handle: Handle) -> Vec<Coord> {
        self.grids
            .get_index(handle.0)
            .map(|(_, g)| g.voxels.keys().copied().collect())
            .unwrap_or_default()
    }

    fn read(&self, handle: Handle, coord: Coord) -> Value {
        match self.grids.get_index(handle.0) {
            Some((_, grid)) => grid
                .voxels
                .get(&coord)
                .unwrap_or(&grid.background)
                .clone(),
            None => Value::Void,
        }
    }

    fn write(&mut self, handle: Handle, coord: Coord, value: Value) {
        if let Some((_, grid)) = self.grids.get_index_mut(handle.0) {
            grid.voxels.insert(coord, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_get_checks_type() {
        let data = PointDataset::new(3).with_uniform("b", Value::Float(2.0));
        assert!(data.get("b", &Ty::FLOAT).is_ok());
        assert_eq!(
            data.get("b", &Ty::INT32),
            Err(AccessError::TypeMismatch {
                name: "b".into(),
                expected: Ty::INT32,
                found: Ty::FLOAT,
            })
        );
        assert_eq!(data.get("c", &Ty::FLOAT), Err(AccessError::Missing("c".into())));
    }

    #[test]
    fn test_point_create_if_missing_keeps_existing() {
        let mut data = PointDataset::new(2).with_uniform("a", Value::Float(5.0));
        let h = data
            .create_if_missing("a", &Ty::FLOAT, &Value::Float(0.0))
            .unwrap();
        assert_eq!(data.read(h, 1), Value::Float(5.0));
        let n = data
            .create_if_missing("n", &Ty::VEC3F, &Value::zero(&Ty::VEC3F))
            .unwrap();
        data.write(n, 0, Value::vec3f(1.0, 0.0, 0.0));
        assert_eq!(data.values("n").unwrap()[0], Value::vec3f(1.0, 0.0, 0.0));
        assert_eq!(data.values("n").unwrap()[1], Value::zero(&Ty::VEC3F));
    }

    #[test]
    fn test_volume_write_activates() {
        let mut data = VolumeDataset::new().with_grid("density", Value::Float(0.0));
        let h = data.get("density", &Ty::FLOAT).unwrap();
        assert!(data.active_voxels(h).is_empty());
        data.write(h, [1, 0, 0], Value::Float(1.5));
        data.write(h, [0, 0, 0], Value::Float(0.5));
        assert_eq!(data.active_voxels(h), vec![[0, 0, 0], [1, 0, 0]]);
        assert_eq!(data.read(h, [5, 5, 5]), Value::Float(0.0));
    }

    #[test]
    fn test_volume_rejects_string_grids() {
        let mut data = VolumeDataset::new();
        assert!(matches!(
            data.create_if_missing("s", &Ty::Str, &Value::Str(String::new())),
            Err(AccessError::Unsupported { .. })
        ));
    }
}
