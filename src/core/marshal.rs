//! Purpose: Convert between n-dimensional arrays and the engine's flat buffers.
//! Exports: `Extent`, `MaskValue`, `mask_from`, `flatten_mask`, `flatten_data`, `unflatten_output`.
//! Role: Data Marshaller shared by the native executor and the subprocess writer.
//! Invariants: Element order is logical row-major over `(x, y, z[, v])`, independent of
//! Invariants: the input's memory layout; the engine reads and writes in this order.
//! Invariants: Data travels as `f32`, the mask as `i32` with nonzero meaning "included".
//! Invariants: Outputs with one value per voxel are 3-D; the unit vector axis is dropped.
//! Invariants: Spatial axes are never squeezed, even when their length is 1.
use std::os::raw::c_int;

use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

/// Spatial voxel grid shared by every array in one run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Extent {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Spatial extent of a 3-D (scalar) or 4-D (vector) volume.
    pub fn of_shape(shape: &[usize]) -> Result<Self, Error> {
        match shape {
            [nx, ny, nz] | [nx, ny, nz, _] => Ok(Self::new(*nx, *ny, *nz)),
            _ => Err(Error::new(ErrorKind::ShapeMismatch).with_message(format!(
                "expected a 3-D or 4-D array, got shape {shape:?}"
            ))),
        }
    }

    pub fn voxels(&self) -> Result<usize, Error> {
        self.values(1)
    }

    /// Buffer length for `size` values per voxel.
    pub fn values(&self, size: usize) -> Result<usize, Error> {
        self.nx
            .checked_mul(self.ny)
            .and_then(|n| n.checked_mul(self.nz))
            .and_then(|n| n.checked_mul(size))
            .ok_or_else(|| {
                Error::new(ErrorKind::ShapeMismatch).with_message(format!(
                    "extent {}x{}x{} with {size} values per voxel overflows usize",
                    self.nx, self.ny, self.nz
                ))
            })
    }

    pub fn as_c_ints(&self) -> Result<(c_int, c_int, c_int), Error> {
        let convert = |n: usize| {
            c_int::try_from(n).map_err(|_| {
                Error::new(ErrorKind::Usage).with_message(format!("extent {n} exceeds c_int"))
            })
        };
        Ok((convert(self.nx)?, convert(self.ny)?, convert(self.nz)?))
    }

    pub(crate) fn ensure_matches(&self, shape: &[usize], what: &str) -> Result<(), Error> {
        let other = Self::of_shape(shape)?;
        if other != *self {
            return Err(Error::new(ErrorKind::ShapeMismatch).with_message(format!(
                "{what} has extent {}x{}x{}, expected {}x{}x{}",
                other.nx, other.ny, other.nz, self.nx, self.ny, self.nz
            )));
        }
        Ok(())
    }
}

/// Element types accepted as a mask; anything nonzero selects the voxel.
pub trait MaskValue: Copy {
    fn is_set(self) -> bool;
}

impl MaskValue for bool {
    fn is_set(self) -> bool {
        self
    }
}

macro_rules! mask_value_numeric {
    ($($ty:ty),*) => {
        $(
            impl MaskValue for $ty {
                fn is_set(self) -> bool {
                    self != (0 as $ty)
                }
            }
        )*
    };
}

mask_value_numeric!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Normalise any mask-like array to booleans, keeping its shape.
pub fn mask_from<T, S, D>(array: &ArrayBase<S, D>) -> ArrayD<bool>
where
    T: MaskValue,
    S: Data<Elem = T>,
    D: Dimension,
{
    array.mapv(|value| value.is_set()).into_dyn()
}

/// Flat `i32` mask of length `extent.voxels()`; all ones when no mask is given.
pub fn flatten_mask(mask: Option<&ArrayD<bool>>, extent: Extent) -> Result<Vec<i32>, Error> {
    let Some(mask) = mask else {
        return Ok(vec![1; extent.voxels()?]);
    };
    let shape = mask.shape();
    if shape.len() == 4 && shape[3] != 1 {
        return Err(Error::new(ErrorKind::ShapeMismatch)
            .with_message(format!("mask must have one value per voxel, got shape {shape:?}")));
    }
    extent.ensure_matches(shape, "mask")?;
    Ok(mask.iter().map(|&set| i32::from(set)).collect())
}

/// Flatten a data volume, returning its per-voxel size and the `f32` buffer.
pub fn flatten_data<T, S, D>(array: &ArrayBase<S, D>) -> Result<(usize, Vec<f32>), Error>
where
    T: AsPrimitive<f32>,
    S: Data<Elem = T>,
    D: Dimension,
{
    let size = match array.shape() {
        [_, _, _] => 1,
        [_, _, _, size] => *size,
        shape => {
            return Err(Error::new(ErrorKind::ShapeMismatch).with_message(format!(
                "data must be 3-D or 4-D, got shape {shape:?}"
            )));
        }
    };
    Ok((size, array.iter().map(|&value| value.as_()).collect()))
}

/// Reshape a buffer retrieved from the engine into `(nx, ny, nz[, size])`.
pub fn unflatten_output(flat: Vec<f32>, extent: Extent, size: usize) -> Result<ArrayD<f32>, Error> {
    let expected = extent.values(size)?;
    if flat.len() != expected {
        return Err(Error::new(ErrorKind::ShapeMismatch).with_message(format!(
            "output buffer holds {} values, expected {expected}",
            flat.len()
        )));
    }
    let shape = if size == 1 {
        vec![extent.nx, extent.ny, extent.nz]
    } else {
        vec![extent.nx, extent.ny, extent.nz, size]
    };
    ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to reshape output buffer")
            .with_source(err)
    })
}
