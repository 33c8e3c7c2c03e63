//! Purpose: Stage extent and data on an engine handle, run it, and read outputs back.
//! Exports: `Stage` and the run methods on `EngineHandle`.
//! Role: Run Executor for the native backend.
//! Invariants: `Created -> ExtentSet -> Ran`; the extent is set exactly once per handle.
//! Invariants: Out-of-order calls are usage errors raised before any native call.
//! Invariants: Buffers passed to the engine have exactly `voxels * size` elements.
use libc::c_int;
use ndarray::ArrayD;

use crate::core::error::{Error, ErrorKind};
use crate::core::marshal::{Extent, unflatten_output};
use crate::native::handle::{EngineHandle, c_string};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Created,
    ExtentSet(Extent),
    Ran(Extent),
}

impl EngineHandle {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn set_extent(&mut self, extent: Extent, mask: &[i32]) -> Result<(), Error> {
        if self.stage != Stage::Created {
            return Err(usage("fabber_set_extent", "extent is already set on this handle"));
        }
        let voxels = extent.voxels()?;
        if mask.len() != voxels {
            return Err(Error::new(ErrorKind::ShapeMismatch).with_message(format!(
                "mask holds {} values, extent needs {voxels}",
                mask.len()
            )));
        }
        let (nx, ny, nz) = extent.as_c_ints()?;
        self.call("fabber_set_extent", |abi, ctx, _out, err| {
            abi.set_extent(ctx, nx, ny, nz, mask, err)
        })?;
        self.stage = Stage::ExtentSet(extent);
        Ok(())
    }

    pub fn set_data(&mut self, key: &str, size: usize, data: &[f32]) -> Result<(), Error> {
        let extent = match self.stage {
            Stage::ExtentSet(extent) => extent,
            Stage::Created => {
                return Err(usage("fabber_set_data", "set_extent must be called before set_data"));
            }
            Stage::Ran(_) => return Err(usage("fabber_set_data", "engine has already run")),
        };
        if data.len() != extent.values(size)? {
            return Err(Error::new(ErrorKind::ShapeMismatch).with_message(format!(
                "data '{key}' holds {} values, expected {} voxels x {size}",
                data.len(),
                extent.voxels()?
            )));
        }
        let name = c_string(key, "data key")?;
        let size = c_int::try_from(size)
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("per-voxel size exceeds c_int"))?;
        self.call("fabber_set_data", |abi, ctx, _out, err| {
            abi.set_data(ctx, &name, size, data, err)
        })?;
        Ok(())
    }

    /// Blocks until the engine finishes; returns the log text it left in the output buffer.
    pub fn run(&mut self) -> Result<String, Error> {
        let Stage::ExtentSet(extent) = self.stage else {
            return Err(usage("fabber_dorun", "run requires a freshly staged extent"));
        };
        self.call("fabber_dorun", |abi, ctx, out, err| abi.run(ctx, out, err))?;
        self.stage = Stage::Ran(extent);
        Ok(self.output_text("fabber_dorun"))
    }

    pub fn get_output(&mut self, name: &str) -> Result<ArrayD<f32>, Error> {
        let Stage::Ran(extent) = self.stage else {
            return Err(usage("fabber_get_data", "outputs are only available after run"));
        };
        let key = c_string(name, "output name")?;
        let size = self.call("fabber_get_data_size", |abi, ctx, _out, err| {
            abi.get_data_size(ctx, &key, err)
        })?;
        let size = usize::try_from(size).unwrap_or_default();
        let mut buffer = vec![0f32; extent.values(size)?];
        self.call("fabber_get_data", |abi, ctx, _out, err| {
            abi.get_data(ctx, &key, &mut buffer, err)
        })?;
        unflatten_output(buffer, extent, size)
    }
}

fn usage(operation: &'static str, message: &str) -> Error {
    Error::new(ErrorKind::Usage)
        .with_operation(operation)
        .with_message(message)
}
