//! Purpose: Collaborator boundary for reading and writing volume files.
//! Exports: `VolumeStore`.
//! Role: Lets both clients exchange volumes on disk without knowing the file format.
//! Invariants: Loaded volumes are 3-D or 4-D `f32` arrays in `(x, y, z[, v])` order.
//! Invariants: Spatial transforms and headers are the store's concern.
use std::path::Path;

use ndarray::ArrayD;

use crate::core::error::Error;

pub trait VolumeStore {
    /// File extension written and recognised by this store, without the leading dot.
    fn extension(&self) -> &str;

    fn load(&self, path: &Path) -> Result<ArrayD<f32>, Error>;

    fn save(&self, path: &Path, volume: &ArrayD<f32>) -> Result<(), Error>;

    fn recognises(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&format!(".{}", self.extension())))
    }
}
