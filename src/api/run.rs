//! Purpose: Inputs and outputs of one engine run.
//! Exports: `RunConfiguration`, `RunResult`.
//! Role: Backend-neutral description of options, data volumes, and mask.
//! Invariants: All arrays share one spatial extent; the first array examined (mask first,
//! Invariants: then data in key order) defines it and any other extent is a `ShapeMismatch`.
//! Invariants: Data is stored as `f32`, the mask as booleans; casts happen on insertion.
use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use num_traits::AsPrimitive;
use tracing::{debug, warn};

use crate::api::store::VolumeStore;
use crate::core::error::{Error, ErrorKind};
use crate::core::marshal::{Extent, MaskValue, mask_from};
use crate::native::protocol::LOAD_MODELS_KEY;

pub const DATA_KEY: &str = "data";
pub const MASK_KEY: &str = "mask";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunConfiguration {
    options: BTreeMap<String, String>,
    data: BTreeMap<String, ArrayD<f32>>,
    mask: Option<ArrayD<bool>>,
}

impl RunConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_option(key, value);
        self
    }

    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn with_data<T, S, D>(mut self, key: impl Into<String>, array: &ArrayBase<S, D>) -> Self
    where
        T: AsPrimitive<f32>,
        S: Data<Elem = T>,
        D: Dimension,
    {
        self.set_data(key, array);
        self
    }

    pub fn set_data<T, S, D>(&mut self, key: impl Into<String>, array: &ArrayBase<S, D>)
    where
        T: AsPrimitive<f32>,
        S: Data<Elem = T>,
        D: Dimension,
    {
        let converted = array.mapv(|value| value.as_()).into_dyn();
        self.data.insert(key.into(), converted);
    }

    pub fn with_mask<T, S, D>(mut self, mask: &ArrayBase<S, D>) -> Self
    where
        T: MaskValue,
        S: Data<Elem = T>,
        D: Dimension,
    {
        self.mask = Some(mask_from(mask));
        self
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn data(&self) -> &BTreeMap<String, ArrayD<f32>> {
        &self.data
    }

    pub fn mask(&self) -> Option<&ArrayD<bool>> {
        self.mask.as_ref()
    }

    pub fn has_arrays(&self) -> bool {
        self.mask.is_some() || !self.data.is_empty()
    }

    /// Shared spatial extent, or `None` when the configuration carries no arrays.
    pub fn extent(&self) -> Result<Option<Extent>, Error> {
        let mut extent: Option<Extent> = None;
        let shapes = self
            .mask
            .iter()
            .map(|mask| (MASK_KEY, mask.shape()))
            .chain(self.data.iter().map(|(key, array)| (key.as_str(), array.shape())));
        for (key, shape) in shapes {
            match extent {
                None => extent = Some(Extent::of_shape(shape)?),
                Some(expected) => expected.ensure_matches(shape, &format!("array '{key}'"))?,
            }
        }
        Ok(extent)
    }

    /// Load every option value the store can read. `mask` becomes the mask; any other
    /// volume is keyed by its path, the name the engine resolves option values to.
    /// Only a failure to load the `data` option is fatal.
    pub fn resolve_volumes(&mut self, store: &dyn VolumeStore) -> Result<(), Error> {
        let candidates: Vec<(String, String)> = self
            .options
            .iter()
            .filter(|(key, _)| key.as_str() != LOAD_MODELS_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in candidates {
            let path = Path::new(&value);
            let loaded = if path.is_file() {
                store.load(path)
            } else {
                Err(Error::new(ErrorKind::Io)
                    .with_message("volume file does not exist")
                    .with_path(path))
            };
            match loaded {
                Ok(volume) if key == MASK_KEY => {
                    debug!(path = %path.display(), "loaded mask volume");
                    self.mask = Some(mask_from(&volume));
                }
                Ok(volume) => {
                    debug!(key, path = %path.display(), "loaded data volume");
                    self.data.insert(value, volume);
                }
                Err(err) if key == DATA_KEY => return Err(err),
                Err(err) if store.recognises(path) => {
                    warn!(key, error = %err, "ignoring unreadable volume option");
                }
                Err(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunResult {
    pub outputs: BTreeMap<String, ArrayD<f32>>,
    pub log: String,
}
