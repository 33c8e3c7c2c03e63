//! Purpose: Apply a configuration's options to an engine handle.
//! Exports: `LOAD_MODELS_KEY`, `load_models`, `set_option`, `apply_options`.
//! Role: Option Protocol for the native backend.
//! Invariants: External model libraries load before any other option is set.
//! Invariants: The first failing call aborts the sequence; nothing is rolled back.
//! Invariants: Native failures surface as `Configuration` errors wrapping the native error.
use std::collections::BTreeMap;

use tracing::debug;

use crate::core::error::Error;
use crate::native::handle::{EngineHandle, c_string};

/// Option naming a shared library of extra forward models.
pub const LOAD_MODELS_KEY: &str = "loadmodels";

pub fn load_models(handle: &mut EngineHandle, path: &str) -> Result<(), Error> {
    let path_c = c_string(path, "model library path")?;
    handle
        .call("fabber_load_models", |abi, ctx, _out, err| {
            abi.load_models(ctx, &path_c, err)
        })
        .map_err(Error::configuration)?;
    debug!(path, "loaded external models");
    Ok(())
}

pub fn set_option(handle: &mut EngineHandle, key: &str, value: &str) -> Result<(), Error> {
    let key_c = c_string(key, "option key")?;
    let value_c = c_string(value, "option value")?;
    handle
        .call("fabber_set_opt", |abi, ctx, _out, err| {
            abi.set_opt(ctx, &key_c, &value_c, err)
        })
        .map_err(Error::configuration)?;
    Ok(())
}

pub fn apply_options(handle: &mut EngineHandle, options: &BTreeMap<String, String>) -> Result<(), Error> {
    if let Some(path) = options.get(LOAD_MODELS_KEY) {
        load_models(handle, path)?;
    }
    for (key, value) in options {
        if key == LOAD_MODELS_KEY {
            continue;
        }
        set_option(handle, key, value)?;
    }
    debug!(count = options.len(), "applied engine options");
    Ok(())
}
