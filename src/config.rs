//! Purpose: Construction-time settings for both engine clients.
//! Exports: `NativeConfig`, `ExecConfig`.
//! Role: Explicit inputs replacing ambient environment lookups.
//! Invariants: Executable candidates are tried in order; nothing is read from the environment.
//! Invariants: Both structs deserialize with every field optional.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::buffer::{DEFAULT_ERROR_CAPACITY, DEFAULT_OUTPUT_CAPACITY};

pub const DEFAULT_LIBRARY: &str = "libfabbercore_shared.so";
pub const DEFAULT_RUN_FILE: &str = "fabber.fab";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    pub library: PathBuf,
    pub error_capacity: usize,
    /// Hard limit on log and introspection text; longer text is cut by the engine.
    pub output_capacity: usize,
}

impl NativeConfig {
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            ..Self::default()
        }
    }

    pub fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::from(DEFAULT_LIBRARY),
            error_capacity: DEFAULT_ERROR_CAPACITY,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    pub candidates: Vec<PathBuf>,
    /// Directory receiving the run file and any staged input volumes.
    pub workdir: PathBuf,
    pub run_file_name: String,
}

impl ExecConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Self::default()
        }
    }

    pub fn with_candidate(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidates.push(path.into());
        self
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            workdir: PathBuf::from("."),
            run_file_name: DEFAULT_RUN_FILE.to_string(),
        }
    }
}
