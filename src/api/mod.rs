//! Purpose: Define the public Rust API boundary for the engine client.
//! Exports: Client traits, run inputs/outputs, configs, errors, and both backends.
//! Role: Backend-neutral surface; callers pick a backend and program against the traits.
//! Invariants: Introspection is best-effort; runs and configuration report typed errors.

pub(crate) mod client;
pub(crate) mod run;
pub(crate) mod store;

pub use crate::config::{ExecConfig, NativeConfig};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::marshal::{Extent, MaskValue};
pub use crate::core::options::{OptionDescriptor, RESERVED_OPTIONS, is_reserved};
pub use crate::exec::SubprocessEngineClient;
pub use crate::native::NativeEngineClient;
pub use crate::native::abi::{EngineAbi, RawContext, SharedLibraryEngine};
pub use client::{ApiResult, EngineClient, Introspector};
pub use run::{DATA_KEY, MASK_KEY, RunConfiguration, RunResult};
pub use store::VolumeStore;
