//! Purpose: The capability set shared by the native and subprocess engine clients.
//! Exports: `Introspector`, `EngineClient`, `ApiResult`.
//! Role: Callers depend on these traits, not on a concrete backend.
//! Invariants: Introspection is best-effort: failures are logged and yield empty results.
//! Invariants: Configuration and run failures always propagate to the caller.
use std::collections::BTreeMap;

use tracing::warn;

use crate::api::run::{RunConfiguration, RunResult};
pub use crate::core::error::ApiResult;
use crate::core::error::Error;
use crate::core::options::OptionDescriptor;

pub trait Introspector {
    fn list_methods(&mut self) -> Vec<String>;

    fn list_models(&mut self) -> Vec<String>;

    /// Options for the general engine, or for one method or model, plus any free-text
    /// description the backend provides.
    fn get_options(
        &mut self,
        method: Option<&str>,
        model: Option<&str>,
    ) -> (Vec<OptionDescriptor>, String);
}

pub trait EngineClient: Introspector {
    /// Apply options ahead of a run. `loadmodels`, if present, is honoured first.
    fn configure(&mut self, options: &BTreeMap<String, String>) -> ApiResult<()>;

    /// Apply `config`'s options, execute, and return the named outputs with the run log.
    fn run(&mut self, config: &RunConfiguration, outputs: &[&str]) -> ApiResult<RunResult>;
}

pub(crate) fn best_effort<T: Default>(what: &'static str, result: Result<T, Error>) -> T {
    result.unwrap_or_else(|err| {
        warn!(query = what, error = %err, "engine introspection failed; returning empty result");
        T::default()
    })
}
