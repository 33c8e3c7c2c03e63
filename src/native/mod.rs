//! Purpose: Engine client driving the native library through one owned context.
//! Exports: `NativeEngineClient` plus the `abi`, `handle`, `protocol`, `executor` layers.
//! Role: Native backend of `EngineClient` and `Introspector`.
//! Invariants: One client owns one `EngineHandle`; dropping the client destroys the context,
//! Invariants: including when construction or configuration fails.
//! Invariants: One run per client: the engine accepts a single extent per context.
use std::collections::BTreeMap;
use std::rc::Rc;

use ndarray::ArrayD;
use tracing::debug;

use crate::api::client::{EngineClient, Introspector, best_effort};
use crate::api::run::{RunConfiguration, RunResult};
use crate::config::NativeConfig;
use crate::core::error::{Error, ErrorKind};
use crate::core::marshal::{Extent, flatten_data, flatten_mask};
use crate::core::options::{OptionDescriptor, parse_name_list, parse_option_records};

pub mod abi;
pub mod executor;
pub mod handle;
pub mod protocol;
pub mod sys;

use abi::{EngineAbi, SharedLibraryEngine};
use handle::{EngineHandle, c_string};

#[derive(Debug)]
pub struct NativeEngineClient {
    handle: EngineHandle,
}

impl NativeEngineClient {
    /// Load the engine library named by `config` and create a context on it.
    pub fn open(config: &NativeConfig) -> Result<Self, Error> {
        let engine = SharedLibraryEngine::open(&config.library)?;
        Self::with_abi(Rc::new(engine), config)
    }

    pub fn with_abi(abi: Rc<dyn EngineAbi>, config: &NativeConfig) -> Result<Self, Error> {
        let handle = EngineHandle::create(abi, config.error_capacity, config.output_capacity)?;
        Ok(Self { handle })
    }

    /// Create and configure in one step; the context is released if configuration fails.
    pub fn configured(
        abi: Rc<dyn EngineAbi>,
        config: &NativeConfig,
        options: &BTreeMap<String, String>,
    ) -> Result<Self, Error> {
        let mut client = Self::with_abi(abi, config)?;
        client.configure(options)?;
        Ok(client)
    }

    pub fn handle(&mut self) -> &mut EngineHandle {
        &mut self.handle
    }

    /// Release the native context now rather than on drop.
    pub fn close(&mut self) {
        self.handle.destroy();
    }

    /// Stage explicit arrays, run, and fetch `outputs`.
    pub fn run_with_data(
        &mut self,
        extent: Extent,
        mask: Option<&ArrayD<bool>>,
        data: &BTreeMap<String, ArrayD<f32>>,
        outputs: &[&str],
    ) -> Result<RunResult, Error> {
        let mask = flatten_mask(mask, extent)?;
        self.handle.set_extent(extent, &mask)?;
        for (key, array) in data {
            extent.ensure_matches(array.shape(), &format!("array '{key}'"))?;
            let (size, flat) = flatten_data(array)?;
            self.handle.set_data(key, size, &flat)?;
        }
        let log = self.handle.run()?;
        let mut result = RunResult {
            outputs: BTreeMap::new(),
            log,
        };
        for name in outputs {
            let output = self.handle.get_output(name)?;
            result.outputs.insert(name.to_string(), output);
        }
        debug!(outputs = result.outputs.len(), "native run complete");
        Ok(result)
    }

    pub fn query_methods(&mut self) -> Result<Vec<String>, Error> {
        self.handle
            .call("fabber_get_methods", |abi, ctx, out, err| abi.get_methods(ctx, out, err))?;
        Ok(parse_name_list(&self.handle.output_text("fabber_get_methods")))
    }

    pub fn query_models(&mut self) -> Result<Vec<String>, Error> {
        self.handle
            .call("fabber_get_models", |abi, ctx, out, err| abi.get_models(ctx, out, err))?;
        Ok(parse_name_list(&self.handle.output_text("fabber_get_models")))
    }

    /// The native query takes one selector; `method` wins when both are given.
    pub fn query_options(
        &mut self,
        method: Option<&str>,
        model: Option<&str>,
    ) -> Result<Vec<OptionDescriptor>, Error> {
        let selector = match (method, model) {
            (Some(method), _) => Some((c"method", c_string(method, "method name")?)),
            (None, Some(model)) => Some((c"model", c_string(model, "model name")?)),
            (None, None) => None,
        };
        self.handle.call("fabber_get_options", |abi, ctx, out, err| {
            let selector = selector.as_ref().map(|(key, value)| (*key, value.as_c_str()));
            abi.get_options(ctx, selector, out, err)
        })?;
        Ok(parse_option_records(&self.handle.output_text("fabber_get_options")))
    }

    /// Parameter names of the configured model.
    pub fn query_model_params(&mut self) -> Result<Vec<String>, Error> {
        self.handle.call("fabber_get_model_params", |abi, ctx, out, err| {
            abi.get_model_params(ctx, out, err)
        })?;
        Ok(parse_name_list(&self.handle.output_text("fabber_get_model_params")))
    }

    pub fn model_params(&mut self) -> Vec<String> {
        best_effort("model_params", self.query_model_params())
    }
}

impl Introspector for NativeEngineClient {
    fn list_methods(&mut self) -> Vec<String> {
        best_effort("list_methods", self.query_methods())
    }

    fn list_models(&mut self) -> Vec<String> {
        best_effort("list_models", self.query_models())
    }

    fn get_options(
        &mut self,
        method: Option<&str>,
        model: Option<&str>,
    ) -> (Vec<OptionDescriptor>, String) {
        (best_effort("get_options", self.query_options(method, model)), String::new())
    }
}

impl EngineClient for NativeEngineClient {
    fn configure(&mut self, options: &BTreeMap<String, String>) -> Result<(), Error> {
        protocol::apply_options(&mut self.handle, options)
    }

    fn run(&mut self, config: &RunConfiguration, outputs: &[&str]) -> Result<RunResult, Error> {
        let extent = config.extent()?.ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("run needs at least one data array or a mask")
        })?;
        self.configure(config.options())?;
        self.run_with_data(extent, config.mask(), config.data(), outputs)
    }
}
