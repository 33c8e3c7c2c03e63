//! Purpose: Engine client driving the standalone executable as a subprocess.
//! Exports: `SubprocessEngineClient` plus the `locate`, `runfile`, `capture` helpers.
//! Role: CLI backend of `EngineClient` and `Introspector`.
//! Invariants: The executable is resolved once, at construction, from explicit candidates.
//! Invariants: A run writes the whole configuration once, then launches exactly one process
//! Invariants: with the run file's directory as working directory.
//! Invariants: Nonzero exit is a `Subprocess` error for runs, an empty result for introspection.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use tracing::{debug, warn};

use crate::api::client::{EngineClient, Introspector, best_effort};
use crate::api::run::{MASK_KEY, RunConfiguration, RunResult};
use crate::api::store::VolumeStore;
use crate::config::ExecConfig;
use crate::core::error::{Error, ErrorKind};
use crate::core::help::parse_help;
use crate::core::options::{OptionDescriptor, parse_name_list};
use crate::native::protocol::LOAD_MODELS_KEY;

pub mod capture;
pub mod locate;
pub mod runfile;

use capture::{Captured, capture};
use locate::locate_executable;
use runfile::write_run_file;

pub const OUTPUT_KEY: &str = "output";
pub const LOG_FILE: &str = "logfile";

pub struct SubprocessEngineClient {
    executable: PathBuf,
    config: ExecConfig,
    options: BTreeMap<String, String>,
    store: Option<Box<dyn VolumeStore>>,
}

impl SubprocessEngineClient {
    pub fn new(config: ExecConfig) -> Result<Self, Error> {
        let executable = locate_executable(&config.candidates)?;
        Ok(Self {
            executable,
            config,
            options: BTreeMap::new(),
            store: None,
        })
    }

    /// Volume store used to stage input arrays and read output volumes.
    pub fn with_store(mut self, store: Box<dyn VolumeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn run_file_path(&self) -> PathBuf {
        self.config.workdir.join(&self.config.run_file_name)
    }

    pub fn query_methods(&self) -> Result<Vec<String>, Error> {
        Ok(parse_name_list(&self.run_help(&["--listmethods".to_string()])?))
    }

    pub fn query_models(&self) -> Result<Vec<String>, Error> {
        Ok(parse_name_list(&self.run_help(&["--listmodels".to_string()])?))
    }

    pub fn query_options(
        &self,
        method: Option<&str>,
        model: Option<&str>,
    ) -> Result<(Vec<OptionDescriptor>, String), Error> {
        let mut args = vec!["--help".to_string()];
        if let Some(method) = method {
            args.push(format!("--method={method}"));
        }
        if let Some(model) = model {
            args.push(format!("--model={model}"));
        }
        Ok(parse_help(&self.run_help(&args)?))
    }

    /// Quick synchronous invocation for discovery; stdout on success.
    fn run_help(&self, args: &[String]) -> Result<String, Error> {
        let mut full = Vec::with_capacity(args.len() + 1);
        if let Some(path) = self.options.get(LOAD_MODELS_KEY) {
            full.push(format!("--{LOAD_MODELS_KEY}={path}"));
        }
        full.extend(args.iter().cloned());
        let captured = capture(&self.executable, &full, None)?;
        if !captured.success() {
            return Err(subprocess_error("engine help invocation failed", captured));
        }
        Ok(captured.stdout)
    }

    fn store(&self, purpose: &str) -> Result<&dyn VolumeStore, Error> {
        self.store.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message(format!("a volume store is required to {purpose}"))
        })
    }

    /// Merge options and write any in-memory arrays next to the run file.
    fn stage(&self, config: &RunConfiguration) -> Result<BTreeMap<String, String>, Error> {
        let mut options = self.options.clone();
        options.extend(config.options().iter().map(|(k, v)| (k.clone(), v.clone())));
        if !config.has_arrays() {
            return Ok(options);
        }
        config.extent()?;
        let store = self.store("stage input volumes")?;
        let mut staged = BTreeSet::new();
        let mut claim = |key: &str| {
            let file = staged_file(store, key);
            if !staged.insert(file.clone()) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("array '{key}' would overwrite staged file {file}")));
            }
            Ok(file)
        };

        for (key, array) in config.data() {
            if options.values().any(|value| value == key) {
                continue;
            }
            let file = claim(key)?;
            store.save(&self.config.workdir.join(&file), array)?;
            options.insert(key.clone(), file);
        }
        if let Some(mask) = config.mask() {
            let referenced = options
                .get(MASK_KEY)
                .is_some_and(|value| self.config.workdir.join(value).is_file());
            if !referenced {
                let file = claim(MASK_KEY)?;
                let volume: ArrayD<f32> = mask.mapv(|set| if set { 1.0 } else { 0.0 });
                store.save(&self.config.workdir.join(&file), &volume)?;
                options.insert(MASK_KEY.to_string(), file);
            }
        }
        Ok(options)
    }

    fn collect_outputs(&self, output_dir: &Path, names: &[&str]) -> Result<BTreeMap<String, ArrayD<f32>>, Error> {
        let mut outputs = BTreeMap::new();
        if names.is_empty() {
            let Some(store) = self.store.as_deref() else {
                return Ok(outputs);
            };
            let entries = std::fs::read_dir(output_dir).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read output directory")
                    .with_path(output_dir)
                    .with_source(err)
            })?;
            let suffix = format!(".{}", store.extension());
            for entry in entries.flatten() {
                let path = entry.path();
                let Some(name) = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| name.strip_suffix(&suffix))
                else {
                    continue;
                };
                if !path.is_file() {
                    continue;
                }
                match store.load(&path) {
                    Ok(volume) => {
                        outputs.insert(name.to_string(), volume);
                    }
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable output"),
                }
            }
            return Ok(outputs);
        }

        let store = self.store("load run outputs")?;
        for name in names {
            let path = output_dir.join(format!("{name}.{}", store.extension()));
            outputs.insert(name.to_string(), store.load(&path)?);
        }
        Ok(outputs)
    }
}

impl std::fmt::Debug for SubprocessEngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessEngineClient")
            .field("executable", &self.executable)
            .field("config", &self.config)
            .field("options", &self.options)
            .field("store", &self.store.as_ref().map(|store| store.extension()))
            .finish()
    }
}

impl Introspector for SubprocessEngineClient {
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
        best_effort("get_options", self.query_options(method, model))
    }
}

impl EngineClient for SubprocessEngineClient {
    fn configure(&mut self, options: &BTreeMap<String, String>) -> Result<(), Error> {
        self.options
            .extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn run(&mut self, config: &RunConfiguration, outputs: &[&str]) -> Result<RunResult, Error> {
        std::fs::create_dir_all(&self.config.workdir).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to create work directory")
                .with_path(&self.config.workdir)
                .with_source(err)
        })?;
        let options = self.stage(config)?;
        let run_file = self.run_file_path();
        write_run_file(&run_file, &options)?;
        let workdir = run_file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        // The process runs inside the work directory, so every staged path is relative to it.
        let captured = capture(
            &self.executable,
            ["-f", self.config.run_file_name.as_str()],
            Some(workdir),
        )?;
        if !captured.success() {
            return Err(subprocess_error("engine run failed", captured).with_path(&run_file));
        }

        let output_dir = options
            .get(OUTPUT_KEY)
            .map(|dir| workdir.join(dir))
            .unwrap_or_else(|| workdir.to_path_buf());
        let log = match std::fs::read_to_string(output_dir.join(LOG_FILE)) {
            Ok(log) => log,
            Err(err) => {
                debug!(dir = %output_dir.display(), error = %err, "no logfile; using captured stdout");
                captured.stdout
            }
        };
        let outputs = self.collect_outputs(&output_dir, outputs)?;
        debug!(outputs = outputs.len(), "subprocess run complete");
        Ok(RunResult { outputs, log })
    }
}

/// File name, relative to the work directory, for a staged input volume.
fn staged_file(store: &dyn VolumeStore, key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{stem}.{}", store.extension())
}

fn subprocess_error(message: &str, captured: Captured) -> Error {
    Error::new(ErrorKind::Subprocess)
        .with_message(message)
        .with_exit_code(captured.exit_code)
        .with_stderr(captured.stderr)
}
