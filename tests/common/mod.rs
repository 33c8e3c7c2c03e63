// Shared fixtures: an in-memory native engine, a JSON volume store, and a scripted executable.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use fabber_client::api::{EngineAbi, Error, ErrorKind, OptionDescriptor, RawContext, VolumeStore};
use fabber_client::core::buffer::write_c_text;
use libc::{c_int, c_void};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

pub fn descriptor(name: &str, kind: &str, optional: bool, default: &str, description: &str) -> OptionDescriptor {
    OptionDescriptor {
        name: name.to_string(),
        kind: kind.to_string(),
        optional,
        default: default.to_string(),
        description: description.to_string(),
    }
}

/// General engine options as both backends describe them; `data` and `mask` are reserved.
pub fn general_options() -> Vec<OptionDescriptor> {
    vec![
        descriptor("data", "IMAGE", false, "", "Input data file"),
        descriptor("mask", "IMAGE", true, "", "Mask file"),
        descriptor("output", "STR", false, "", "Output directory"),
        descriptor("max-iterations", "INT", true, "10", "Number of iterations of VB to use"),
        descriptor("save-mean", "BOOL", true, "", "Output the parameter means"),
    ]
}

pub fn poly_options() -> Vec<OptionDescriptor> {
    vec![descriptor("degree", "INT", false, "", "Maximum power in the polynomial")]
}

pub fn vb_options() -> Vec<OptionDescriptor> {
    vec![descriptor("noise", "STR", true, "white", "Noise model")]
}

/// Native record block: `name, description, type, optional, default`.
pub fn render_records(options: &[OptionDescriptor]) -> String {
    options
        .iter()
        .map(|option| {
            format!(
                "{}\t{}\t{}\t{}\t{}\n",
                option.name,
                option.description,
                option.kind,
                if option.optional { 1 } else { 0 },
                option.default
            )
        })
        .collect()
}

/// `--help` text in the executable's bracketed declaration style.
pub fn render_help(title: &str, options: &[OptionDescriptor]) -> String {
    let mut text = format!("{title}\n\nUsage: fabber --output=DIR --data=FILE [options]\n\nOptions:\n\n");
    for option in options {
        let marker = if option.optional { "NOT REQUIRED" } else { "REQUIRED" };
        let default = if option.default.is_empty() {
            "NO DEFAULT".to_string()
        } else {
            format!("DEFAULT={}", option.default)
        };
        text.push_str(&format!("--{} [{},{},{}]\n", option.name, option.kind, marker, default));
        text.push_str(&format!("\t{}\n\n", option.description));
    }
    text
}

/// In-memory engine: the fit result `mean` is the per-voxel mean over the vector axis,
/// zero outside the mask.
#[derive(Default)]
pub struct FakeEngine {
    pub refuse_create: bool,
    pub live: Cell<usize>,
    pub destroyed: Cell<usize>,
    pub calls: RefCell<Vec<String>>,
    pub options: RefCell<BTreeMap<String, String>>,
    pub loaded_models: RefCell<Vec<String>>,
    pub extent: RefCell<Option<(c_int, c_int, c_int, Vec<c_int>)>>,
    pub data: RefCell<BTreeMap<String, (usize, Vec<f32>)>>,
    pub outputs: RefCell<BTreeMap<String, (usize, Vec<f32>)>>,
    pub log: String,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            log: "fit complete".to_string(),
            ..Self::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }

    fn fail(err: &mut [u8], message: &str) -> c_int {
        write_c_text(err, message);
        -1
    }

    fn text(value: &CStr) -> String {
        value.to_string_lossy().into_owned()
    }
}

impl EngineAbi for FakeEngine {
    fn new_context(&self, err: &mut [u8]) -> Option<RawContext> {
        if self.refuse_create {
            write_c_text(err, "engine licence check failed");
            return None;
        }
        self.live.set(self.live.get() + 1);
        RawContext::new(NonNull::<c_void>::dangling().as_ptr())
    }

    fn destroy(&self, _ctx: RawContext) {
        self.live.set(self.live.get().saturating_sub(1));
        self.destroyed.set(self.destroyed.get() + 1);
    }

    fn load_models(&self, _ctx: RawContext, path: &CStr, err: &mut [u8]) -> c_int {
        self.record("load_models");
        let path = Self::text(path);
        if !path.ends_with(".so") {
            return Self::fail(err, "not a model library");
        }
        self.loaded_models.borrow_mut().push(path);
        0
    }

    fn set_extent(&self, _ctx: RawContext, nx: c_int, ny: c_int, nz: c_int, mask: &[c_int], err: &mut [u8]) -> c_int {
        self.record("set_extent");
        if (nx * ny * nz) as usize != mask.len() {
            return Self::fail(err, "mask length does not match extent");
        }
        *self.extent.borrow_mut() = Some((nx, ny, nz, mask.to_vec()));
        0
    }

    fn set_opt(&self, _ctx: RawContext, key: &CStr, value: &CStr, err: &mut [u8]) -> c_int {
        self.record("set_opt");
        let key = Self::text(key);
        if key == "model" && Self::text(value) == "missing" {
            return Self::fail(err, "Unrecognized forward model: missing");
        }
        self.options.borrow_mut().insert(key, Self::text(value));
        0
    }

    fn set_data(&self, _ctx: RawContext, name: &CStr, size: c_int, data: &[f32], err: &mut [u8]) -> c_int {
        self.record("set_data");
        if size < 1 {
            return Self::fail(err, "data size must be positive");
        }
        self.data
            .borrow_mut()
            .insert(Self::text(name), (size as usize, data.to_vec()));
        0
    }

    fn get_data_size(&self, _ctx: RawContext, name: &CStr, err: &mut [u8]) -> c_int {
        self.record("get_data_size");
        match self.outputs.borrow().get(&Self::text(name)) {
            Some((size, _)) => *size as c_int,
            None => Self::fail(err, "no such output"),
        }
    }

    fn get_data(&self, _ctx: RawContext, name: &CStr, out: &mut [f32], err: &mut [u8]) -> c_int {
        self.record("get_data");
        match self.outputs.borrow().get(&Self::text(name)) {
            Some((_, values)) if values.len() == out.len() => {
                out.copy_from_slice(values);
                0
            }
            Some(_) => Self::fail(err, "output buffer has the wrong length"),
            None => Self::fail(err, "no such output"),
        }
    }

    fn run(&self, _ctx: RawContext, log: &mut [u8], err: &mut [u8]) -> c_int {
        self.record("run");
        let extent = self.extent.borrow();
        let Some((_, _, _, mask)) = extent.as_ref() else {
            return Self::fail(err, "extent not set");
        };
        let data_name = self.options.borrow().get("data").cloned().unwrap_or_else(|| "data".to_string());
        let inputs = self.data.borrow();
        let Some((size, values)) = inputs.get(&data_name) else {
            return Self::fail(err, "no data");
        };
        let mean: Vec<f32> = mask
            .iter()
            .enumerate()
            .map(|(voxel, &set)| {
                if set == 0 {
                    return 0.0;
                }
                let series = &values[voxel * size..(voxel + 1) * size];
                series.iter().sum::<f32>() / *size as f32
            })
            .collect();
        self.outputs.borrow_mut().insert("mean".to_string(), (1, mean));
        self.outputs
            .borrow_mut()
            .insert("modelfit".to_string(), (*size, values.clone()));
        write_c_text(log, &self.log);
        0
    }

    fn get_options(&self, _ctx: RawContext, selector: Option<(&CStr, &CStr)>, out: &mut [u8], err: &mut [u8]) -> c_int {
        self.record("get_options");
        let options = match selector.map(|(key, value)| (Self::text(key), Self::text(value))) {
            None => general_options(),
            Some((key, value)) if key == "model" && value == "poly" => poly_options(),
            Some((key, value)) if key == "method" && value == "vb" => vb_options(),
            Some((_, value)) => return Self::fail(err, &format!("unknown: {value}")),
        };
        write_c_text(out, &render_records(&options));
        0
    }

    fn get_models(&self, _ctx: RawContext, out: &mut [u8], _err: &mut [u8]) -> c_int {
        self.record("get_models");
        let mut models = vec!["linear".to_string(), "poly".to_string()];
        models.extend(self.loaded_models.borrow().iter().map(|_| "asl".to_string()));
        write_c_text(out, &models.join("\n"));
        0
    }

    fn get_methods(&self, _ctx: RawContext, out: &mut [u8], _err: &mut [u8]) -> c_int {
        self.record("get_methods");
        write_c_text(out, "nlls\nspatialvb\nvb\n");
        0
    }

    fn get_model_params(&self, _ctx: RawContext, out: &mut [u8], err: &mut [u8]) -> c_int {
        self.record("get_model_params");
        match self.options.borrow().get("model").map(String::as_str) {
            Some("poly") => {
                write_c_text(out, "c0 c1 c2");
                0
            }
            _ => Self::fail(err, "no model configured"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct JsonVolume {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Volumes as `{"shape": [...], "data": [...]}` in logical row-major order.
pub struct JsonStore;

impl VolumeStore for JsonStore {
    fn extension(&self) -> &str {
        "json"
    }

    fn load(&self, path: &Path) -> Result<ArrayD<f32>, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
        let volume: JsonVolume = serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("invalid volume file")
                .with_path(path)
                .with_source(err)
        })?;
        ArrayD::from_shape_vec(IxDyn(&volume.shape), volume.data).map_err(|err| {
            Error::new(ErrorKind::ShapeMismatch)
                .with_path(path)
                .with_source(err)
        })
    }

    fn save(&self, path: &Path, volume: &ArrayD<f32>) -> Result<(), Error> {
        let record = JsonVolume {
            shape: volume.shape().to_vec(),
            data: volume.iter().copied().collect(),
        };
        let text = serde_json::to_string(&record).map_err(|err| Error::new(ErrorKind::Internal).with_source(err))?;
        std::fs::write(path, text).map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))
    }
}

/// Shell stand-in for the engine executable. Help text is served from `help_dir`:
/// `general.txt`, `model-<name>.txt`, `method-<name>.txt`. `--listmodels` adds `asl`
/// when `--loadmodels=<lib>` is passed. A run copies the `data`
/// volume to `<output>/modelfit.json`, writes a logfile, and fails with exit code 2
/// when the run file sets `fail`.
#[cfg(unix)]
pub fn write_fake_executable(dir: &Path, help_dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
help="{help}"
case "$*" in
  *--listmethods*) printf 'nlls\nspatialvb\nvb\n'; exit 0 ;;
  *--listmodels*)
    printf 'linear\npoly\n'
    case "$*" in *--loadmodels=*) echo asl ;; esac
    exit 0 ;;
  *--help*)
    for arg in "$@"; do
      case "$arg" in
        --method=*) cat "$help/method-${{arg#--method=}}.txt" || exit 1; exit 0 ;;
        --model=*) cat "$help/model-${{arg#--model=}}.txt" || exit 1; exit 0 ;;
      esac
    done
    cat "$help/general.txt"; exit 0 ;;
esac
if [ "$1" != "-f" ]; then echo "usage: fabber -f FILE" >&2; exit 64; fi
out=.
data=
while IFS='=' read -r key value; do
  case "$key" in
    output) out="$value" ;;
    data) data="$value" ;;
    fail) echo "Invalid option: fail" >&2; exit 2 ;;
  esac
done < "$2"
mkdir -p "$out"
echo "----------------------" > "$out/logfile"
echo "run file: $2" >> "$out/logfile"
if [ -n "$data" ]; then cp "$data" "$out/modelfit.json"; fi
echo "done"
"#,
        help = help_dir.display()
    );
    let path = dir.join("fabber");
    std::fs::write(&path, script).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

/// Populate a help directory mirroring the native option fixtures.
pub fn write_help_fixtures(dir: &Path) {
    std::fs::create_dir_all(dir).expect("help dir");
    std::fs::write(dir.join("general.txt"), render_help("Fabber: model fitting", &general_options())).expect("general");
    std::fs::write(dir.join("model-poly.txt"), render_help("Polynomial model", &poly_options())).expect("poly");
    std::fs::write(dir.join("method-vb.txt"), render_help("Variational Bayes", &vb_options())).expect("vb");
}
