// Raw C signatures of the engine's simplified API, resolved from a shared library.
use libc::{c_char, c_float, c_int, c_void};
use libloading::Library;

use crate::core::error::{Error, ErrorKind};

pub type FabberNew = unsafe extern "C" fn(errbuf: *mut c_char) -> *mut c_void;
pub type FabberDestroy = unsafe extern "C" fn(fab: *mut c_void);
pub type FabberLoadModels =
    unsafe extern "C" fn(fab: *mut c_void, libpath: *const c_char, errbuf: *mut c_char) -> c_int;
pub type FabberSetExtent = unsafe extern "C" fn(
    fab: *mut c_void,
    nx: c_int,
    ny: c_int,
    nz: c_int,
    mask: *const c_int,
    errbuf: *mut c_char,
) -> c_int;
pub type FabberSetOpt = unsafe extern "C" fn(
    fab: *mut c_void,
    key: *const c_char,
    value: *const c_char,
    errbuf: *mut c_char,
) -> c_int;
pub type FabberSetData = unsafe extern "C" fn(
    fab: *mut c_void,
    name: *const c_char,
    data_size: c_int,
    data: *const c_float,
    errbuf: *mut c_char,
) -> c_int;
pub type FabberGetDataSize =
    unsafe extern "C" fn(fab: *mut c_void, name: *const c_char, errbuf: *mut c_char) -> c_int;
pub type FabberGetData = unsafe extern "C" fn(
    fab: *mut c_void,
    name: *const c_char,
    data: *mut c_float,
    errbuf: *mut c_char,
) -> c_int;
pub type FabberDorun = unsafe extern "C" fn(
    fab: *mut c_void,
    log_bufsize: c_int,
    log_buf: *mut c_char,
    errbuf: *mut c_char,
) -> c_int;
pub type FabberGetOptions = unsafe extern "C" fn(
    fab: *mut c_void,
    key: *const c_char,
    value: *const c_char,
    out_bufsize: c_int,
    out_buf: *mut c_char,
    errbuf: *mut c_char,
) -> c_int;
/// Shared shape of the listing calls (models, methods, model parameters).
pub type FabberList = unsafe extern "C" fn(
    fab: *mut c_void,
    out_bufsize: c_int,
    out_buf: *mut c_char,
    errbuf: *mut c_char,
) -> c_int;

/// Function table copied out of the library; valid while the `Library` stays loaded.
#[derive(Clone, Copy)]
pub struct EngineSymbols {
    pub new: FabberNew,
    pub destroy: FabberDestroy,
    pub load_models: FabberLoadModels,
    pub set_extent: FabberSetExtent,
    pub set_opt: FabberSetOpt,
    pub set_data: FabberSetData,
    pub get_data_size: FabberGetDataSize,
    pub get_data: FabberGetData,
    pub dorun: FabberDorun,
    pub get_options: FabberGetOptions,
    pub get_models: FabberList,
    pub get_methods: FabberList,
    pub get_model_params: Option<FabberList>,
}

impl EngineSymbols {
    /// # Safety
    /// The library must export each symbol with exactly the signature declared above.
    pub unsafe fn resolve(library: &Library) -> Result<Self, Error> {
        unsafe {
            Ok(Self {
                new: symbol(library, b"fabber_new\0")?,
                destroy: symbol(library, b"fabber_destroy\0")?,
                load_models: symbol(library, b"fabber_load_models\0")?,
                set_extent: symbol(library, b"fabber_set_extent\0")?,
                set_opt: symbol(library, b"fabber_set_opt\0")?,
                set_data: symbol(library, b"fabber_set_data\0")?,
                get_data_size: symbol(library, b"fabber_get_data_size\0")?,
                get_data: symbol(library, b"fabber_get_data\0")?,
                dorun: symbol(library, b"fabber_dorun\0")?,
                get_options: symbol(library, b"fabber_get_options\0")?,
                get_models: symbol(library, b"fabber_get_models\0")?,
                get_methods: symbol(library, b"fabber_get_methods\0")?,
                get_model_params: symbol(library, b"fabber_get_model_params\0").ok(),
            })
        }
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static [u8]) -> Result<T, Error> {
    let symbol = unsafe { library.get::<T>(name) }.map_err(|err| {
        Error::new(ErrorKind::Library)
            .with_message(format!(
                "missing symbol {}",
                String::from_utf8_lossy(&name[..name.len() - 1])
            ))
            .with_source(err)
    })?;
    Ok(*symbol)
}
