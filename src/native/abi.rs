//! Purpose: The seam between engine handles and the native engine implementation.
//! Exports: `RawContext`, `EngineAbi`, `SharedLibraryEngine`.
//! Role: Safe, slice-based mirror of the C API; `SharedLibraryEngine` forwards to a loaded library.
//! Invariants: A `RawContext` passed to any method came from `new_context` on the same
//! Invariants: implementation and has not been destroyed; `EngineHandle` upholds this.
//! Invariants: Error buffers are at least `DEFAULT_ERROR_CAPACITY` bytes: the C API never
//! Invariants: receives their length.
//! Invariants: All FFI interaction is confined to this module + `sys`.
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_void};
use libloading::Library;
use tracing::debug;

use crate::core::buffer::write_c_text;
use crate::core::error::{Error, ErrorKind};
use crate::native::sys::{self, EngineSymbols};

/// Opaque engine context pointer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RawContext(NonNull<c_void>);

impl RawContext {
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Native engine operations. Negative return values signal failure with detail
/// written into `err`; text outputs are NUL-terminated within `out`.
pub trait EngineAbi {
    fn new_context(&self, err: &mut [u8]) -> Option<RawContext>;
    fn destroy(&self, ctx: RawContext);
    fn load_models(&self, ctx: RawContext, path: &CStr, err: &mut [u8]) -> c_int;
    fn set_extent(
        &self,
        ctx: RawContext,
        nx: c_int,
        ny: c_int,
        nz: c_int,
        mask: &[c_int],
        err: &mut [u8],
    ) -> c_int;
    fn set_opt(&self, ctx: RawContext, key: &CStr, value: &CStr, err: &mut [u8]) -> c_int;
    fn set_data(&self, ctx: RawContext, name: &CStr, size: c_int, data: &[f32], err: &mut [u8]) -> c_int;
    fn get_data_size(&self, ctx: RawContext, name: &CStr, err: &mut [u8]) -> c_int;
    fn get_data(&self, ctx: RawContext, name: &CStr, out: &mut [f32], err: &mut [u8]) -> c_int;
    fn run(&self, ctx: RawContext, log: &mut [u8], err: &mut [u8]) -> c_int;
    /// `selector` is `("method", name)` or `("model", name)`; `None` asks for general options.
    fn get_options(
        &self,
        ctx: RawContext,
        selector: Option<(&CStr, &CStr)>,
        out: &mut [u8],
        err: &mut [u8],
    ) -> c_int;
    fn get_models(&self, ctx: RawContext, out: &mut [u8], err: &mut [u8]) -> c_int;
    fn get_methods(&self, ctx: RawContext, out: &mut [u8], err: &mut [u8]) -> c_int;

    fn get_model_params(&self, _ctx: RawContext, _out: &mut [u8], err: &mut [u8]) -> c_int {
        write_c_text(err, "model parameter query is not supported by this engine");
        -1
    }
}

/// Engine loaded from a shared library at runtime.
pub struct SharedLibraryEngine {
    symbols: EngineSymbols,
    path: PathBuf,
    _library: Library,
}

impl SharedLibraryEngine {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let library = unsafe { Library::new(path) }.map_err(|err| {
            Error::new(ErrorKind::Library)
                .with_message("failed to load engine library")
                .with_path(path)
                .with_source(err)
        })?;
        let symbols = unsafe { EngineSymbols::resolve(&library) }.map_err(|err| err.with_path(path))?;
        debug!(path = %path.display(), params = symbols.get_model_params.is_some(), "loaded engine library");
        Ok(Self {
            symbols,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn char_ptr(buf: &mut [u8]) -> *mut c_char {
    buf.as_mut_ptr().cast()
}

fn capacity(buf: &[u8]) -> c_int {
    c_int::try_from(buf.len()).unwrap_or(c_int::MAX)
}

impl EngineAbi for SharedLibraryEngine {
    fn new_context(&self, err: &mut [u8]) -> Option<RawContext> {
        RawContext::new(unsafe { (self.symbols.new)(char_ptr(err)) })
    }

    fn destroy(&self, ctx: RawContext) {
        unsafe { (self.symbols.destroy)(ctx.as_ptr()) }
    }

    fn load_models(&self, ctx: RawContext, path: &CStr, err: &mut [u8]) -> c_int {
        unsafe { (self.symbols.load_models)(ctx.as_ptr(), path.as_ptr(), char_ptr(err)) }
    }

    fn set_extent(
        &self,
        ctx: RawContext,
        nx: c_int,
        ny: c_int,
        nz: c_int,
        mask: &[c_int],
        err: &mut [u8],
    ) -> c_int {
        unsafe { (self.symbols.set_extent)(ctx.as_ptr(), nx, ny, nz, mask.as_ptr(), char_ptr(err)) }
    }

    fn set_opt(&self, ctx: RawContext, key: &CStr, value: &CStr, err: &mut [u8]) -> c_int {
        unsafe { (self.symbols.set_opt)(ctx.as_ptr(), key.as_ptr(), value.as_ptr(), char_ptr(err)) }
    }

    fn set_data(&self, ctx: RawContext, name: &CStr, size: c_int, data: &[f32], err: &mut [u8]) -> c_int {
        unsafe {
            (self.symbols.set_data)(ctx.as_ptr(), name.as_ptr(), size, data.as_ptr(), char_ptr(err))
        }
    }

    fn get_data_size(&self, ctx: RawContext, name: &CStr, err: &mut [u8]) -> c_int {
        unsafe { (self.symbols.get_data_size)(ctx.as_ptr(), name.as_ptr(), char_ptr(err)) }
    }

    fn get_data(&self, ctx: RawContext, name: &CStr, out: &mut [f32], err: &mut [u8]) -> c_int {
        unsafe {
            (self.symbols.get_data)(ctx.as_ptr(), name.as_ptr(), out.as_mut_ptr(), char_ptr(err))
        }
    }

    fn run(&self, ctx: RawContext, log: &mut [u8], err: &mut [u8]) -> c_int {
        unsafe { (self.symbols.dorun)(ctx.as_ptr(), capacity(log), char_ptr(log), char_ptr(err)) }
    }

    fn get_options(
        &self,
        ctx: RawContext,
        selector: Option<(&CStr, &CStr)>,
        out: &mut [u8],
        err: &mut [u8],
    ) -> c_int {
        let (key, value) = match selector {
            Some((key, value)) => (key.as_ptr(), value.as_ptr()),
            None => (ptr::null(), ptr::null()),
        };
        unsafe {
            (self.symbols.get_options)(ctx.as_ptr(), key, value, capacity(out), char_ptr(out), char_ptr(err))
        }
    }

    fn get_models(&self, ctx: RawContext, out: &mut [u8], err: &mut [u8]) -> c_int {
        list(self.symbols.get_models, ctx, out, err)
    }

    fn get_methods(&self, ctx: RawContext, out: &mut [u8], err: &mut [u8]) -> c_int {
        list(self.symbols.get_methods, ctx, out, err)
    }

    fn get_model_params(&self, ctx: RawContext, out: &mut [u8], err: &mut [u8]) -> c_int {
        match self.symbols.get_model_params {
            Some(call) => list(call, ctx, out, err),
            None => {
                write_c_text(err, "fabber_get_model_params is not exported by the engine library");
                -1
            }
        }
    }
}

fn list(call: sys::FabberList, ctx: RawContext, out: &mut [u8], err: &mut [u8]) -> c_int {
    unsafe { call(ctx.as_ptr(), capacity(out), char_ptr(out), char_ptr(err)) }
}
