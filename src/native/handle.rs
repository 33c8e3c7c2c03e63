//! Purpose: Own one native engine context and turn status codes into structured errors.
//! Exports: `EngineHandle`.
//! Role: Sole owner of the context pointer and its two scratch buffers.
//! Invariants: The context is destroyed exactly once: by `destroy` or, failing that, on drop.
//! Invariants: Error text is captured immediately after the failing call, before any other call.
//! Invariants: Calls on a destroyed handle are usage errors and never reach the engine.
use std::ffi::CString;
use std::rc::Rc;

use libc::c_int;
use tracing::{debug, warn};

use crate::core::buffer::{BufferArena, DEFAULT_ERROR_CAPACITY};
use crate::core::error::{Error, ErrorKind};
use crate::native::abi::{EngineAbi, RawContext};
use crate::native::executor::Stage;

pub struct EngineHandle {
    abi: Rc<dyn EngineAbi>,
    ctx: Option<RawContext>,
    arena: BufferArena,
    pub(crate) stage: Stage,
}

impl EngineHandle {
    /// Error buffers below the engine's fixed message size are raised to it.
    pub fn create(
        abi: Rc<dyn EngineAbi>,
        error_capacity: usize,
        output_capacity: usize,
    ) -> Result<Self, Error> {
        let mut arena = BufferArena::new(error_capacity.max(DEFAULT_ERROR_CAPACITY), output_capacity);
        arena.reset();
        let Some(ctx) = abi.new_context(arena.error_mut()) else {
            let message = arena.error().text();
            return Err(Error::new(ErrorKind::Creation)
                .with_operation("fabber_new")
                .with_message(if message.is_empty() {
                    "engine returned a null context".to_string()
                } else {
                    message
                }));
        };
        debug!(output_capacity, "created engine context");
        Ok(Self {
            abi,
            ctx: Some(ctx),
            arena,
            stage: Stage::Created,
        })
    }

    pub fn is_live(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn output_capacity(&self) -> usize {
        self.arena.output().capacity()
    }

    /// Invoke one native operation. `op` receives `(abi, ctx, output, error)` buffers.
    pub fn call<F>(&mut self, operation: &'static str, op: F) -> Result<c_int, Error>
    where
        F: FnOnce(&dyn EngineAbi, RawContext, &mut [u8], &mut [u8]) -> c_int,
    {
        let Some(ctx) = self.ctx else {
            return Err(Error::new(ErrorKind::Usage)
                .with_operation(operation)
                .with_message("engine handle already destroyed"));
        };
        self.arena.reset();
        let (output, error) = self.arena.split_mut();
        let status = op(self.abi.as_ref(), ctx, output, error);
        if status < 0 {
            let message = self.arena.error().text();
            debug!(operation, status, %message, "native call failed");
            return Err(Error::native_call(status, message).with_operation(operation));
        }
        debug!(operation, status, "native call");
        Ok(status)
    }

    /// Text left in the output buffer by the last call.
    pub fn output_text(&self, operation: &'static str) -> String {
        let output = self.arena.output();
        if output.is_saturated() {
            warn!(
                operation,
                capacity = output.capacity(),
                "engine output filled the buffer and may be truncated"
            );
        }
        output.text()
    }

    pub fn destroy(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.abi.destroy(ctx);
            debug!("destroyed engine context");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("live", &self.ctx.is_some())
            .field("stage", &self.stage)
            .finish()
    }
}

pub(crate) fn c_string(value: &str, what: &str) -> Result<CString, Error> {
    CString::new(value).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{what} contains an interior NUL byte"))
            .with_source(err)
    })
}
