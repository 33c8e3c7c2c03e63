//! Purpose: Structured error type shared by both engine backends.
//! Exports: `Error`, `ErrorKind`, `ApiResult`.
//! Role: Every fatal path surfaces one of these; raw native status codes never escape.
//! Invariants: `NativeCall` errors carry the status code and the error-buffer text
//! Invariants: captured at the moment of failure.
//! Invariants: `Configuration` errors wrap the failing `NativeCall` error as their source.
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Creation,
    NativeCall,
    Configuration,
    Usage,
    ExecutableNotFound,
    Subprocess,
    ShapeMismatch,
    Library,
    Io,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    operation: Option<&'static str>,
    path: Option<PathBuf>,
    status: Option<i32>,
    exit_code: Option<i32>,
    stderr: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            operation: None,
            path: None,
            status: None,
            exit_code: None,
            stderr: None,
            source: None,
        }
    }

    /// Failure of a single native call: status code plus captured error text.
    pub fn native_call(status: i32, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NativeCall)
            .with_status(status)
            .with_message(message)
    }

    /// Promote a native-call failure raised while applying options.
    pub fn configuration(cause: Error) -> Self {
        let mut err = Self::new(ErrorKind::Configuration);
        err.message = cause.message.clone();
        err.operation = cause.operation;
        err.status = cause.status;
        err.with_source(cause)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn operation(&self) -> Option<&'static str> {
        self.operation
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Negative status returned by the native engine, if any.
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    /// Exit code of the engine executable; `None` when it was killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(operation) = self.operation {
            write!(f, " in {operation}")?;
        }
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        match self.exit_code {
            Some(code) => write!(f, " (exit code: {code})")?,
            None if self.kind == ErrorKind::Subprocess => write!(f, " (terminated by signal)")?,
            None => {}
        }
        if let Some(stderr) = &self.stderr {
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                write!(f, "\n{stderr}")?;
            }
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};
    use std::error::Error as _;

    #[test]
    fn native_call_keeps_status_and_message() {
        let err = Error::native_call(-1, "bad option").with_operation("fabber_set_opt");
        assert_eq!(err.kind(), ErrorKind::NativeCall);
        assert_eq!(err.status(), Some(-1));
        assert_eq!(err.message(), Some("bad option"));
        assert_eq!(
            err.to_string(),
            "NativeCall in fabber_set_opt (status -1): bad option"
        );
    }

    #[test]
    fn configuration_wraps_native_cause() {
        let cause = Error::native_call(-3, "unknown model").with_operation("fabber_set_opt");
        let err = Error::configuration(cause);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.status(), Some(-3));
        assert_eq!(err.message(), Some("unknown model"));

        let source = err.source().expect("source");
        let source = source.downcast_ref::<Error>().expect("engine error");
        assert_eq!(source.kind(), ErrorKind::NativeCall);
    }

    #[test]
    fn subprocess_display_includes_exit_code_and_stderr() {
        let err = Error::new(ErrorKind::Subprocess)
            .with_message("engine run failed")
            .with_exit_code(Some(1))
            .with_stderr("Invalid_option exception caught in fabber\n");
        let text = err.to_string();
        assert!(text.contains("exit code: 1"));
        assert!(text.ends_with("Invalid_option exception caught in fabber"));

        let killed = Error::new(ErrorKind::Subprocess).with_exit_code(None);
        assert!(killed.to_string().contains("terminated by signal"));
    }
}
