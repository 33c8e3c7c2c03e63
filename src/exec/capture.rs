// Launch the engine executable and collect its output in one blocking step.
// `Command::output` drains stdout and stderr concurrently while waiting, so a child
// that fills either pipe cannot stall the wait.
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};

use bstr::ByteSlice;
use tracing::debug;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Captured {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub fn capture<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> Result<Captured, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    debug!(command = ?cmd, "launching engine executable");

    let output = cmd.output().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to launch engine executable")
            .with_path(program)
            .with_source(err)
    })?;
    let captured = Captured {
        exit_code: output.status.code(),
        stdout: output.stdout.to_str_lossy().into_owned(),
        stderr: output.stderr.to_str_lossy().into_owned(),
    };
    debug!(
        exit_code = ?captured.exit_code,
        stdout_bytes = output.stdout.len(),
        stderr_bytes = output.stderr.len(),
        "engine executable exited"
    );
    Ok(captured)
}

#[cfg(all(test, unix))]
mod tests {
    use super::capture;
    use crate::core::error::ErrorKind;
    use std::path::Path;

    #[test]
    fn captures_both_streams_and_exit_code() {
        let captured = capture(
            Path::new("/bin/sh"),
            ["-c", "echo out; echo err >&2; exit 3"],
            None,
        )
        .expect("capture");
        assert_eq!(captured.exit_code, Some(3));
        assert_eq!(captured.stdout, "out\n");
        assert_eq!(captured.stderr, "err\n");
        assert!(!captured.success());
    }

    #[test]
    fn large_output_on_both_pipes_does_not_block() {
        let script = "head -c 300000 /dev/zero | tr '\\0' o; head -c 300000 /dev/zero | tr '\\0' e >&2";
        let captured = capture(Path::new("/bin/sh"), ["-c", script], None).expect("capture");
        assert!(captured.success());
        assert_eq!(captured.stdout.len(), 300000);
        assert_eq!(captured.stderr.len(), 300000);
    }

    #[test]
    fn runs_in_requested_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let captured = capture(Path::new("/bin/sh"), ["-c", "pwd -P"], Some(temp.path())).expect("capture");
        let expected = temp.path().canonicalize().expect("canonical");
        assert_eq!(captured.stdout.trim(), expected.to_string_lossy());
    }

    #[test]
    fn missing_program_is_io_error() {
        let err = capture(Path::new("/nonexistent/fabber"), ["--help"], None).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
