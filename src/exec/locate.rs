// Executable discovery over an explicit, ordered candidate list.
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{Error, ErrorKind};

/// First candidate that is an existing regular file, made absolute against the
/// current directory so it still resolves when a run changes the child's cwd.
pub fn locate_executable(candidates: &[PathBuf]) -> Result<PathBuf, Error> {
    for candidate in candidates {
        if is_regular_file(candidate) {
            let path = std::path::absolute(candidate).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to resolve engine executable path")
                    .with_path(candidate)
                    .with_source(err)
            })?;
            debug!(path = %path.display(), "found engine executable");
            return Ok(path);
        }
        debug!(path = %candidate.display(), "engine executable candidate rejected");
    }
    let tried = candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::new(ErrorKind::ExecutableNotFound).with_message(if tried.is_empty() {
        "no executable candidates configured".to_string()
    } else {
        format!("none of the candidates exist: {tried}")
    }))
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file())
}
