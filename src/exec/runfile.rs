// Run-description file: one `key=value` option per line, bare `key` for flags.
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::error::{Error, ErrorKind};

pub fn render_run_file(options: &BTreeMap<String, String>) -> Result<String, Error> {
    let mut text = String::new();
    for (key, value) in options {
        if key.is_empty() || key.contains(['=', '\n', '\r']) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("option key {key:?} cannot be written to a run file")));
        }
        if value.contains(['\n', '\r']) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("value of option '{key}' spans multiple lines")));
        }
        text.push_str(key);
        if !value.is_empty() {
            text.push('=');
            text.push_str(value);
        }
        text.push('\n');
    }
    Ok(text)
}

pub fn write_run_file(path: &Path, options: &BTreeMap<String, String>) -> Result<(), Error> {
    let text = render_run_file(options)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(parent).with_source(err))?;
    }
    std::fs::write(path, text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write run file")
            .with_path(path)
            .with_source(err)
    })
}
