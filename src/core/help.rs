//! Purpose: Parse the engine's free-text `--help` output into option descriptors.
//! Exports: `parse_help`.
//! Role: CLI-side counterpart of the native options query.
//! Invariants: Never fails; malformed declarations are logged and skipped.
//! Invariants: Output depends only on the input text (deterministic).
//! Invariants: Reserved option names are dropped; the line after one is ordinary free text.
use tracing::warn;

use crate::core::options::{OptionDescriptor, is_reserved};

const DECLARATION_PREFIX: &str = "--";
const HEADERS: [&str; 3] = ["Usage", "Options", "Description"];

/// What the line after a declaration belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Pending {
    Nothing,
    Describe(usize),
}

/// Returns the recovered options and the remaining free text, one line per entry.
pub fn parse_help(text: &str) -> (Vec<OptionDescriptor>, String) {
    let mut options: Vec<OptionDescriptor> = Vec::new();
    let mut free_text: Vec<&str> = Vec::new();
    let mut pending = Pending::Nothing;

    for line in text.lines() {
        if let Some(declaration) = line.strip_prefix(DECLARATION_PREFIX) {
            pending = match parse_declaration(declaration) {
                Some(option) if is_reserved(&option.name) => Pending::Nothing,
                Some(option) => {
                    options.push(option);
                    Pending::Describe(options.len() - 1)
                }
                None => {
                    warn!(line, "skipping malformed option declaration");
                    Pending::Nothing
                }
            };
            continue;
        }

        let trimmed = line.trim();
        let previous = std::mem::replace(&mut pending, Pending::Nothing);
        if let (Pending::Describe(index), false) = (previous, trimmed.is_empty()) {
            options[index].description = trimmed.to_string();
            continue;
        }

        if trimmed.is_empty() || HEADERS.iter().any(|header| line.starts_with(header)) {
            continue;
        }
        free_text.push(trimmed);
    }

    (options, free_text.join("\n"))
}

/// `name [TYPE,MARKER,DEFAULT=value]` with brackets treated as separators.
fn parse_declaration(declaration: &str) -> Option<OptionDescriptor> {
    let normalized = declaration.replace('[', ",").replace(']', "");
    let tokens: Vec<&str> = normalized.split(',').map(str::trim).collect();
    if tokens.len() < 3 || tokens[0].is_empty() {
        return None;
    }
    let default = tokens[2..]
        .iter()
        .find_map(|token| token.strip_prefix("DEFAULT="))
        .unwrap_or_default();
    Some(OptionDescriptor {
        name: tokens[0].to_string(),
        kind: tokens[1].to_string(),
        optional: tokens[2] != "REQUIRED",
        default: default.to_string(),
        description: String::new(),
    })
}
