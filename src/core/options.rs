//! Purpose: Option descriptor value type and the decoders shared by both backends.
//! Exports: `OptionDescriptor`, `RESERVED_OPTIONS`, `is_reserved`, `parse_option_records`, `parse_name_list`.
//! Role: Common vocabulary for native and CLI introspection.
//! Invariants: A descriptor returned to callers never carries a reserved name.
//! Invariants: Native records are tab-separated `name, description, type, optional, default`.
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Structural options: set by the client itself, never by the user.
pub const RESERVED_OPTIONS: [&str; 8] = [
    "data",
    "data<n>",
    "mask",
    "help",
    "model",
    "method",
    "listmodels",
    "listmethods",
];

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OptionDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub optional: bool,
    pub default: String,
    pub description: String,
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_OPTIONS.contains(&name)
}

/// Decode the newline/tab record block written by the native options query.
pub fn parse_option_records(text: &str) -> Vec<OptionDescriptor> {
    let mut options = Vec::new();
    for record in text.lines() {
        if record.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.split('\t').collect();
        let [name, description, kind, optional, default] = fields.as_slice() else {
            warn!(fields = fields.len(), record, "skipping malformed option record");
            continue;
        };
        if is_reserved(name) {
            continue;
        }
        options.push(OptionDescriptor {
            name: name.to_string(),
            kind: kind.to_string(),
            optional: *optional == "1",
            default: default.to_string(),
            description: description.to_string(),
        });
    }
    options
}

/// Method/model listings: one name per whitespace-separated token.
pub fn parse_name_list(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
