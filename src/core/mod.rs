// Core modules: errors, scratch buffers, array marshalling, and option text parsing.
pub mod buffer;
pub mod error;
pub mod help;
pub mod marshal;
pub mod options;
