//! Purpose: Client library for the Fabber model-fitting engine.
//! Exports: `api` (backend-neutral surface), `native` and `exec` backends, `config`, `logging`.
//! Role: Drives the engine either through its shared library or its standalone executable.
//! Invariants: Both backends implement the same `EngineClient` and `Introspector` traits.
//! Invariants: Native calls happen only through `native::handle::EngineHandle`.
pub mod api;
pub mod config;
pub mod core;
pub mod exec;
pub mod logging;
pub mod native;
