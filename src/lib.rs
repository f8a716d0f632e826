//! codegen-stream - Incremental parsing of streamed LLM code generations.
//!
//! Model output is parsed as it streams for `<message>`, `<file>`,
//! `<action>` and `<plan>` directive blocks. Completed files are written,
//! actions are dispatched through a capability registry, and progress is
//! reported as directive events.

pub mod ai;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod generation;
pub mod parser;
pub mod server;
