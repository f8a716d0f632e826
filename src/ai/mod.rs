//! Streaming AI providers for code generation.

mod client;
mod decoder;
mod prompts;

pub use client::*;
pub use decoder::{interpret, SseDecoder, StreamFrame};
pub use prompts::{format_generation_request, CODEGEN_SYSTEM_PROMPT};
