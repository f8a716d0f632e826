//! Incremental parser for code-generation directives.
//!
//! Model output arrives as text chunks containing `<message>`, `<file>`,
//! `<action>` and `<plan>` blocks. [`StreamProcessor`] extracts them as they
//! complete, writes files, invokes actions and reports everything as
//! [`DirectiveEvent`]s.

mod action;
mod buffer;
mod events;
mod file;
mod processor;
mod result;
mod tags;
mod text;

pub use action::parse_arguments;
pub use buffer::StreamBuffer;
pub use events::{DirectiveEvent, EventPayload, EventSink};
pub use file::file_content;
pub use processor::StreamProcessor;
pub use result::GenerationResult;
pub use tags::{OpenTag, TagKind, TagScan, MAX_OPEN_TAG_LEN};
