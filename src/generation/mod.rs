//! Generation lifecycle: running a stream through the parser and keeping
//! results around for polling.

mod runner;
mod store;

pub use runner::{drive, GenerationError, Generator};
pub use store::{
    Clock, GenerationRecord, GenerationStatus, GenerationStore, RecordingSink, SystemClock,
    EVENT_CHANNEL_CAPACITY,
};
