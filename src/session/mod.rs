//! Generation sessions.
//!
//! Turns the chunked event stream of a generation run into a lifecycle and
//! stage state machine:
//! - `frames`: chunk-boundary tolerant frame decoding
//! - `events`: typed events, message log entries and stage inference
//! - `machine`: the cancellable, single-flight session driver

mod events;
mod frames;
mod machine;

pub use events::{Lifecycle, Stage};
pub use machine::{ByteStream, GenerationSession, GenerationTransport, Session};
