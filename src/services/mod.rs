//! Output and storage services used by the engine
//!
//! Alerts and display updates go out through sinks; the session is saved
//! through a key-value backend.

pub mod alerts;
pub mod persistence;

// Re-export main types
pub use alerts::{AlertDispatcher, ChannelSink, Notification, RecordingSink};
pub use persistence::{FileBackend, MemoryBackend, Store};
