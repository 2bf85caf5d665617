//! Sensor History Buffer
//!
//! Provides the bounded, insertion-ordered buffer of recent history entries
//! that backs the live chart and the trip analysis snapshot.

mod buffer;

pub use buffer::{HistoryBuffer, DEFAULT_CAPACITY};
