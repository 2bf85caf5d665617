//! Sensor Model
//!
//! Types shared by the monitoring pipeline:
//! - `Sample`: one full reading produced per sampling tick
//! - `HistoryEntry`: the motion subset retained for charting and trip analysis
//! - `Location`, `RoadContext`: position and environment attached to a sample

mod context;
mod sample;

pub use context::{RoadClass, RoadContext, Weather};
pub use sample::{HistoryEntry, Location, Sample, Vector3};

/// Milliseconds since the Unix epoch, as used for every sample timestamp
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
