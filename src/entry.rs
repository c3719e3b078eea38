use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// A single position sample. `created_at` is stamped by the store on append
/// and is not part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Entry {
    #[serde(rename = "lat")]
    pub latitude: f32,
    #[serde(rename = "lng")]
    pub longitude: f32,
    #[serde(skip)]
    pub created_at: u64,
}

impl Entry {
    pub fn new(latitude: f32, longitude: f32) -> Self {
        Entry {
            latitude,
            longitude,
            created_at: 0,
        }
    }

    /// Seconds elapsed between creation and `now`, saturating at zero.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }
}

/// Current wall-clock time as Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
