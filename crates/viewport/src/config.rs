use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and noise thresholds for [`ViewportSyncController`](crate::ViewportSyncController).
///
/// Durations are milliseconds so the struct round-trips through plain config files.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// First debounce stage; absorbs jitter within one drag.
    pub jitter_ms: u64,
    /// Final debounce stage; absorbs the post-drag deceleration and snap.
    pub settle_ms: u64,
    /// Viewport events are discarded for this long after the first fetch.
    pub init_grace_ms: u64,
    /// Viewport events are discarded for this long after a filter-driven map move.
    pub filter_settle_ms: u64,
    /// Bounded wait for the list widget to mount.
    pub list_ready_timeout_ms: u64,
    /// Boxes whose edges all move less than this (degrees) count as noise.
    /// 1e-4 degrees is roughly 11 m of latitude.
    pub epsilon_deg: f64,
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            jitter_ms: 120,
            settle_ms: 450,
            init_grace_ms: 600,
            filter_settle_ms: 800,
            list_ready_timeout_ms: 3_000,
            epsilon_deg: 1e-4,
            channel_capacity: 64,
        }
    }
}

impl SyncConfig {
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn init_grace(&self) -> Duration {
        Duration::from_millis(self.init_grace_ms)
    }

    pub fn filter_settle(&self) -> Duration {
        Duration::from_millis(self.filter_settle_ms)
    }

    pub fn list_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.list_ready_timeout_ms)
    }
}
