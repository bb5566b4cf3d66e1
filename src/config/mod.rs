//! Session configuration.
//! Persistence is the host's concern; this crate only reads the values on
//! each update cycle, so changes take effect without restarting the session.

use serde::{Deserialize, Serialize};

use crate::core::time::Time;

/// Configured settings for a video session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Media source locator (e.g. a URI). `None` means no video configured.
    pub source: Option<String>,
    /// Constant offset added to the reference time to compute the expected
    /// playback position (nanoseconds, may be negative).
    pub sync_offset: Time,
    /// Whether playback audio is muted.
    pub muted: bool,
    /// Playback volume in [0, 1].
    pub volume: f32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            source: None,
            sync_offset: 0,
            muted: true,
            volume: 0.05,
        }
    }
}
