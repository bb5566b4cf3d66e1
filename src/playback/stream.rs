//! Media engine abstraction.
//! The actual playback engine is a black box behind these traits; the sync
//! core only needs play/pause/stop/seek, a position query, and source and
//! audio controls.

use crate::core::time::Time;

/// Error type for playback stream operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// The engine cannot be constructed or has gone away entirely.
    /// The only fatal variant; everything else is absorbed and retried.
    #[error("playback engine unavailable: {0}")]
    EngineUnavailable(String),
    /// A malformed or unloadable source locator
    #[error("invalid media source `{0}`")]
    InvalidSource(String),
    /// A position query failed transiently
    #[error("position query failed: {0}")]
    Query(String),
    /// A seek failed transiently
    #[error("seek failed: {0}")]
    Seek(String),
}

impl StreamError {
    /// Whether this error means the engine itself is gone (as opposed to a
    /// transient or per-source failure).
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::EngineUnavailable(_))
    }
}

/// One playable media stream.
///
/// Seeks and state queries are assumed synchronous and fast; none of these
/// operations may block on I/O. All calls are serialized by the session's
/// lock discipline, so implementations need `Send` but not `Sync`.
pub trait PlaybackStream: Send {
    fn play(&mut self) -> Result<(), StreamError>;
    fn pause(&mut self) -> Result<(), StreamError>;
    fn stop(&mut self) -> Result<(), StreamError>;

    /// Current playback position
    fn position(&self) -> Result<Time, StreamError>;

    /// Seek to a position
    fn set_position(&mut self, position: Time) -> Result<(), StreamError>;

    /// Replace the media source. Triggers a load; on failure the previous
    /// source must remain active.
    fn set_source(&mut self, locator: &str) -> Result<(), StreamError>;

    fn set_muted(&mut self, muted: bool);

    /// Volume in [0, 1]
    fn set_volume(&mut self, volume: f32);
}

/// Factory for playback streams.
///
/// Construction failure (missing runtime dependency, no decoder) surfaces as
/// [`StreamError::EngineUnavailable`] and is the one error shown to the user.
pub trait MediaEngine {
    fn open_stream(&self) -> Result<Box<dyn PlaybackStream>, StreamError>;
}
