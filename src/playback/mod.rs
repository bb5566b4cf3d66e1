//! Playback-side state: the media stream abstraction, the visual surface,
//! and the lock discipline serializing access to both.

pub mod dispatch;
pub mod stream;

pub use dispatch::Dispatcher;
pub use stream::{MediaEngine, PlaybackStream, StreamError};

use std::sync::Mutex;

use crate::core::lock;

/// Visual surface state the host draws from. The component only toggles
/// visibility and tracks the size handed in by the host's update cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub visible: bool,
    pub width: f32,
    pub height: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            visible: false,
            width: 0.0,
            height: 0.0,
        }
    }
}

/// Shared session state behind two named locks.
///
/// Lock order is always surface first, then stream — never the reverse.
/// The surface lock is held for the duration of any stream access, which
/// serializes overlapping ticks, clock events, and teardown. The stream
/// slot becomes `None` at teardown; every accessor treats that as "stream
/// gone, do nothing" (the liveness guard for late ticks).
pub struct SessionShared {
    surface: Mutex<Surface>,
    stream: Mutex<Option<Box<dyn PlaybackStream>>>,
}

impl SessionShared {
    pub fn new(stream: Box<dyn PlaybackStream>) -> Self {
        Self {
            surface: Mutex::new(Surface::default()),
            stream: Mutex::new(Some(stream)),
        }
    }

    /// Mutate the surface alone.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut Surface) -> R) -> R {
        f(&mut lock(&self.surface))
    }

    /// Current surface snapshot.
    pub fn surface(&self) -> Surface {
        *lock(&self.surface)
    }

    /// Run `f` against the stream under both locks, in order. Returns `None`
    /// if the stream has been released.
    pub fn with_stream<R>(
        &self,
        f: impl FnOnce(&mut (dyn PlaybackStream + 'static)) -> R,
    ) -> Option<R> {
        let _surface = lock(&self.surface);
        let mut slot = lock(&self.stream);
        slot.as_deref_mut().map(f)
    }

    /// Mutate surface and stream together under both locks. The stream slot
    /// is exposed as-is so the closure can observe absence.
    pub fn with_both<R>(
        &self,
        f: impl FnOnce(&mut Surface, Option<&mut (dyn PlaybackStream + 'static)>) -> R,
    ) -> R {
        let mut surface = lock(&self.surface);
        let mut slot = lock(&self.stream);
        f(&mut surface, slot.as_deref_mut())
    }

    /// Release the stream, leaving the slot empty. Subsequent accessors see
    /// `None`. Idempotent.
    pub fn take_stream(&self) -> Option<Box<dyn PlaybackStream>> {
        let _surface = lock(&self.surface);
        lock(&self.stream).take()
    }

    /// Whether a stream is still installed.
    pub fn stream_alive(&self) -> bool {
        lock(&self.stream).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::stream::testing::RecordingStream;
    use super::*;

    #[test]
    fn test_with_stream_after_take_is_none() {
        let shared = SessionShared::new(Box::new(RecordingStream::new()));
        assert!(shared.stream_alive());
        assert!(shared.with_stream(|_| ()).is_some());

        let released = shared.take_stream();
        assert!(released.is_some());
        assert!(!shared.stream_alive());
        assert!(shared.with_stream(|_| ()).is_none());

        // Second take is a no-op.
        assert!(shared.take_stream().is_none());
    }

    #[test]
    fn test_surface_defaults_hidden() {
        let shared = SessionShared::new(Box::new(RecordingStream::new()));
        assert!(!shared.surface().visible);
        shared.with_surface(|s| s.visible = true);
        assert!(shared.surface().visible);
    }
}
