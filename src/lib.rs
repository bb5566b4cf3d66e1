//! Timer-locked video playback.
//!
//! Keeps a video stream's position aligned with an external reference timer
//! that can start, pause, resume, and reset at arbitrary moments. The media
//! engine itself is a black box behind the [`playback::PlaybackStream`]
//! trait; this crate supplies the drift-correction loop and the transition
//! handling around it:
//!
//! - [`sync::DriftMonitor`] samples the stream position once per period
//!   while the timer runs and hard-seeks when drift leaves the dead-band
//!   (500 ms by default), disarming itself after a clean sample.
//! - [`sync::VideoComponent`] reacts to timer lifecycle events with
//!   play/pause/stop commands, re-arms the monitor on every start, and runs
//!   the host-driven update cycle (source changes, mute/volume, surface
//!   size).
//!
//! The host provides a [`clock::ReferenceClock`] implementation and a
//! [`playback::MediaEngine`], drives `update` from its render loop, and
//! drops the component to end the session.

pub mod clock;
pub mod config;
pub mod core;
pub mod playback;
pub mod sync;

pub use clock::{ClockEvent, ClockSubscription, EventHub, ReferenceClock, TimerPhase};
pub use config::VideoSettings;
pub use self::core::time::Time;
pub use playback::{Dispatcher, MediaEngine, PlaybackStream, StreamError, Surface};
pub use sync::{DriftMonitor, SessionError, SyncTuning, VideoComponent};
