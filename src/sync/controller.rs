//! Transition controller: translates reference-clock lifecycle events into
//! playback commands and owns the drift monitor, the shared surface/stream
//! state, and the session's teardown path.

use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::clock::{ClockEvent, ReferenceClock, SubscriptionGuard};
use crate::config::VideoSettings;
use crate::core::lock;
use crate::core::time::Time;
use crate::playback::{Dispatcher, MediaEngine, SessionShared, StreamError, Surface};
use crate::sync::monitor::{DriftMonitor, SyncTuning};

/// Error type for session construction and control
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
}

/// One timer-locked video session.
///
/// Construction opens the playback stream (the only fatal failure point),
/// subscribes to the clock, and spawns the event thread. The host drives
/// [`VideoComponent::update`] from its render cycle and drops the component
/// to end the session.
pub struct VideoComponent {
    shared: Arc<SessionShared>,
    dispatcher: Arc<Dispatcher>,
    monitor: Arc<Mutex<DriftMonitor>>,
    settings: Arc<Mutex<VideoSettings>>,
    faulted: Arc<AtomicBool>,
    subscription: Option<SubscriptionGuard>,
    event_thread: Option<JoinHandle<()>>,
    /// Last locator handed to the stream (or attempted), for the
    /// level-triggered source-change check
    last_source: Option<String>,
    torn_down: bool,
}

impl VideoComponent {
    pub fn new(
        clock: Arc<dyn ReferenceClock>,
        engine: &dyn MediaEngine,
        settings: Arc<Mutex<VideoSettings>>,
        tuning: SyncTuning,
    ) -> Result<Self, SessionError> {
        let stream = engine.open_stream()?;
        let shared = Arc::new(SessionShared::new(stream));
        let dispatcher = Arc::new(Dispatcher::new("video-session"));
        let monitor = Arc::new(Mutex::new(DriftMonitor::new(
            Arc::clone(&clock),
            Arc::clone(&shared),
            Arc::clone(&dispatcher),
            Arc::clone(&settings),
            tuning,
        )));

        let (events, subscription) = clock.subscribe().split();
        let event_thread = {
            let shared = Arc::clone(&shared);
            let dispatcher = Arc::clone(&dispatcher);
            let monitor = Arc::clone(&monitor);
            thread::Builder::new()
                .name("clock-events".to_string())
                .spawn(move || {
                    // Ends when the subscription is released and the sender
                    // disconnects.
                    for event in events.iter() {
                        handle_event(event, &shared, &dispatcher, &monitor);
                    }
                })
                .map_err(|e| StreamError::EngineUnavailable(format!("spawn failed: {e}")))?
        };

        Ok(Self {
            shared,
            dispatcher,
            monitor,
            settings,
            faulted: Arc::new(AtomicBool::new(false)),
            subscription: Some(subscription),
            event_thread: Some(event_thread),
            last_source: None,
            torn_down: false,
        })
    }

    /// Manual resync: align the stream to
    /// `reference time + sync offset + offset` and re-arm the monitor.
    pub fn synchronize(&self, offset: Time) {
        lock(&self.monitor).arm(offset);
    }

    /// Host render-cycle entry point.
    ///
    /// Refreshes the surface size, applies a changed source locator
    /// (level-triggered against the last applied value, so unchanged
    /// settings are a no-op), and enforces mute/volume. A faulted session
    /// tears itself down here instead of operating on a dead stream.
    pub fn update(&mut self, width: f32, height: f32) {
        if self.faulted.load(Ordering::SeqCst) {
            self.teardown();
            return;
        }
        if self.torn_down {
            return;
        }

        let (source, muted, volume) = {
            let settings = lock(&self.settings);
            (settings.source.clone(), settings.muted, settings.volume)
        };
        let source_changed = match (&source, &self.last_source) {
            (Some(new), old) => !new.is_empty() && old.as_deref() != Some(new.as_str()),
            (None, _) => false,
        };

        let shared = Arc::clone(&self.shared);
        let faulted = Arc::clone(&self.faulted);
        let apply_source = source.clone().filter(|_| source_changed);
        self.dispatcher.invoke(move || {
            shared.with_both(|surface, stream| {
                surface.width = width;
                surface.height = height;

                let Some(stream) = stream else { return };
                if let Some(locator) = &apply_source {
                    match stream.set_source(locator) {
                        Ok(()) => debug!("media source changed to {locator}"),
                        Err(e) if e.is_fatal() => {
                            error!("media engine lost while changing source: {e}");
                            faulted.store(true, Ordering::SeqCst);
                        }
                        // Previous source stays active; diagnosed once, the
                        // failed locator is remembered below and not retried
                        // every cycle.
                        Err(e) => error!("{e}"),
                    }
                }
                stream.set_muted(muted);
                stream.set_volume(volume);
            });
        });

        if source_changed {
            self.last_source = source;
        }
    }

    /// Surface snapshot for the host's drawing code.
    pub fn surface(&self) -> Surface {
        self.shared.surface()
    }

    /// Whether the drift monitor currently has an active schedule.
    pub fn is_synchronizing(&self) -> bool {
        lock(&self.monitor).is_armed()
    }

    /// Whether the session hit a fatal engine error and went inert.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    /// End the session. Cancels the schedule, stops and releases the
    /// stream, hides the surface, and unsubscribes from the clock.
    /// Idempotent, and safe even when the engine failed mid-session.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        // Schedule first: after this join no tick can touch the stream.
        lock(&self.monitor).disarm();

        let shared = Arc::clone(&self.shared);
        self.dispatcher.invoke(move || {
            shared.with_both(|surface, stream| {
                surface.visible = false;
                if let Some(stream) = stream {
                    if let Err(e) = stream.stop() {
                        warn!("stop during teardown failed: {e}");
                    }
                }
            });
            shared.take_stream();
        });

        // Releasing the subscription disconnects the event channel, which
        // ends the event thread's loop.
        self.subscription.take();
        if let Some(handle) = self.event_thread.take() {
            let _ = handle.join();
        }

        // A Start event racing the steps above may have re-armed. Harmless
        // against the released stream, but join the schedule too.
        lock(&self.monitor).disarm();
    }
}

impl Drop for VideoComponent {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Lifecycle event table. Runs on the event thread; stream and surface
/// mutations are marshalled through the dispatcher.
fn handle_event(
    event: ClockEvent,
    shared: &Arc<SessionShared>,
    dispatcher: &Arc<Dispatcher>,
    monitor: &Arc<Mutex<DriftMonitor>>,
) {
    match event {
        ClockEvent::Start => {
            let shared = Arc::clone(shared);
            dispatcher.invoke(move || {
                shared.with_both(|surface, stream| {
                    surface.visible = true;
                    if let Some(stream) = stream {
                        if let Err(e) = stream.play() {
                            warn!("play on start failed: {e}");
                        }
                    }
                });
            });
            lock(monitor).arm(0);
        }
        ClockEvent::Pause => {
            let shared = Arc::clone(shared);
            dispatcher.invoke(move || {
                shared.with_stream(|stream| {
                    if let Err(e) = stream.pause() {
                        warn!("pause failed: {e}");
                    }
                });
            });
        }
        // No re-arm: an existing schedule, if any, resumes correcting.
        ClockEvent::Resume => {
            let shared = Arc::clone(shared);
            dispatcher.invoke(move || {
                shared.with_stream(|stream| {
                    if let Err(e) = stream.play() {
                        warn!("play on resume failed: {e}");
                    }
                });
            });
        }
        ClockEvent::Reset => {
            // Disarm before stopping so no tick can race the stop.
            lock(monitor).disarm();
            let shared = Arc::clone(shared);
            dispatcher.invoke(move || {
                shared.with_both(|surface, stream| {
                    surface.visible = false;
                    if let Some(stream) = stream {
                        if let Err(e) = stream.stop() {
                            warn!("stop on reset failed: {e}");
                        }
                    }
                });
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::core::time;
    use crate::playback::stream::testing::{
        FakeEngine, StreamCommand, UnavailableEngine,
    };
    use std::time::Duration;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // Generous settle time for the event thread to drain a broadcast.
    fn settle() {
        thread::sleep(Duration::from_millis(150));
    }

    fn fast_tuning() -> SyncTuning {
        SyncTuning {
            period: Duration::from_millis(20),
            threshold: time::from_millis(500),
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        engine: FakeEngine,
        settings: Arc<Mutex<VideoSettings>>,
    }

    impl Fixture {
        fn new() -> Self {
            init_logs();
            Self {
                clock: Arc::new(ManualClock::new()),
                engine: FakeEngine::new(),
                settings: Arc::new(Mutex::new(VideoSettings::default())),
            }
        }

        fn component(&self, tuning: SyncTuning) -> VideoComponent {
            VideoComponent::new(
                Arc::clone(&self.clock) as Arc<dyn ReferenceClock>,
                &self.engine,
                Arc::clone(&self.settings),
                tuning,
            )
            .expect("fake engine always constructs")
        }
    }

    #[test]
    fn test_engine_unavailable_is_a_construction_error() {
        init_logs();
        let clock = Arc::new(ManualClock::new());
        let result = VideoComponent::new(
            clock as Arc<dyn ReferenceClock>,
            &UnavailableEngine,
            Arc::new(Mutex::new(VideoSettings::default())),
            SyncTuning::default(),
        );
        match result {
            Err(SessionError::Stream(e)) => assert!(e.is_fatal()),
            Ok(_) => panic!("construction must fail without an engine"),
        }
    }

    #[test]
    fn test_start_shows_plays_and_aligns() {
        let fx = Fixture::new();
        lock(&fx.settings).sync_offset = time::from_seconds(2.0);
        let component = fx.component(SyncTuning::default());

        // Reference clock at zero when the run starts.
        fx.clock.start();
        settle();

        assert!(component.surface().visible);
        assert!(component.is_synchronizing());
        let commands = fx.engine.stream.commands();
        assert!(commands.contains(&StreamCommand::Play));
        // Stream aligned to reference 0s + sync offset 2s.
        assert_eq!(fx.engine.stream.seeks(), vec![time::from_seconds(2.0)]);
    }

    #[test]
    fn test_pause_and_resume_forward_to_stream() {
        let fx = Fixture::new();
        let component = fx.component(SyncTuning::default());

        fx.clock.start();
        settle();
        fx.engine.stream.clear_commands();

        fx.clock.pause();
        settle();
        assert_eq!(fx.engine.stream.commands(), vec![StreamCommand::Pause]);

        fx.clock.resume();
        settle();
        assert_eq!(
            fx.engine.stream.commands(),
            vec![StreamCommand::Pause, StreamCommand::Play]
        );
        drop(component);
    }

    #[test]
    fn test_reset_stops_hides_and_disarms() {
        let fx = Fixture::new();
        let component = fx.component(fast_tuning());

        // Stream reports a position far out of band no matter what, so
        // corrections are continuously in flight when the reset lands.
        fx.engine.stream.pin_reported_position(Some(time::from_seconds(30.0)));
        fx.clock.start();
        settle();
        assert!(component.is_synchronizing());

        fx.clock.set_time(time::from_seconds(10.0));
        thread::sleep(Duration::from_millis(50));

        fx.clock.reset();
        settle();

        assert!(!component.surface().visible);
        assert!(!component.is_synchronizing());
        assert!(fx.engine.stream.commands().contains(&StreamCommand::Stop));

        // Nothing mutates the stream after the reset settled.
        fx.engine.stream.clear_commands();
        thread::sleep(Duration::from_millis(80));
        assert!(fx.engine.stream.commands().is_empty());
    }

    #[test]
    fn test_synchronize_applies_manual_nudge() {
        let fx = Fixture::new();
        lock(&fx.settings).sync_offset = time::from_seconds(1.0);
        let component = fx.component(SyncTuning::default());

        fx.clock.set_time(time::from_seconds(5.0));
        component.synchronize(-time::from_millis(250));

        // 5s + 1s - 250ms
        assert_eq!(fx.engine.stream.seeks(), vec![time::from_millis(5750)]);
        assert!(component.is_synchronizing());
    }

    #[test]
    fn test_update_applies_source_once_and_enforces_audio() {
        let fx = Fixture::new();
        let mut component = fx.component(SyncTuning::default());

        lock(&fx.settings).source = Some("file:///run.mp4".to_string());
        component.update(640.0, 360.0);
        component.update(640.0, 360.0);

        let sources: Vec<_> = fx
            .engine
            .stream
            .commands()
            .into_iter()
            .filter(|c| matches!(c, StreamCommand::Source(_)))
            .collect();
        assert_eq!(
            sources,
            vec![StreamCommand::Source("file:///run.mp4".to_string())]
        );

        let commands = fx.engine.stream.commands();
        assert!(commands.contains(&StreamCommand::Muted(true)));
        assert!(commands.contains(&StreamCommand::Volume(0.05)));

        let surface = component.surface();
        assert_eq!(surface.width, 640.0);
        assert_eq!(surface.height, 360.0);
    }

    #[test]
    fn test_update_ignores_empty_locator() {
        let fx = Fixture::new();
        let mut component = fx.component(SyncTuning::default());

        lock(&fx.settings).source = Some(String::new());
        component.update(100.0, 100.0);
        assert!(!fx
            .engine
            .stream
            .commands()
            .iter()
            .any(|c| matches!(c, StreamCommand::Source(_))));
    }

    #[test]
    fn test_bad_source_keeps_previous_and_is_not_retried() {
        let fx = Fixture::new();
        let mut component = fx.component(SyncTuning::default());

        lock(&fx.settings).source = Some("file:///good.mp4".to_string());
        component.update(100.0, 100.0);

        fx.engine.stream.fail_source_changes(true);
        lock(&fx.settings).source = Some("not a locator".to_string());
        component.update(100.0, 100.0);
        component.update(100.0, 100.0);

        // Only the good source was ever applied, and the bad one was
        // attempted a single time (RecordingStream records successes only,
        // so a retry would show once the failure flag clears).
        fx.engine.stream.fail_source_changes(false);
        component.update(100.0, 100.0);
        let sources: Vec<_> = fx
            .engine
            .stream
            .commands()
            .into_iter()
            .filter(|c| matches!(c, StreamCommand::Source(_)))
            .collect();
        assert_eq!(
            sources,
            vec![StreamCommand::Source("file:///good.mp4".to_string())]
        );
        assert!(!component.is_faulted());
    }

    #[test]
    fn test_teardown_releases_everything() {
        let fx = Fixture::new();
        let component = fx.component(fast_tuning());

        fx.clock.start();
        settle();
        assert_eq!(fx.clock.subscriber_count(), 1);

        drop(component);

        assert_eq!(fx.clock.subscriber_count(), 0);
        assert!(fx.engine.stream.commands().contains(&StreamCommand::Stop));

        // Liveness guard: with the stream released and the schedule joined,
        // later clock activity reaches nothing.
        fx.engine.stream.clear_commands();
        fx.clock.start();
        fx.clock.set_time(time::from_seconds(60.0));
        thread::sleep(Duration::from_millis(80));
        assert!(fx.engine.stream.commands().is_empty());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let fx = Fixture::new();
        let mut component = fx.component(SyncTuning::default());
        component.teardown();
        component.teardown();
        component.update(10.0, 10.0); // inert after teardown
        drop(component);

        let stops = fx
            .engine
            .stream
            .commands()
            .into_iter()
            .filter(|c| *c == StreamCommand::Stop)
            .count();
        assert_eq!(stops, 1);
    }
}
