//! Checks the exact calls the controller makes on its media engine

use gateplay::buffer::{PreloadStrategy, TimeRange};
use gateplay::engine::{EngineGeneration, EngineSignal, MediaEngine, SignalEnvelope};
use gateplay::player::{EventLog, LoadOptions, PlaybackState, PlayerEvent};
use gateplay::utils::{Config, ManualClock, PlayerError};
use gateplay::{PlaybackSessionController, ResolvedLocator};
use gateplay_integration_tests::START_MS;
use mockall::mock;
use mockall::predicate::eq;
use std::sync::Arc;

mock! {
    pub Engine {}

    impl MediaEngine for Engine {
        fn load(&mut self, generation: EngineGeneration, url: &str, preload: PreloadStrategy) -> gateplay::Result<()>;
        fn play(&mut self) -> gateplay::Result<()>;
        fn pause(&mut self);
        fn seek(&mut self, position: f64);
        fn set_playback_rate(&mut self, rate: f64);
        fn set_native_controls(&mut self, enabled: bool);
        fn unload(&mut self);
    }
}

fn controller_with(engine: MockEngine) -> (PlaybackSessionController, EventLog) {
    let events = EventLog::new();
    let mut controller = PlaybackSessionController::new(
        Config::default(),
        Box::new(engine),
        Box::new(|| {}),
        Arc::new(ManualClock::new(START_MS)),
    );
    controller.add_event_handler(events.handler());
    (controller, events)
}

fn resolve(controller: &mut PlaybackSessionController) {
    for request in controller.take_resolve_requests() {
        let url = format!("https://cdn.test/{}", request.reference);
        controller.on_resolved(request.ticket, Ok(ResolvedLocator::direct(url)));
    }
}

fn signal(controller: &mut PlaybackSessionController, signal: EngineSignal) {
    let generation = controller.current_generation();
    controller.handle_signal(SignalEnvelope::new(generation, signal));
}

#[test]
fn test_restricted_session_hides_controls_and_waits_for_buffer() {
    let mut engine = MockEngine::new();
    engine.expect_set_native_controls().with(eq(false)).times(1).return_const(());
    engine.expect_load().times(1).returning(|_, _, _| Ok(()));
    engine.expect_play().never();
    engine.expect_unload().times(1).return_const(());

    let (mut controller, _events) = controller_with(engine);
    controller.load("lessons/safety.mp4", LoadOptions::restricted());
    resolve(&mut controller);
    signal(&mut controller, EngineSignal::LoadedMetadata { duration: 120.0 });
    controller.play().unwrap();
    signal(
        &mut controller,
        EngineSignal::Progress {
            buffered: vec![TimeRange::new(0.0, 6.0)],
        },
    );

    assert_eq!(controller.session().unwrap().buffer_progress_percent, 60.0);
}

#[test]
fn test_unrestricted_session_transport() {
    let mut engine = MockEngine::new();
    engine.expect_set_native_controls().with(eq(true)).times(2).return_const(());
    engine.expect_load().times(1).returning(|_, _, _| Ok(()));
    engine.expect_play().times(1).returning(|| Ok(()));
    engine.expect_seek().with(eq(40.0)).times(1).return_const(());
    // one for the second load, one when the controller is dropped
    engine.expect_unload().times(2).return_const(());

    let (mut controller, _events) = controller_with(engine);
    controller.load("lessons/a.mp4", LoadOptions::unrestricted());
    resolve(&mut controller);
    signal(&mut controller, EngineSignal::LoadedMetadata { duration: 120.0 });
    controller.play().unwrap();
    assert!(controller.seek_to(40.0).unwrap());

    controller.load("lessons/b.mp4", LoadOptions::unrestricted());
}

#[test]
fn test_refused_play_is_treated_as_fault() {
    let mut engine = MockEngine::new();
    engine.expect_set_native_controls().return_const(());
    engine.expect_load().times(1).returning(|_, _, _| Ok(()));
    engine
        .expect_play()
        .times(1)
        .returning(|| Err(PlayerError::Engine("autoplay blocked".to_string())));
    engine.expect_unload().return_const(());

    let (mut controller, events) = controller_with(engine);
    controller.load("lessons/a.mp4", LoadOptions::unrestricted());
    resolve(&mut controller);
    controller.play().unwrap();

    assert_eq!(controller.state(), PlaybackState::ErrorRetrying);
    assert!(events.contains(&PlayerEvent::RetryScheduled {
        attempt: 1,
        delay_ms: 1_000
    }));
}

#[test]
fn test_rate_changes_are_reverted() {
    let mut engine = MockEngine::new();
    engine.expect_set_native_controls().return_const(());
    engine.expect_load().returning(|_, _, _| Ok(()));
    engine.expect_set_playback_rate().with(eq(1.0)).times(1).return_const(());
    engine.expect_unload().return_const(());

    let (mut controller, _events) = controller_with(engine);
    controller.load("lessons/a.mp4", LoadOptions::restricted());
    resolve(&mut controller);
    signal(&mut controller, EngineSignal::RateChange { rate: 2.0 });
    signal(&mut controller, EngineSignal::RateChange { rate: 1.0 });
}
