//! Integration tests for fault recovery
//!
//! Retry backoff, exhaustion, stuck playback, locator expiry and
//! connectivity changes, all driven through the public controller API.

use gateplay::buffer::PreloadStrategy;
use gateplay::engine::{EngineCommand, EngineFault, EngineSignal, FaultKind, SignalEnvelope};
use gateplay::network::{EffectiveType, LinkSignals, NetworkQuality};
use gateplay::player::{LoadOptions, PlaybackState, PlayerEvent, ResolvePurpose, TimerKind};
use gateplay::utils::FailureKind;
use gateplay_integration_tests::{Harness, START_MS};

const MINUTE_MS: u64 = 60_000;

fn loads(h: &Harness) -> usize {
    h.count_commands(|c| matches!(c, EngineCommand::Load { .. }))
}

fn last_failure_kind(h: &Harness) -> Option<FailureKind> {
    match h.events.last() {
        Some(PlayerEvent::Failed(failure)) => Some(failure.kind),
        _ => None,
    }
}

#[test]
fn test_backoff_then_exhaustion_then_manual_retry() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 5.0);

    h.fault(FaultKind::Network);
    assert!(h.events.contains(&PlayerEvent::RetryScheduled {
        attempt: 1,
        delay_ms: 1_000
    }));
    h.advance(999);
    assert_eq!(loads(&h), 1);
    h.advance(1);
    assert_eq!(loads(&h), 2);

    h.fault(FaultKind::Network);
    assert!(h.events.contains(&PlayerEvent::RetryScheduled {
        attempt: 2,
        delay_ms: 2_000
    }));
    h.advance(2_000);
    h.fault(FaultKind::Decode);

    assert_eq!(h.controller.state(), PlaybackState::ErrorExhausted);
    assert_eq!(last_failure_kind(&h), Some(FailureKind::Playback));

    // play() is inert until the viewer retries
    h.engine.take_commands();
    h.controller.play().unwrap();
    assert!(h.engine.commands().is_empty());

    h.controller.retry_now().unwrap();
    assert_eq!(h.session().retry_count, 0);
    h.resolve_direct();
    h.signal(EngineSignal::LoadedMetadata { duration: 300.0 });
    assert_eq!(h.engine.last_seek(), Some(5.0));
    h.buffered(0.0, 30.0);
    h.signal(EngineSignal::Playing);

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert!(h.events.contains(&PlayerEvent::Recovered));
}

#[test]
fn test_fault_from_previous_load_is_ignored() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 10.0);
    let old = h.controller.current_generation();

    h.fault(FaultKind::Network);
    h.advance(1_000);
    assert!(h.controller.current_generation() > old);

    let accepted = h.controller.handle_signal(SignalEnvelope::new(
        old,
        EngineSignal::Error {
            fault: EngineFault::new(FaultKind::Network, "late"),
        },
    ));
    assert!(!accepted);
    assert_eq!(h.session().retry_count, 1);
    assert_eq!(h.controller.state(), PlaybackState::ErrorRetrying);
}

#[test]
fn test_repeated_fault_while_retry_pending() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);

    h.fault(FaultKind::Network);
    h.fault(FaultKind::Network);
    assert_eq!(h.events.count(|e| matches!(e, PlayerEvent::RetryScheduled { .. })), 1);
    assert_eq!(h.session().retry_count, 1);
}

#[test]
fn test_engine_rejecting_locator_counts_as_fault() {
    let mut h = Harness::new();
    h.engine.set_fail_loads(true);
    h.controller.load("lessons/safety.mp4", LoadOptions::unrestricted());
    h.resolve_direct();

    assert_eq!(h.controller.state(), PlaybackState::ErrorRetrying);
    assert_eq!(loads(&h), 0);

    h.engine.set_fail_loads(false);
    h.advance(1_000);
    assert_eq!(loads(&h), 1);
}

#[test]
fn test_expired_locator_is_resolved_again_before_retry() {
    let mut h = Harness::new();
    h.controller.load("lessons/safety.mp4", LoadOptions::unrestricted());
    h.resolve_signed(START_MS + 500);
    h.signal(EngineSignal::LoadedMetadata { duration: 300.0 });
    h.signal(EngineSignal::TimeUpdate { position: 2.0 });

    h.fault(FaultKind::Network);
    h.advance(1_000);

    let requests = h.take_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].purpose, ResolvePurpose::Retry { resume_at: 2.0 });
    assert_eq!(loads(&h), 1);

    h.resolve_signed(START_MS + 60 * MINUTE_MS);
    assert_eq!(loads(&h), 2);
    assert_eq!(h.session().url_expiry_ms, Some(START_MS + 60 * MINUTE_MS));
}

#[test]
fn test_long_viewing_refreshes_locator_in_place() {
    let mut h = Harness::new();
    let expiry = START_MS + 10 * MINUTE_MS;
    h.controller.load("lessons/long.mp4", LoadOptions::restricted());
    h.resolve_signed(expiry);
    h.signal(EngineSignal::LoadedMetadata { duration: 3_600.0 });
    h.play_to(0.0, 42.0);
    // keeps the stuck detector out of the way while time jumps
    h.controller.set_visibility(false);

    for _ in 0..5 {
        h.advance(MINUTE_MS);
    }
    assert!(h.take_requests().is_empty());

    h.advance(MINUTE_MS);
    let new_expiry = START_MS + 70 * MINUTE_MS;
    h.resolve_signed(new_expiry);

    let session = h.session();
    assert_eq!(session.current_time, 42.0);
    assert_eq!(session.url_expiry_ms, Some(new_expiry));
    assert_eq!(session.max_reached_position, 42.0);
    assert!(h.events.contains(&PlayerEvent::LocatorRefreshed {
        expiry_ms: Some(new_expiry)
    }));

    h.signal(EngineSignal::LoadedMetadata { duration: 3_600.0 });
    assert_eq!(h.engine.last_seek(), Some(42.0));
    assert!(h.controller.timers().is_pending(TimerKind::LocatorCheck));
}

#[test]
fn test_stuck_playback_reloads_at_position() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 12.0);

    h.advance(10_000);
    h.advance(10_000);
    assert_eq!(h.controller.state(), PlaybackState::ErrorRetrying);

    let requests = h.take_requests();
    assert_eq!(requests[0].purpose, ResolvePurpose::Retry { resume_at: 12.0 });
    for request in requests {
        h.controller.on_resolved(
            request.ticket,
            Ok(gateplay::ResolvedLocator::direct("https://cdn.test/lessons/safety.mp4")),
        );
    }
    h.signal(EngineSignal::LoadedMetadata { duration: 300.0 });
    assert_eq!(h.engine.last_seek(), Some(12.0));
}

#[test]
fn test_buffering_is_not_stuck() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::unrestricted(), 300.0);
    h.play_to(0.0, 12.0);
    h.signal(EngineSignal::Waiting);

    h.advance(10_000);
    h.advance(10_000);
    h.advance(10_000);
    assert_eq!(h.controller.state(), PlaybackState::Waiting);
    assert!(h.take_requests().is_empty());
}

#[test]
fn test_unresolvable_source_degrades_to_failure() {
    let mut h = Harness::new();
    h.controller.load("https://media.test/raw.mp4", LoadOptions::restricted());
    h.fail_resolution("signing service unavailable");

    assert_eq!(h.session().resolved_url.as_deref(), Some("https://media.test/raw.mp4"));
    h.fault(FaultKind::SourceNotSupported);

    assert_eq!(h.controller.state(), PlaybackState::ErrorExhausted);
    assert_eq!(last_failure_kind(&h), Some(FailureKind::SourceUnavailable));
}

#[test]
fn test_offline_failure_recovers_when_link_returns() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 8.0);

    h.controller.on_link_change(LinkSignals::offline());
    assert_eq!(h.controller.network_quality(), NetworkQuality::Offline);
    h.fault(FaultKind::Network);
    h.advance(4_000);
    h.fault(FaultKind::Network);
    h.advance(8_000);
    h.fault(FaultKind::Network);
    assert_eq!(last_failure_kind(&h), Some(FailureKind::NetworkOffline));

    h.controller.on_link_change(LinkSignals::online());
    assert_eq!(h.controller.state(), PlaybackState::ErrorRetrying);
    let requests = h.take_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].purpose, ResolvePurpose::Retry { resume_at: 8.0 });
}

#[test]
fn test_slow_link_selects_conservative_profile() {
    let mut h = Harness::new();
    h.controller.on_link_change(LinkSignals {
        effective_type: Some(EffectiveType::ThreeG),
        ..LinkSignals::online()
    });
    assert_eq!(h.controller.network_quality(), NetworkQuality::Slow);

    h.controller.load("lessons/safety.mp4", LoadOptions::restricted());
    h.resolve_direct();
    assert!(matches!(
        h.engine.commands().last(),
        Some(EngineCommand::Load {
            preload: PreloadStrategy::Metadata,
            ..
        })
    ));

    h.fault(FaultKind::Network);
    assert!(h.events.contains(&PlayerEvent::RetryScheduled {
        attempt: 1,
        delay_ms: 2_000
    }));
}

#[test]
fn test_paused_viewer_recovers_after_reload() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 40.0);
    h.controller.pause().unwrap();

    // the viewer steps away; the connection drops every few minutes
    for _ in 0..4 {
        h.fault(FaultKind::Network);
        assert_eq!(h.controller.state(), PlaybackState::ErrorRetrying);
        h.advance(1_000);
        h.signal(EngineSignal::LoadedMetadata { duration: 300.0 });
        h.buffered(35.0, 70.0);
        h.signal(EngineSignal::CanPlayThrough);
        assert_eq!(h.controller.state(), PlaybackState::Paused);
        h.advance(3 * MINUTE_MS);
    }

    assert_eq!(h.session().retry_count, 0);
    assert_eq!(last_failure_kind(&h), None);
    assert_eq!(h.events.count(|e| *e == PlayerEvent::Recovered), 4);
    assert_eq!(loads(&h), 5);

    h.controller.play().unwrap();
    h.signal(EngineSignal::Playing);
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert_eq!(h.session().max_reached_position, 40.0);
}
