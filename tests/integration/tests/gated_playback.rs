//! Integration tests for gated playback
//!
//! These tests drive a full session through the public controller API:
//! - Forward-seek veto and rewatching in restricted mode
//! - Reset between consecutive loads
//! - Smart buffering and the buffering indicator
//! - Third-party embeds

use anyhow::Result;
use gateplay::engine::{EngineCommand, EngineSignal};
use gateplay::player::{LoadOptions, PlaybackState, PlayerEvent, TimerKind};
use gateplay_integration_tests::Harness;

#[test]
fn test_lesson_walkthrough() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);

    h.play_to(0.0, 30.0);
    h.controller.pause().unwrap();
    assert_eq!(h.session().max_reached_position, 30.0);
    assert!(h.events.contains(&PlayerEvent::ResumePoint { position: 30.0 }));

    // scrubbing ahead is snapped back
    h.signal(EngineSignal::Seeking { target: 50.0 });
    assert_eq!(h.engine.last_seek(), Some(30.0));
    assert_eq!(h.session().current_time, 30.0);
    h.signal(EngineSignal::Seeking { target: 30.0 });
    h.advance(200);

    // rewatching is fine and does not move the ratchet
    h.signal(EngineSignal::Seeking { target: 10.0 });
    assert_eq!(h.session().max_reached_position, 30.0);

    h.controller.play().unwrap();
    h.signal(EngineSignal::Playing);
    h.play_to(10.0, 45.0);
    assert_eq!(h.session().max_reached_position, 45.0);
    assert_eq!(h.controller.state(), PlaybackState::Playing);
}

#[test]
fn test_stall_while_paused_does_not_open_the_gate() -> Result<()> {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 30.0);
    h.controller.pause()?;

    let delivered = h.replay(
        r#"[
            { "type": "stalled" },
            { "type": "progress", "buffered": [{ "start": 0.0, "end": 31.0 }] },
            { "type": "seeking", "target": 100.0 }
        ]"#,
    )?;
    assert_eq!(delivered, 3);
    assert!(!h.session().buffering);
    assert_eq!(h.engine.last_seek(), Some(30.0));

    h.advance(200);
    h.replay(r#"[{ "type": "time_update", "position": 100.0 }]"#)?;
    assert_eq!(h.session().max_reached_position, 30.0);
    assert_eq!(h.controller.state(), PlaybackState::Paused);
    assert!(!h.events.contains(&PlayerEvent::BufferingChanged { buffering: true }));
    Ok(())
}

#[test]
fn test_seek_within_tolerance_is_allowed() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 20.0);

    h.signal(EngineSignal::Seeking { target: 24.0 });
    assert_eq!(h.session().current_time, 24.0);
    assert_eq!(h.count_commands(|c| matches!(c, EngineCommand::Seek { .. })), 0);
}

#[test]
fn test_completed_lesson_allows_free_seeking() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::unrestricted(), 300.0);

    h.signal(EngineSignal::Seeking { target: 250.0 });
    assert_eq!(h.session().current_time, 250.0);
    assert!(h.controller.seek_to(280.0).unwrap());
    assert_eq!(h.engine.last_seek(), Some(280.0));
}

#[test]
fn test_reload_resets_everything() {
    let mut h = Harness::new();
    h.start("lessons/one.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 60.0);
    h.signal(EngineSignal::Waiting);
    h.fault(gateplay::FaultKind::Decode);

    h.controller.load("lessons/two.mp4", LoadOptions::restricted());
    h.controller.load("lessons/three.mp4", LoadOptions::restricted());

    let session = h.session();
    assert_eq!(session.source_reference, "lessons/three.mp4");
    assert_eq!(session.max_reached_position, 0.0);
    assert_eq!(session.retry_count, 0);
    assert_eq!(session.buffer_progress_percent, 0.0);
    assert!(!session.buffering);
    assert_eq!(session.playback_state, PlaybackState::Paused);
    // only the stuck check of the new session remains
    assert_eq!(h.controller.timers().len(), 1);
    assert!(h.controller.timers().is_pending(TimerKind::StuckCheck));
}

#[test]
fn test_brief_stall_does_not_flash_indicator() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 5.0);

    h.signal(EngineSignal::Waiting);
    h.advance(300);
    h.signal(EngineSignal::CanPlay);
    h.advance(5_000);

    assert_eq!(h.events.count(|e| matches!(e, PlayerEvent::BufferingChanged { .. })), 0);
    assert_eq!(h.controller.state(), PlaybackState::Playing);
}

#[test]
fn test_long_starvation_enters_smart_buffering() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.play_to(0.0, 25.0);

    h.signal(EngineSignal::Waiting);
    h.advance(2_000);
    assert_eq!(h.controller.state(), PlaybackState::SmartBuffering);
    assert!(h.events.contains(&PlayerEvent::PlayStateChanged { playing: false }));

    // viewer pauses while we wait: no auto-resume afterwards
    h.controller.pause().unwrap();
    h.buffered(0.0, 60.0);
    assert_eq!(h.controller.state(), PlaybackState::Paused);
    assert_eq!(h.engine.commands().last(), Some(&EngineCommand::Pause));
}

#[test]
fn test_near_end_buffer_target_shrinks() {
    let mut h = Harness::new();
    h.start("lessons/short.mp4", LoadOptions::restricted(), 40.0);
    h.play_to(0.0, 36.0);

    h.signal(EngineSignal::Waiting);
    h.advance(2_000);
    assert_eq!(h.controller.state(), PlaybackState::SmartBuffering);

    // only 4s remain, so 4s of look-ahead is enough
    h.buffered(30.0, 40.0);
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert_eq!(h.session().buffer_progress_percent, 100.0);
}

#[test]
fn test_playback_rate_is_pinned() {
    let mut h = Harness::new();
    h.start("lessons/safety.mp4", LoadOptions::restricted(), 300.0);
    h.signal(EngineSignal::RateChange { rate: 1.5 });
    assert_eq!(
        h.engine.commands().last(),
        Some(&EngineCommand::SetPlaybackRate { rate: 1.0 })
    );
}

#[test]
fn test_vimeo_embed_only_sends_activity() {
    let mut h = Harness::new();
    h.controller.load("https://vimeo.com/76979871", LoadOptions::restricted());

    assert!(h.events.contains(&PlayerEvent::EmbedReady {
        embed_url: "https://player.vimeo.com/video/76979871".to_string()
    }));
    assert!(h.take_requests().is_empty());
    assert!(h.controller.timers().is_pending(TimerKind::EmbedHeartbeat));
    assert!(!h.controller.timers().is_pending(TimerKind::StuckCheck));

    h.controller.play().unwrap();
    assert_eq!(h.controller.rewind(5.0).unwrap(), 0.0);
    assert_eq!(h.count_commands(|c| matches!(c, EngineCommand::Play | EngineCommand::Seek { .. })), 0);

    let before = h.activity_count();
    h.advance(30_000);
    assert_eq!(h.activity_count(), before + 1);
}
