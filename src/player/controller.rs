//! Playback session controller for gateplay
//!
//! This module provides the root controller that owns one playback session
//! at a time and wires the progress gate, retry controller, stuck detector
//! and locator lifecycle together. It never blocks or awaits: engine
//! signals, resolver answers and timer deadlines are pushed in by whoever
//! drives it (the tokio runtime, the replay CLI, or a test).

use crate::buffer::{BufferConfig, BufferPolicySelector, BufferStatus, DeviceProfile, TimeRange};
use crate::engine::{EngineFault, EngineGeneration, EngineSignal, FaultKind, MediaEngine, ReadyState, SignalEnvelope};
use crate::network::{LinkSignals, NetworkQuality, NetworkQualityMonitor};
use crate::player::events::{EventHandlers, PlayerEvent, PlayerEventHandler};
use crate::player::gate::{GatePolicy, ProgressGate, SeekVerdict};
use crate::player::locator::LocatorLifecycleManager;
use crate::player::retry::{RetryController, RetryDecision, RetryPolicy};
use crate::player::state::{
    LoadOptions, PlaybackBackend, PlaybackSession, PlaybackState, ResolvePurpose, ResolveRequest, ResolveTicket,
    SessionId,
};
use crate::player::stuck::{StuckCheckInput, StuckPlaybackDetector, StuckVerdict};
use crate::player::timers::{TimerKind, Timers};
use crate::source::{ActivitySink, ActivityThrottle, ResolvedLocator, SourceKind};
use crate::utils::clock::Clock;
use crate::utils::config::Config;
use crate::utils::error::{FailureKind, PlaybackFailure, PlayerError, Result};

use log::{debug, error, info, warn};
use std::sync::Arc;

/// Rates further than this from 1.0 are reverted
const RATE_EPSILON: f64 = 1e-3;

/// State of the asset currently mounted
struct ActiveSession {
    id: SessionId,
    reference: String,
    restricted: bool,
    backend: PlaybackBackend,
    buffer: BufferConfig,

    gate: ProgressGate,
    retry: RetryController,
    stuck: StuckPlaybackDetector,
    locator: LocatorLifecycleManager,

    resolved: Option<ResolvedLocator>,
    /// Resolution failed and the raw reference is being played
    used_fallback: bool,
    pending_resolve: Option<(ResolveTicket, ResolvePurpose)>,

    state: PlaybackState,
    /// The viewer asked for playback and has not paused since
    wants_playing: bool,
    engine_play_issued: bool,
    initial_buffer_ready: bool,

    buffering: bool,
    indicator_shown: bool,
    resume_after_buffering: bool,

    /// One-shot seek applied when the engine reports metadata
    seek_on_metadata: Option<f64>,
    initial_position_applied: bool,

    current_time: f64,
    duration: f64,
    ready_state: ReadyState,
    buffered: Vec<TimeRange>,
    buffer_status: BufferStatus,
    resume_point: Option<f64>,
}

impl ActiveSession {
    fn new(
        id: SessionId,
        reference: String,
        options: LoadOptions,
        backend: PlaybackBackend,
        buffer: BufferConfig,
        config: &Config,
    ) -> Self {
        let gate_policy = GatePolicy {
            tolerance_secs: buffer.seek_tolerance_secs,
            trust_window_secs: config.playback.progress_trust_window_secs,
        };
        let retry_policy = RetryPolicy {
            max_retries: buffer.max_retries,
            base_delay_ms: buffer.retry_base_delay_ms,
            backoff_factor: config.retry.backoff_factor,
            max_delay_ms: config.retry.max_delay_ms,
        };

        let mut gate = ProgressGate::new(gate_policy, options.restricted_mode);
        let seek_on_metadata = options.initial_position.filter(|p| p.is_finite() && *p > 0.0);
        if let Some(position) = seek_on_metadata {
            gate.seed(position);
        }

        Self {
            id,
            reference,
            restricted: options.restricted_mode,
            backend,
            buffer,
            gate,
            retry: RetryController::new(retry_policy),
            stuck: StuckPlaybackDetector::new(),
            locator: LocatorLifecycleManager::new(config.locator.clone()),
            resolved: None,
            used_fallback: false,
            pending_resolve: None,
            state: PlaybackState::Paused,
            wants_playing: false,
            engine_play_issued: false,
            initial_buffer_ready: false,
            buffering: false,
            indicator_shown: false,
            resume_after_buffering: false,
            seek_on_metadata,
            initial_position_applied: false,
            current_time: seek_on_metadata.unwrap_or(0.0),
            duration: 0.0,
            ready_state: ReadyState::HaveNothing,
            buffered: Vec::new(),
            buffer_status: BufferStatus::default(),
            resume_point: None,
        }
    }

    fn is_embedded(&self) -> bool {
        matches!(self.backend, PlaybackBackend::Embedded { .. })
    }

    fn snapshot(&self) -> PlaybackSession {
        let resolved_url = match &self.backend {
            PlaybackBackend::Embedded { embed_url } => Some(embed_url.clone()),
            PlaybackBackend::Native => self.resolved.as_ref().map(|l| l.url.clone()),
        };

        PlaybackSession {
            id: self.id,
            source_reference: self.reference.clone(),
            resolved_url,
            backend: self.backend.clone(),
            restricted_mode: self.restricted,
            current_time: self.current_time,
            duration: self.duration,
            max_reached_position: self.gate.max_reached(),
            playback_state: self.state,
            retry_count: self.retry.retry_count(),
            max_retries: self.retry.max_retries(),
            buffer_progress_percent: self.buffer_status.percent,
            buffered_ranges: self.buffered.clone(),
            url_expiry_ms: self.locator.expiry_ms(),
            ready_state: self.ready_state,
            buffering: self.buffering,
            resume_point: self.resume_point,
        }
    }
}

/// Root controller; owns the engine and at most one session
pub struct PlaybackSessionController {
    config: Config,
    clock: Arc<dyn Clock>,
    engine: Box<dyn MediaEngine + Send>,
    activity: ActivityThrottle,
    handlers: EventHandlers,
    network: NetworkQualityMonitor,
    device: DeviceProfile,
    selector: BufferPolicySelector,
    timers: Timers,
    session: Option<ActiveSession>,
    next_session_id: u64,
    next_ticket_seq: u64,
    generation: EngineGeneration,
    visible: bool,
    resolve_requests: Vec<ResolveRequest>,
}

impl PlaybackSessionController {
    pub fn new(
        config: Config,
        engine: Box<dyn MediaEngine + Send>,
        activity: Box<dyn ActivitySink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let throttle_ms = config.playback.activity_throttle_secs * 1000;
        let selector = BufferPolicySelector::new(config.buffer.clone(), &config.playback);

        Self {
            config,
            clock,
            engine,
            activity: ActivityThrottle::new(activity, throttle_ms),
            handlers: EventHandlers::new(),
            network: NetworkQualityMonitor::default(),
            device: DeviceProfile::default(),
            selector,
            timers: Timers::new(),
            session: None,
            next_session_id: 0,
            next_ticket_seq: 0,
            generation: EngineGeneration::default(),
            visible: true,
            resolve_requests: Vec::new(),
        }
    }

    /// Device characteristics used for the next load
    pub fn set_device_profile(&mut self, device: DeviceProfile) {
        self.device = device;
    }

    pub fn add_event_handler(&mut self, handler: Box<dyn PlayerEventHandler>) {
        self.handlers.add(handler);
    }

    pub fn clear_event_handlers(&mut self) {
        self.handlers.clear();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generation that engine signals must carry to be accepted
    pub fn current_generation(&self) -> EngineGeneration {
        self.generation
    }

    pub fn network_quality(&self) -> NetworkQuality {
        self.network.quality()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn state(&self) -> PlaybackState {
        self.session.as_ref().map_or(PlaybackState::Idle, |s| s.state)
    }

    pub fn session(&self) -> Option<PlaybackSession> {
        self.session.as_ref().map(ActiveSession::snapshot)
    }

    /// Earliest pending timer deadline (epoch millis)
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Resolutions the driver must perform and answer with `on_resolved`
    pub fn take_resolve_requests(&mut self) -> Vec<ResolveRequest> {
        std::mem::take(&mut self.resolve_requests)
    }

    /// Current time on the controller's clock (epoch millis)
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn now(&self) -> u64 {
        self.now_ms()
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.handlers.emit(event);
    }

    /// Run `f` with the session taken out of `self`, so helpers can borrow both
    fn with_session<R>(&mut self, f: impl FnOnce(&mut Self, &mut ActiveSession) -> R) -> Option<R> {
        let mut session = self.session.take()?;
        let result = f(self, &mut session);
        if self.session.is_none() {
            self.session = Some(session);
        }
        Some(result)
    }

    /// Mount a new source, discarding everything about the previous one
    ///
    /// # Arguments
    ///
    /// * `reference` - Raw source reference (storage key, URL or embed link)
    /// * `options` - Restricted mode and optional resume point
    pub fn load(&mut self, reference: impl Into<String>, options: LoadOptions) -> SessionId {
        let reference = reference.into();
        self.teardown();

        self.next_session_id += 1;
        let id = SessionId(self.next_session_id);
        let now = self.now();
        let buffer = self.selector.select(&self.device, self.network.quality());
        let backend = match SourceKind::classify(&reference).embed_url() {
            Some(embed_url) => PlaybackBackend::Embedded { embed_url },
            None => PlaybackBackend::Native,
        };

        info!(
            "Loading {} as session {} ({:?}, restricted: {})",
            reference, id.0, backend, options.restricted_mode
        );
        let mut session = ActiveSession::new(id, reference, options, backend, buffer, &self.config);

        match session.backend.clone() {
            PlaybackBackend::Embedded { embed_url } => {
                self.emit(PlayerEvent::EmbedReady { embed_url });
                self.activity.signal(now);
                self.timers
                    .schedule(TimerKind::EmbedHeartbeat, now + self.config.playback.embed_heartbeat_secs * 1000);
            }
            PlaybackBackend::Native => {
                self.engine.set_native_controls(!session.restricted);
                self.request_resolution(&mut session, ResolvePurpose::Initial);
                self.timers.schedule(
                    TimerKind::StuckCheck,
                    now + self.config.playback.stuck_check_interval_secs * 1000,
                );
            }
        }

        self.session = Some(session);
        id
    }

    /// Tear down the current session, if any
    pub fn unload(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.timers.cancel_all();
        self.resolve_requests.clear();
        // anything the old engine load still reports is stale from here on
        self.generation = self.generation.next();

        if let Some(session) = self.session.take() {
            info!("Tearing down session {}", session.id.0);
            self.engine.unload();
        }
    }

    pub fn play(&mut self) -> Result<()> {
        let now = self.now();
        self.with_session(|this, s| {
            if s.is_embedded() {
                debug!("play() is handled by the embedded player");
                return Ok(());
            }
            if s.state == PlaybackState::ErrorExhausted {
                info!("play() ignored until playback is retried");
                return Ok(());
            }
            s.wants_playing = true;
            this.activity.signal(now);
            this.maybe_start_playback(s);
            Ok(())
        })
        .unwrap_or(Err(PlayerError::NoSource))
    }

    /// Pause and persist the resume point synchronously
    pub fn pause(&mut self) -> Result<()> {
        self.with_session(|this, s| {
            if s.is_embedded() {
                debug!("pause() is handled by the embedded player");
                return Ok(());
            }
            s.wants_playing = false;
            s.resume_after_buffering = false;
            s.engine_play_issued = false;
            this.engine.pause();
            s.buffering = false;
            this.cancel_buffering_timers();
            this.hide_indicator(s);
            this.persist_resume_point(s);
            if !s.state.is_error() {
                this.set_state(s, PlaybackState::Paused);
            }
            Ok(())
        })
        .unwrap_or(Err(PlayerError::NoSource))
    }

    /// Seek to `position`. Honored only outside restricted mode.
    pub fn seek_to(&mut self, position: f64) -> Result<bool> {
        if !position.is_finite() || position < 0.0 {
            return Err(PlayerError::InvalidInput(format!("seek target {}", position)));
        }

        self.with_session(|this, s| {
            if s.is_embedded() {
                return Ok(false);
            }
            if s.restricted {
                info!("Seek to {:.2}s refused in restricted mode", position);
                return Ok(false);
            }
            let target = if s.duration > 0.0 { position.min(s.duration) } else { position };
            this.engine.seek(target);
            s.current_time = target;
            this.emit(PlayerEvent::TimeUpdate { position: target });
            Ok(true)
        })
        .unwrap_or(Err(PlayerError::NoSource))
    }

    /// Jump back by `seconds`; always honored. Returns the new position.
    pub fn rewind(&mut self, seconds: f64) -> Result<f64> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlayerError::InvalidInput(format!("rewind by {}", seconds)));
        }

        self.with_session(|this, s| {
            if s.is_embedded() {
                return Ok(s.current_time);
            }
            let target = (s.current_time - seconds).max(0.0);
            debug!("Rewinding {:.2}s -> {:.2}s", s.current_time, target);
            this.engine.seek(target);
            s.current_time = target;
            this.emit(PlayerEvent::TimeUpdate { position: target });
            Ok(target)
        })
        .unwrap_or(Err(PlayerError::NoSource))
    }

    /// Manual recovery: reset counters and re-resolve from scratch
    pub fn retry_now(&mut self) -> Result<()> {
        self.with_session(|this, s| {
            if !s.is_embedded() {
                this.restart_from_scratch(s);
            }
        })
        .ok_or(PlayerError::NoSource)
    }

    fn restart_from_scratch(&mut self, s: &mut ActiveSession) {
        info!("Retrying session {} from scratch at {:.2}s", s.id.0, s.current_time);
        self.timers.cancel(TimerKind::RetryReload);
        self.timers.cancel(TimerKind::LocatorCheck);
        self.cancel_buffering_timers();
        s.retry.reset();
        s.stuck.reset();
        s.locator.clear();
        s.buffering = false;
        self.hide_indicator(s);
        self.set_state(s, PlaybackState::ErrorRetrying);
        let resume_at = s.current_time;
        self.request_resolution(s, ResolvePurpose::Retry { resume_at });
    }

    /// Caller-side update of the resume point. Ignored once one was applied.
    pub fn update_initial_position(&mut self, position: f64) -> bool {
        self.with_session(|_, s| {
            if s.initial_position_applied || !position.is_finite() || position < 0.0 {
                debug!("Ignoring late initial position {:.2}s", position);
                return false;
            }
            s.seek_on_metadata = Some(position);
            s.gate.seed(position);
            s.current_time = position;
            true
        })
        .unwrap_or(false)
    }

    pub fn set_visibility(&mut self, visible: bool) {
        if self.visible != visible {
            debug!("Host view visible: {}", visible);
        }
        self.visible = visible;
    }

    /// New connectivity sample from the platform
    pub fn on_link_change(&mut self, signals: LinkSignals) {
        let Some(change) = self.network.update(signals) else {
            return;
        };
        self.emit(PlayerEvent::NetworkQualityChanged { quality: change.current });

        if change.reconnected() {
            self.with_session(|this, s| {
                if s.state == PlaybackState::ErrorExhausted {
                    info!("Connectivity restored, retrying exhausted session");
                    this.restart_from_scratch(s);
                }
            });
        }
    }

    fn request_resolution(&mut self, s: &mut ActiveSession, purpose: ResolvePurpose) {
        self.next_ticket_seq += 1;
        let ticket = ResolveTicket {
            session: s.id,
            seq: self.next_ticket_seq,
        };
        debug!("Requesting resolution of {} ({:?})", s.reference, purpose);
        s.pending_resolve = Some((ticket, purpose));
        self.resolve_requests.push(ResolveRequest {
            ticket,
            reference: s.reference.clone(),
            purpose,
        });
    }

    /// Answer to a resolution request
    pub fn on_resolved(&mut self, ticket: ResolveTicket, result: Result<ResolvedLocator>) {
        self.with_session(|this, s| {
            let purpose = match s.pending_resolve {
                Some((pending, purpose)) if pending == ticket => purpose,
                _ => {
                    debug!("Dropping stale resolution for ticket {:?}", ticket);
                    return;
                }
            };
            s.pending_resolve = None;
            let now = this.now();

            let locator = match (purpose, result) {
                (ResolvePurpose::Refresh { .. }, Err(e)) => {
                    warn!("Locator refresh failed, keeping the current one: {}", e);
                    s.locator.abandon_refresh();
                    this.timers
                        .schedule(TimerKind::LocatorCheck, now + s.locator.check_interval_ms());
                    return;
                }
                (_, Ok(locator)) => {
                    s.used_fallback = false;
                    locator
                }
                (_, Err(e)) => {
                    warn!("Resolution of {} failed, playing it directly: {}", s.reference, e);
                    s.used_fallback = true;
                    ResolvedLocator::direct(s.reference.clone())
                }
            };

            let expiry_ms = s.locator.accept(&locator, now);
            s.resolved = Some(locator);

            let resume_at = match purpose {
                ResolvePurpose::Initial => None,
                ResolvePurpose::Retry { resume_at } | ResolvePurpose::Refresh { resume_at } => Some(resume_at),
            };
            this.start_engine(s, resume_at);

            if expiry_ms.is_some() {
                this.timers
                    .schedule(TimerKind::LocatorCheck, now + s.locator.check_interval_ms());
            } else {
                this.timers.cancel(TimerKind::LocatorCheck);
            }

            if let ResolvePurpose::Refresh { resume_at } = purpose {
                let resume_at = s.locator.finish_refresh().unwrap_or(resume_at);
                s.current_time = resume_at;
                info!("Locator refreshed, resuming at {:.2}s", resume_at);
                this.emit(PlayerEvent::LocatorRefreshed { expiry_ms });
                this.emit(PlayerEvent::TimeUpdate { position: resume_at });
            }
        });
    }

    /// Load the resolved locator into the engine under a fresh generation
    fn start_engine(&mut self, s: &mut ActiveSession, resume_at: Option<f64>) {
        let Some(url) = s.resolved.as_ref().map(|l| l.url.clone()) else {
            return;
        };

        self.generation = self.generation.next();
        self.cancel_buffering_timers();
        self.timers.cancel(TimerKind::SeekCorrectionRelease);
        s.gate.release_correction();
        s.ready_state = ReadyState::HaveNothing;
        s.buffered.clear();
        s.buffer_status = BufferStatus::default();
        s.buffering = false;
        s.initial_buffer_ready = false;
        s.engine_play_issued = false;
        self.hide_indicator(s);

        if let Some(position) = resume_at.filter(|p| *p > 0.0) {
            s.seek_on_metadata = Some(position);
        }

        debug!("Loading engine generation {} with {}", self.generation.0, url);
        if let Err(e) = self.engine.load(self.generation, &url, s.buffer.preload) {
            warn!("Engine rejected {}: {}", url, e);
            self.handle_fault(s, EngineFault::new(FaultKind::SourceNotSupported, e.to_string()));
            return;
        }

        self.maybe_start_playback(s);
    }

    fn maybe_start_playback(&mut self, s: &mut ActiveSession) {
        if !s.wants_playing || s.engine_play_issued || s.resolved.is_none() {
            return;
        }
        if matches!(s.state, PlaybackState::SmartBuffering | PlaybackState::ErrorExhausted) {
            return;
        }
        if s.restricted && !s.initial_buffer_ready {
            debug!("Deferring playback until the initial buffer is satisfied");
            return;
        }

        match self.engine.play() {
            Ok(()) => s.engine_play_issued = true,
            Err(e) => {
                warn!("Engine refused to play: {}", e);
                self.handle_fault(s, EngineFault::new(FaultKind::Unknown, e.to_string()));
            }
        }
    }

    fn set_state(&mut self, s: &mut ActiveSession, next: PlaybackState) {
        if s.state == next {
            return;
        }
        let was_playing = s.state.is_playing();
        info!("Session {}: {:?} -> {:?}", s.id.0, s.state, next);
        s.state = next;
        if was_playing != next.is_playing() {
            self.emit(PlayerEvent::PlayStateChanged {
                playing: next.is_playing(),
            });
        }
    }

    fn persist_resume_point(&mut self, s: &mut ActiveSession) {
        let position = s.gate.on_pause(s.current_time);
        s.resume_point = Some(position);
        self.emit(PlayerEvent::ResumePoint { position });
    }

    fn cancel_buffering_timers(&mut self) {
        self.timers.cancel(TimerKind::BufferEscalation);
        self.timers.cancel(TimerKind::BufferingIndicator);
    }

    fn hide_indicator(&mut self, s: &mut ActiveSession) {
        if s.indicator_shown {
            s.indicator_shown = false;
            self.emit(PlayerEvent::BufferingChanged { buffering: false });
        }
    }

    /// Feed one engine signal. Returns false when it was stale.
    pub fn handle_signal(&mut self, envelope: SignalEnvelope) -> bool {
        if envelope.generation != self.generation {
            debug!(
                "Dropping {:?} from stale generation {} (current {})",
                envelope.signal, envelope.generation.0, self.generation.0
            );
            return false;
        }

        self.with_session(|this, s| {
            if s.is_embedded() {
                return false;
            }
            this.dispatch_signal(s, envelope.signal);
            true
        })
        .unwrap_or(false)
    }

    fn dispatch_signal(&mut self, s: &mut ActiveSession, signal: EngineSignal) {
        let now = self.now();
        match signal {
            EngineSignal::LoadedMetadata { duration } => {
                s.ready_state = s.ready_state.max(ReadyState::HaveMetadata);
                self.update_duration(s, duration);
                self.apply_seek_on_metadata(s, now);
            }
            EngineSignal::DurationChanged { duration } => self.update_duration(s, duration),
            EngineSignal::CanPlay => {
                s.ready_state = s.ready_state.max(ReadyState::HaveFutureData);
                self.on_data_resumed(s);
                self.on_reload_ready(s);
                self.maybe_start_playback(s);
            }
            EngineSignal::CanPlayThrough => {
                s.ready_state = ReadyState::HaveEnoughData;
                self.on_data_resumed(s);
                self.on_reload_ready(s);
                self.maybe_start_playback(s);
            }
            EngineSignal::Playing => self.on_engine_playing(s, now),
            EngineSignal::Paused => {
                if s.state.is_playing() {
                    debug!("Engine paused outside the controller");
                    s.wants_playing = false;
                    s.engine_play_issued = false;
                    s.buffering = false;
                    self.cancel_buffering_timers();
                    self.hide_indicator(s);
                    self.persist_resume_point(s);
                    self.set_state(s, PlaybackState::Paused);
                }
            }
            EngineSignal::Waiting => self.on_starved(s, false, now),
            EngineSignal::Stalled => self.on_starved(s, true, now),
            EngineSignal::Seeking { target } => match s.gate.on_seek(target, s.buffering) {
                SeekVerdict::Corrected { to } => {
                    self.engine.seek(to);
                    s.current_time = to;
                    self.timers.schedule(
                        TimerKind::SeekCorrectionRelease,
                        now + self.config.playback.seek_correction_hold_ms,
                    );
                    self.emit(PlayerEvent::SeekCorrected {
                        requested: target,
                        corrected: to,
                    });
                    self.emit(PlayerEvent::TimeUpdate { position: to });
                }
                SeekVerdict::Allowed => s.current_time = target,
                SeekVerdict::Ignored => {}
            },
            EngineSignal::Seeked { position } => {
                s.current_time = position;
                self.update_buffer_status(s);
            }
            EngineSignal::TimeUpdate { position } => {
                s.current_time = position;
                s.gate.on_progress(position, s.buffering);
                if s.wants_playing {
                    self.activity.signal(now);
                }
                self.emit(PlayerEvent::TimeUpdate { position });
            }
            EngineSignal::Progress { buffered } => {
                s.buffered = buffered;
                self.update_buffer_status(s);
                self.on_buffer_updated(s);
            }
            EngineSignal::RateChange { rate } => {
                if (rate - 1.0).abs() > RATE_EPSILON {
                    warn!("Playback rate {} reverted to normal speed", rate);
                    self.engine.set_playback_rate(1.0);
                }
            }
            EngineSignal::Ended => self.on_ended(s),
            EngineSignal::Error { fault } => self.handle_fault(s, fault),
        }
    }

    fn update_duration(&mut self, s: &mut ActiveSession, duration: f64) {
        if duration.is_finite() && duration > 0.0 && (duration - s.duration).abs() > f64::EPSILON {
            s.duration = duration;
            self.emit(PlayerEvent::DurationKnown { duration });
        }
    }

    fn apply_seek_on_metadata(&mut self, s: &mut ActiveSession, now: u64) {
        s.initial_position_applied = true;
        let Some(position) = s.seek_on_metadata.take() else {
            return;
        };
        let target = if s.duration > 0.0 { position.min(s.duration) } else { position };

        debug!("Applying resume position {:.2}s", target);
        s.gate.begin_internal_seek(target);
        self.engine.seek(target);
        s.current_time = target;
        self.timers.schedule(
            TimerKind::SeekCorrectionRelease,
            now + self.config.playback.seek_correction_hold_ms,
        );
        self.emit(PlayerEvent::TimeUpdate { position: target });
    }

    fn on_engine_playing(&mut self, s: &mut ActiveSession, now: u64) {
        s.ready_state = s.ready_state.max(ReadyState::HaveFutureData);
        s.wants_playing = true;
        s.engine_play_issued = true;
        self.on_data_resumed(s);

        if s.state == PlaybackState::ErrorRetrying {
            s.retry.on_success();
            info!("Session {} recovered at {:.2}s", s.id.0, s.current_time);
            self.emit(PlayerEvent::Recovered);
        }
        if s.state != PlaybackState::SmartBuffering {
            self.set_state(s, PlaybackState::Playing);
        }
        self.activity.signal(now);
    }

    fn on_starved(&mut self, s: &mut ActiveSession, stalled: bool, now: u64) {
        s.ready_state = s.ready_state.min(ReadyState::HaveCurrentData);
        // a paused or idle engine stalling is not a buffering episode
        if s.state.is_error() || !s.state.is_playing() {
            return;
        }
        if !s.buffering {
            debug!("Engine starved at {:.2}s (stalled: {})", s.current_time, stalled);
        }
        s.buffering = true;

        match (s.state, stalled) {
            (PlaybackState::Playing, false) => self.set_state(s, PlaybackState::Waiting),
            (PlaybackState::Playing, true) => self.set_state(s, PlaybackState::Stalled),
            _ => {}
        }

        self.timers
            .schedule_if_idle(TimerKind::BufferingIndicator, now + s.buffer.buffering_state_delay_ms);
        if s.restricted {
            self.timers
                .schedule_if_idle(TimerKind::BufferEscalation, now + s.buffer.smart_buffering_delay_ms);
        }
    }

    /// Data flows again before escalation
    fn on_data_resumed(&mut self, s: &mut ActiveSession) {
        if !s.buffering || s.state == PlaybackState::SmartBuffering {
            return;
        }
        s.buffering = false;
        self.cancel_buffering_timers();
        // the apparent jump across the starved span is not a skip
        s.gate.resync(s.current_time);
        self.hide_indicator(s);
        if matches!(s.state, PlaybackState::Waiting | PlaybackState::Stalled) {
            self.set_state(s, PlaybackState::Playing);
        }
    }

    /// A paused session's reload loaded cleanly; no Playing signal will follow
    fn on_reload_ready(&mut self, s: &mut ActiveSession) {
        if s.state != PlaybackState::ErrorRetrying || s.wants_playing {
            return;
        }
        if s.pending_resolve.is_some() || self.timers.is_pending(TimerKind::RetryReload) {
            return;
        }
        s.retry.on_success();
        info!("Session {} recovered while paused at {:.2}s", s.id.0, s.current_time);
        self.emit(PlayerEvent::Recovered);
        self.set_state(s, PlaybackState::Paused);
    }

    fn update_buffer_status(&mut self, s: &mut ActiveSession) {
        let status = BufferStatus::compute(&s.buffered, s.current_time, s.duration, s.buffer.min_buffer_secs);
        let changed = (status.percent - s.buffer_status.percent).abs() > f64::EPSILON;
        s.buffer_status = status;
        if changed {
            self.emit(PlayerEvent::BufferProgress { percent: status.percent });
        }
    }

    fn on_buffer_updated(&mut self, s: &mut ActiveSession) {
        if !s.buffer_status.satisfied {
            return;
        }
        if !s.initial_buffer_ready {
            s.initial_buffer_ready = true;
            debug!("Initial buffer satisfied ({:.1}s ahead)", s.buffer_status.ahead_secs);
        }
        self.on_data_resumed(s);
        if s.state == PlaybackState::SmartBuffering {
            self.exit_smart_buffering(s);
        }
        self.maybe_start_playback(s);
    }

    fn enter_smart_buffering(&mut self, s: &mut ActiveSession) {
        if !s.buffering || !s.state.is_playing() {
            return;
        }
        info!("Still starved at {:.2}s, pausing until buffered", s.current_time);
        s.resume_after_buffering = s.wants_playing;
        s.engine_play_issued = false;
        self.engine.pause();
        self.set_state(s, PlaybackState::SmartBuffering);
    }

    fn exit_smart_buffering(&mut self, s: &mut ActiveSession) {
        s.buffering = false;
        self.cancel_buffering_timers();
        s.gate.resync(s.current_time);
        self.hide_indicator(s);

        if s.resume_after_buffering {
            s.resume_after_buffering = false;
            info!("Buffer target reached, resuming at {:.2}s", s.current_time);
            self.set_state(s, PlaybackState::Playing);
            self.maybe_start_playback(s);
        } else {
            self.set_state(s, PlaybackState::Paused);
        }
    }

    fn on_ended(&mut self, s: &mut ActiveSession) {
        info!("Session {} reached the end", s.id.0);
        if s.duration > 0.0 {
            s.gate.complete(s.duration);
            s.current_time = s.duration;
        }
        s.wants_playing = false;
        s.engine_play_issued = false;
        s.buffering = false;
        self.cancel_buffering_timers();
        self.hide_indicator(s);
        self.set_state(s, PlaybackState::Paused);
        self.persist_resume_point(s);
        self.emit(PlayerEvent::Completed);
    }

    fn handle_fault(&mut self, s: &mut ActiveSession, fault: EngineFault) {
        if !fault.is_recoverable() {
            debug!("Ignoring aborted fetch: {}", fault.message);
            return;
        }
        if s.state == PlaybackState::ErrorExhausted || self.timers.is_pending(TimerKind::RetryReload) {
            debug!("Fault {:?} while already recovering", fault.kind);
            return;
        }

        warn!("Engine fault {:?} at {:.2}s: {}", fault.kind, s.current_time, fault.message);
        self.cancel_buffering_timers();
        s.buffering = false;
        s.engine_play_issued = false;
        self.hide_indicator(s);

        let decision = if s.used_fallback {
            s.retry.exhaust()
        } else {
            s.retry.on_fault()
        };

        match decision {
            RetryDecision::Retry { attempt, delay_ms } => {
                let now = self.now();
                self.set_state(s, PlaybackState::ErrorRetrying);
                self.timers.schedule(TimerKind::RetryReload, now + delay_ms);
                self.emit(PlayerEvent::RetryScheduled { attempt, delay_ms });
            }
            RetryDecision::Exhausted { attempts } => {
                let kind = if self.network.is_offline() {
                    FailureKind::NetworkOffline
                } else if s.used_fallback {
                    FailureKind::SourceUnavailable
                } else {
                    FailureKind::Playback
                };
                error!("Session {} failed after {} attempts ({:?})", s.id.0, attempts, kind);
                self.timers.cancel(TimerKind::RetryReload);
                self.set_state(s, PlaybackState::ErrorExhausted);
                self.emit(PlayerEvent::Failed(PlaybackFailure {
                    kind,
                    message: fault.message,
                    attempts,
                }));
            }
        }
    }

    /// Fire every timer that is due. Returns how many fired.
    pub fn poll_timers(&mut self) -> usize {
        let now = self.now();
        let due = self.timers.take_due(now);
        let fired = due.len();
        for kind in due {
            debug!("Timer {:?} fired", kind);
            self.with_session(|this, s| this.fire_timer(s, kind, now));
        }
        fired
    }

    fn fire_timer(&mut self, s: &mut ActiveSession, kind: TimerKind, now: u64) {
        match kind {
            TimerKind::BufferEscalation => self.enter_smart_buffering(s),
            TimerKind::BufferingIndicator => {
                if s.buffering && !s.indicator_shown {
                    s.indicator_shown = true;
                    self.emit(PlayerEvent::BufferingChanged { buffering: true });
                }
            }
            TimerKind::RetryReload => {
                let resume_at = s.current_time;
                if s.locator.is_expired(now) {
                    info!("Locator expired, re-resolving before retry");
                    self.request_resolution(s, ResolvePurpose::Retry { resume_at });
                } else {
                    info!("Reloading session {} at {:.2}s", s.id.0, resume_at);
                    self.start_engine(s, Some(resume_at));
                }
            }
            TimerKind::StuckCheck => {
                let input = StuckCheckInput {
                    position: s.current_time,
                    playing: s.state == PlaybackState::Playing,
                    buffering: s.buffering,
                    visible: self.visible,
                    ready_state: s.ready_state,
                };
                if s.stuck.check(input) == StuckVerdict::Stuck {
                    self.restart_from_scratch(s);
                }
                self.timers.schedule(
                    TimerKind::StuckCheck,
                    now + self.config.playback.stuck_check_interval_secs * 1000,
                );
            }
            TimerKind::LocatorCheck => {
                if s.pending_resolve.is_none() && s.locator.needs_refresh(now) {
                    let position = s.current_time;
                    s.locator.begin_refresh(position);
                    self.request_resolution(s, ResolvePurpose::Refresh { resume_at: position });
                } else {
                    self.timers
                        .schedule(TimerKind::LocatorCheck, now + s.locator.check_interval_ms());
                }
            }
            TimerKind::SeekCorrectionRelease => s.gate.release_correction(),
            TimerKind::EmbedHeartbeat => {
                self.activity.signal(now);
                self.timers
                    .schedule(TimerKind::EmbedHeartbeat, now + self.config.playback.embed_heartbeat_secs * 1000);
            }
        }
    }
}

impl Drop for PlaybackSessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
