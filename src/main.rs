use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gateplay::buffer::DeviceProfile;
use gateplay::engine::{EngineSignal, RecordingEngine, SignalEnvelope};
use gateplay::network::LinkSignals;
use gateplay::player::{EventLog, LoadOptions, PlaybackSessionController};
use gateplay::source::{LoggingActivitySink, ResolvedLocator};
use gateplay::utils::{format_position, Config, ManualClock, PlayerError};

/// gateplay - gated media playback controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file (defaults to the system/user files and GATEPLAY_* variables)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON scenario against the controller
    Replay {
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// A scripted session: timed operations and engine signals
#[derive(Debug, Deserialize)]
struct Scenario {
    /// Clock origin, Unix epoch millis
    #[serde(default)]
    start_ms: u64,

    #[serde(default)]
    device: Option<DeviceProfile>,

    /// Keep firing timers until this offset after the last step
    #[serde(default)]
    end_ms: Option<u64>,

    steps: Vec<ScenarioStep>,
}

#[derive(Debug, Deserialize)]
struct ScenarioStep {
    /// Offset from `start_ms`
    at_ms: u64,

    #[serde(flatten)]
    op: ScenarioOp,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ScenarioOp {
    Load {
        reference: String,
        #[serde(default)]
        options: LoadOptions,
    },
    Play,
    Pause,
    Seek {
        position: f64,
    },
    Rewind {
        seconds: f64,
    },
    Retry,
    Visibility {
        visible: bool,
    },
    Link {
        signals: LinkSignals,
    },
    /// Engine signal for the current load
    Signal {
        signal: EngineSignal,
    },
    /// Answer every pending resolution. Without a locator or an error the
    /// reference itself is returned as a direct locator.
    Resolve {
        #[serde(default)]
        locator: Option<ResolvedLocator>,
        #[serde(default)]
        error: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let config = match &args.config {
        Some(path) => {
            let config = Config::from_file(path).with_context(|| format!("loading {}", path.display()))?;
            config.validate()?;
            config
        }
        None => gateplay::utils::load_config()?,
    };

    match args.command {
        Command::Replay { scenario } => replay(&scenario, config),
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn replay(path: &Path, config: Config) -> Result<()> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut scenario: Scenario =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    scenario.steps.sort_by_key(|step| step.at_ms);

    info!("Replaying {} steps from {}", scenario.steps.len(), path.display());

    let clock = ManualClock::new(scenario.start_ms);
    let engine = RecordingEngine::new();
    let events = EventLog::new();
    let mut controller = PlaybackSessionController::new(
        config,
        Box::new(engine.clone()),
        Box::new(LoggingActivitySink),
        Arc::new(clock.clone()),
    );
    controller.add_event_handler(events.handler());
    if let Some(device) = scenario.device {
        controller.set_device_profile(device);
    }

    let mut replay = Replay {
        start_ms: scenario.start_ms,
        clock,
        engine,
        events,
        controller,
    };

    for step in scenario.steps {
        replay.advance_to(step.at_ms);
        debug!("Step at +{}ms: {:?}", step.at_ms, step.op);
        replay.apply(step.op)?;
        replay.flush(step.at_ms)?;
    }

    if let Some(end_ms) = scenario.end_ms {
        replay.advance_to(end_ms);
        replay.flush(end_ms)?;
    }

    match replay.controller.session() {
        Some(session) => {
            println!(
                "final: {} at {} (ratchet {})",
                serde_json::to_string(&session.playback_state)?,
                format_position(session.current_time),
                format_position(session.max_reached_position)
            );
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        None => println!("final: no session"),
    }

    Ok(())
}

struct Replay {
    start_ms: u64,
    clock: ManualClock,
    engine: RecordingEngine,
    events: EventLog,
    controller: PlaybackSessionController,
}

impl Replay {
    /// Step the clock to `offset_ms`, firing timers at their own deadlines
    fn advance_to(&mut self, offset_ms: u64) {
        let target = self.start_ms + offset_ms;
        while let Some(deadline) = self.controller.next_deadline() {
            if deadline > target {
                break;
            }
            self.clock.set(deadline.max(self.controller.now_ms()));
            self.controller.poll_timers();
            if let Err(e) = self.flush(deadline.saturating_sub(self.start_ms)) {
                warn!("Could not print replay output: {}", e);
            }
        }
        self.clock.set(target.max(self.controller.now_ms()));
    }

    fn apply(&mut self, op: ScenarioOp) -> Result<()> {
        let outcome = match op {
            ScenarioOp::Load { reference, options } => {
                self.controller.load(reference, options);
                Ok(())
            }
            ScenarioOp::Play => self.controller.play(),
            ScenarioOp::Pause => self.controller.pause(),
            ScenarioOp::Seek { position } => self.controller.seek_to(position).map(|honored| {
                if !honored {
                    info!("Seek to {} not honored", format_position(position));
                }
            }),
            ScenarioOp::Rewind { seconds } => self.controller.rewind(seconds).map(|_| ()),
            ScenarioOp::Retry => self.controller.retry_now(),
            ScenarioOp::Visibility { visible } => {
                self.controller.set_visibility(visible);
                Ok(())
            }
            ScenarioOp::Link { signals } => {
                self.controller.on_link_change(signals);
                Ok(())
            }
            ScenarioOp::Signal { signal } => {
                let generation = self.controller.current_generation();
                self.controller.handle_signal(SignalEnvelope::new(generation, signal));
                Ok(())
            }
            ScenarioOp::Resolve { locator, error } => {
                for request in self.controller.take_resolve_requests() {
                    let result = match (&locator, &error) {
                        (_, Some(message)) => Err(PlayerError::resolution_error(message.clone())),
                        (Some(locator), None) => Ok(locator.clone()),
                        (None, None) => Ok(ResolvedLocator::direct(request.reference.clone())),
                    };
                    self.controller.on_resolved(request.ticket, result);
                }
                Ok(())
            }
        };

        // operations refused by the controller are part of the replay, not fatal
        if let Err(e) = outcome {
            println!("[+{}ms] refused: {}", self.clock_offset(), e);
        }
        Ok(())
    }

    fn clock_offset(&self) -> u64 {
        self.controller.now_ms().saturating_sub(self.start_ms)
    }

    fn flush(&self, offset_ms: u64) -> Result<()> {
        for event in self.events.take() {
            println!("[+{}ms] event  {}", offset_ms, serde_json::to_string(&event)?);
        }
        for command in self.engine.take_commands() {
            println!("[+{}ms] engine {}", offset_ms, serde_json::to_string(&command)?);
        }
        Ok(())
    }
}
