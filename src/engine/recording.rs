//! Engine binding that records the commands it receives.
//!
//! Used by scenario replay, where signals are scripted rather than
//! produced by real media, and by tests.

use super::{EngineGeneration, MediaEngine};
use crate::buffer::PreloadStrategy;
use crate::utils::error::{PlayerError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A command issued to the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    Load {
        generation: EngineGeneration,
        url: String,
        preload: PreloadStrategy,
    },
    Play,
    Pause,
    Seek { position: f64 },
    SetPlaybackRate { rate: f64 },
    SetNativeControls { enabled: bool },
    Unload,
}

/// Records commands into a shared log. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    log: Arc<Mutex<Vec<EngineCommand>>>,
    fail_loads: Arc<Mutex<bool>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `load` calls fail
    pub fn set_fail_loads(&self, fail: bool) {
        *self.fail_loads.lock() = fail;
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.log.lock().clone()
    }

    /// Drain recorded commands
    pub fn take_commands(&self) -> Vec<EngineCommand> {
        std::mem::take(&mut *self.log.lock())
    }

    /// Most recent seek target, if any
    pub fn last_seek(&self) -> Option<f64> {
        self.log.lock().iter().rev().find_map(|c| match c {
            EngineCommand::Seek { position } => Some(*position),
            _ => None,
        })
    }

    /// Generation of the most recent load, if any
    pub fn last_generation(&self) -> Option<EngineGeneration> {
        self.log.lock().iter().rev().find_map(|c| match c {
            EngineCommand::Load { generation, .. } => Some(*generation),
            _ => None,
        })
    }

    fn record(&self, command: EngineCommand) {
        self.log.lock().push(command);
    }
}

impl MediaEngine for RecordingEngine {
    fn load(&mut self, generation: EngineGeneration, url: &str, preload: PreloadStrategy) -> Result<()> {
        if *self.fail_loads.lock() {
            return Err(PlayerError::Engine(format!("cannot open {}", url)));
        }
        self.record(EngineCommand::Load {
            generation,
            url: url.to_string(),
            preload,
        });
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record(EngineCommand::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.record(EngineCommand::Pause);
    }

    fn seek(&mut self, position: f64) {
        self.record(EngineCommand::Seek { position });
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.record(EngineCommand::SetPlaybackRate { rate });
    }

    fn set_native_controls(&mut self, enabled: bool) {
        self.record(EngineCommand::SetNativeControls { enabled });
    }

    fn unload(&mut self) {
        self.record(EngineCommand::Unload);
    }
}
