//! Async driver for one playback controller
//!
//! The controller itself never awaits. This module runs it on a tokio task:
//! commands and engine signals arrive over an unbounded channel, resolver
//! futures run on their own tasks and report back through a second channel,
//! and the loop sleeps until the controller's next timer deadline.
//!
//! Give the controller a [`TokioClock`](crate::utils::TokioClock) so its
//! deadlines follow the same clock tokio sleeps on.

use crate::engine::SignalEnvelope;
use crate::network::LinkSignals;
use crate::player::{LoadOptions, PlaybackSession, PlaybackSessionController, ResolveTicket};
use crate::source::{MediaLocatorResolver, ResolvedLocator};
use crate::utils::error::{PlayerError, Result};

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Command for the runtime task
#[derive(Debug)]
pub enum PlayerCommand {
    Load { reference: String, options: LoadOptions },
    Play,
    Pause,
    SeekTo(f64),
    Rewind(f64),
    RetryNow,
    SetVisibility(bool),
    LinkChanged(LinkSignals),
    Signal(SignalEnvelope),
    Snapshot(oneshot::Sender<Option<PlaybackSession>>),
    Shutdown,
}

type Resolution = (ResolveTicket, Result<ResolvedLocator>);

/// Spawns controllers onto the tokio runtime
pub struct PlayerRuntime;

impl PlayerRuntime {
    /// Move `controller` onto a new task. The task ends on `Shutdown` or
    /// when every handle is dropped; the controller is torn down either way.
    pub fn spawn(
        controller: PlaybackSessionController,
        resolver: Arc<dyn MediaLocatorResolver>,
    ) -> (RuntimeHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(controller, resolver, command_rx));
        (RuntimeHandle { command_tx }, task)
    }
}

/// Cloneable sender side of a running controller
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl RuntimeHandle {
    pub fn send(&self, command: PlayerCommand) -> Result<()> {
        self.command_tx.send(command).map_err(|_| PlayerError::ChannelClosed)
    }

    pub fn load(&self, reference: impl Into<String>, options: LoadOptions) -> Result<()> {
        self.send(PlayerCommand::Load {
            reference: reference.into(),
            options,
        })
    }

    pub fn play(&self) -> Result<()> {
        self.send(PlayerCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause)
    }

    pub fn seek_to(&self, position: f64) -> Result<()> {
        self.send(PlayerCommand::SeekTo(position))
    }

    pub fn rewind(&self, seconds: f64) -> Result<()> {
        self.send(PlayerCommand::Rewind(seconds))
    }

    pub fn retry_now(&self) -> Result<()> {
        self.send(PlayerCommand::RetryNow)
    }

    pub fn set_visibility(&self, visible: bool) -> Result<()> {
        self.send(PlayerCommand::SetVisibility(visible))
    }

    pub fn link_changed(&self, signals: LinkSignals) -> Result<()> {
        self.send(PlayerCommand::LinkChanged(signals))
    }

    /// Forward an engine signal
    pub fn signal(&self, envelope: SignalEnvelope) -> Result<()> {
        self.send(PlayerCommand::Signal(envelope))
    }

    /// Current session, after every previously sent command was applied
    pub async fn snapshot(&self) -> Result<Option<PlaybackSession>> {
        let (tx, rx) = oneshot::channel();
        self.send(PlayerCommand::Snapshot(tx))?;
        rx.await.map_err(|_| PlayerError::ChannelClosed)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(PlayerCommand::Shutdown)
    }
}

async fn run(
    mut controller: PlaybackSessionController,
    resolver: Arc<dyn MediaLocatorResolver>,
    mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
) {
    let (resolved_tx, mut resolved_rx) = mpsc::unbounded_channel::<Resolution>();
    info!("Player runtime started");

    loop {
        spawn_resolutions(&mut controller, &resolver, &resolved_tx);

        let delay = controller
            .next_deadline()
            .map(|deadline| Duration::from_millis(deadline.saturating_sub(controller.now_ms())));
        let timer = async move {
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            command = commands.recv() => match command {
                Some(PlayerCommand::Shutdown) | None => break,
                Some(command) => apply(&mut controller, command),
            },
            Some((ticket, result)) = resolved_rx.recv() => controller.on_resolved(ticket, result),
            _ = timer => {
                controller.poll_timers();
            }
        }
    }

    controller.unload();
    info!("Player runtime stopped");
}

fn spawn_resolutions(
    controller: &mut PlaybackSessionController,
    resolver: &Arc<dyn MediaLocatorResolver>,
    resolved_tx: &mpsc::UnboundedSender<Resolution>,
) {
    for request in controller.take_resolve_requests() {
        debug!("Resolving {} ({:?})", request.reference, request.purpose);
        let future = resolver.resolve(&request.reference);
        let tx = resolved_tx.clone();
        let ticket = request.ticket;
        tokio::spawn(async move {
            let result = future.await;
            // the loop may already be gone
            let _ = tx.send((ticket, result));
        });
    }
}

fn apply(controller: &mut PlaybackSessionController, command: PlayerCommand) {
    let result = match command {
        PlayerCommand::Load { reference, options } => {
            controller.load(reference, options);
            Ok(())
        }
        PlayerCommand::Play => controller.play(),
        PlayerCommand::Pause => controller.pause(),
        PlayerCommand::SeekTo(position) => controller.seek_to(position).map(|_| ()),
        PlayerCommand::Rewind(seconds) => controller.rewind(seconds).map(|_| ()),
        PlayerCommand::RetryNow => controller.retry_now(),
        PlayerCommand::SetVisibility(visible) => {
            controller.set_visibility(visible);
            Ok(())
        }
        PlayerCommand::LinkChanged(signals) => {
            controller.on_link_change(signals);
            Ok(())
        }
        PlayerCommand::Signal(envelope) => {
            controller.handle_signal(envelope);
            Ok(())
        }
        PlayerCommand::Snapshot(reply) => {
            let _ = reply.send(controller.session());
            Ok(())
        }
        PlayerCommand::Shutdown => Ok(()),
    };

    if let Err(e) = result {
        warn!("Command failed: {}", e);
    }
}
