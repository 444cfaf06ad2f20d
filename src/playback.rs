//! Playback controller: play/pause/stop commands for uploaded animations.
//!
//! The device driver owns the real playback state. The client only tracks
//! whether a command for an asset is in flight, so the same asset can't be
//! commanded twice at once, and shows a short confirmation after success.
//!
//! ## Rust concepts
//! - `Arc<Mutex<HashMap>>` shared between clones of the controller
//! - RAII guards: `Drop` returns the control to idle on every exit path,
//!   including a caller dropping the future mid-request
//! - `FromStr` + `Display` for parsing and printing enum values

use crate::client::{Ack, DeviceApi};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How long a successful command keeps its control in the confirmed state.
pub const CONFIRM_DURATION: Duration = Duration::from_millis(500);

// ── Commands ─────────────────────────────────────────────────────────

/// A command for the remote animation driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackCommand {
    Play,
    Pause,
    Stop,
}

impl PlaybackCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackCommand::Play => "play",
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::Stop => "stop",
        }
    }

    /// Text shown on the control while the command is in flight.
    pub fn busy_label(self) -> &'static str {
        match self {
            PlaybackCommand::Play => "Playing...",
            PlaybackCommand::Pause => "Pausing...",
            PlaybackCommand::Stop => "Stopping...",
        }
    }
}

impl fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "play" => Ok(PlaybackCommand::Play),
            "pause" => Ok(PlaybackCommand::Pause),
            "stop" => Ok(PlaybackCommand::Stop),
            other => Err(format!("unknown action '{other}' (expected play, pause or stop)")),
        }
    }
}

// ── Control state ────────────────────────────────────────────────────

/// What an asset's controls are showing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlState {
    /// Enabled, original label
    Idle,
    /// Disabled, busy label
    Commanding(PlaybackCommand),
    /// Disabled, "active" highlight after a successful command
    Confirming(PlaybackCommand),
}

impl ControlState {
    pub fn is_enabled(self) -> bool {
        self == ControlState::Idle
    }
}

/// Issues playback commands and tracks per-asset in-flight state.
///
/// Cloning is cheap and clones share state, so one controller can be
/// handed to every place that renders controls for an asset.
#[derive(Clone, Debug)]
pub struct PlaybackController {
    controls: Arc<Mutex<HashMap<String, ControlState>>>,
    confirm_for: Duration,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(CONFIRM_DURATION)
    }
}

impl PlaybackController {
    pub fn new(confirm_for: Duration) -> Self {
        Self {
            controls: Arc::new(Mutex::new(HashMap::new())),
            confirm_for,
        }
    }

    /// Current control state for `id`. Unknown assets are idle.
    pub fn state(&self, id: &str) -> ControlState {
        self.lock().get(id).copied().unwrap_or(ControlState::Idle)
    }

    pub fn is_busy(&self, id: &str) -> bool {
        !self.state(id).is_enabled()
    }

    /// Send `command` for asset `id`.
    ///
    /// Returns [`Error::Busy`] without touching the network if a command
    /// for this asset has not finished its cycle yet. On success the
    /// control stays in [`ControlState::Confirming`] for the confirmation
    /// window before this resolves; on failure it is released immediately.
    /// Nothing is retried.
    pub async fn command<A: DeviceApi>(
        &self,
        api: &A,
        id: &str,
        command: PlaybackCommand,
    ) -> Result<Ack> {
        let in_flight = self.begin(id, command)?;
        tracing::debug!("{} {}", command.busy_label(), id);

        match api.animate(id, command).await {
            Ok(ack) => {
                tracing::info!("Animation {} acknowledged for {}", command, id);
                in_flight.confirm();
                tokio::time::sleep(self.confirm_for).await;
                Ok(ack)
            }
            Err(e) => {
                tracing::error!("Animation {} failed for {}: {}", command, id, e);
                Err(e)
            }
        }
    }

    fn begin(&self, id: &str, command: PlaybackCommand) -> Result<InFlight<'_>> {
        let mut controls = self.lock();
        if controls.get(id).is_some_and(|s| !s.is_enabled()) {
            return Err(Error::Busy { id: id.to_string() });
        }
        controls.insert(id.to_string(), ControlState::Commanding(command));

        Ok(InFlight {
            controller: self,
            id: id.to_string(),
            command,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ControlState>> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks an asset busy for as long as it lives.
struct InFlight<'a> {
    controller: &'a PlaybackController,
    id: String,
    command: PlaybackCommand,
}

impl InFlight<'_> {
    fn confirm(&self) {
        self.controller
            .lock()
            .insert(self.id.clone(), ControlState::Confirming(self.command));
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.controller.lock().remove(&self.id);
    }
}
