//! Request/response boundary between the control surface and the overlay
//! manager.
//!
//! Commands travel as `{"command": "<name>", "payload": ..}`. Each one gets
//! exactly one reply. A single [`OverlayService`] task owns the manager, so
//! window operations never run concurrently, but replies may complete out of
//! order: a create waits for its content to load while later commands are
//! served.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

use crate::{
    Error,
    overlay::{
        Bounds, LoadSignal, OverlayDescriptor, OverlayManager, PendingLoad, Position,
        SurfaceEvent, WindowBackend,
    },
    store::Positions,
};

pub const TOGGLE_CLICK_THROUGH: &str = "toggle-click-through";
pub const GET_WINDOW_BOUNDS: &str = "get-window-bounds";
pub const CREATE_OVERLAY: &str = "create-overlay";
pub const CLOSE_OVERLAY: &str = "close-overlay";
pub const CLOSE_ALL_OVERLAYS: &str = "close-all-overlays";
pub const UPDATE_OVERLAY_PROPERTIES: &str = "update-overlay-properties";
pub const GET_OVERLAY_POSITION: &str = "get-overlay-position";
pub const SAVE_OVERLAY_POSITIONS: &str = "save-overlay-positions";
pub const LOAD_OVERLAY_POSITIONS: &str = "load-overlay-positions";
pub const SET_ANCHOR_MODE: &str = "set-anchor-mode";
pub const LIST_OVERLAYS: &str = "list-overlays";

pub const COMMAND_NAMES: &[&str] = &[
    TOGGLE_CLICK_THROUGH,
    GET_WINDOW_BOUNDS,
    CREATE_OVERLAY,
    CLOSE_OVERLAY,
    CLOSE_ALL_OVERLAYS,
    UPDATE_OVERLAY_PROPERTIES,
    GET_OVERLAY_POSITION,
    SAVE_OVERLAY_POSITIONS,
    LOAD_OVERLAY_POSITIONS,
    SET_ANCHOR_MODE,
    LIST_OVERLAYS,
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnchorModeRequest {
    pub enabled: bool,
    /// The overlays the control surface currently has enabled.
    #[serde(default)]
    pub overlays: Vec<OverlayDescriptor>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum Command {
    ToggleClickThrough(bool),
    GetWindowBounds,
    CreateOverlay(OverlayDescriptor),
    CloseOverlay(String),
    CloseAllOverlays,
    UpdateOverlayProperties(OverlayDescriptor),
    GetOverlayPosition(String),
    SaveOverlayPositions(Positions),
    LoadOverlayPositions,
    SetAnchorMode(AnchorModeRequest),
    ListOverlays,
}

impl Command {
    /// Decode a wire command. Descriptors are validated when the command is
    /// invoked, not here.
    pub fn parse(name: &str, payload: Option<Value>) -> Result<Self, Error> {
        if !COMMAND_NAMES.contains(&name) {
            return Err(Error::UnknownCommand(name.to_string()));
        }

        let wire = match payload {
            Some(Value::Null) | None => json!({ "command": name }),
            Some(payload) => json!({ "command": name, "payload": payload }),
        };
        Ok(serde_json::from_value(wire)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::ToggleClickThrough(_) => TOGGLE_CLICK_THROUGH,
            Command::GetWindowBounds => GET_WINDOW_BOUNDS,
            Command::CreateOverlay(_) => CREATE_OVERLAY,
            Command::CloseOverlay(_) => CLOSE_OVERLAY,
            Command::CloseAllOverlays => CLOSE_ALL_OVERLAYS,
            Command::UpdateOverlayProperties(_) => UPDATE_OVERLAY_PROPERTIES,
            Command::GetOverlayPosition(_) => GET_OVERLAY_POSITION,
            Command::SaveOverlayPositions(_) => SAVE_OVERLAY_POSITIONS,
            Command::LoadOverlayPositions => LOAD_OVERLAY_POSITIONS,
            Command::SetAnchorMode(_) => SET_ANCHOR_MODE,
            Command::ListOverlays => LIST_OVERLAYS,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Command::CreateOverlay(d) | Command::UpdateOverlayProperties(d) => d.validate(),
            Command::SetAnchorMode(request) => {
                request.overlays.iter().try_for_each(OverlayDescriptor::validate)
            }
            _ => Ok(()),
        }
    }
}

type Reply = oneshot::Sender<Result<Value, Error>>;

struct Envelope {
    command: Command,
    reply: Reply,
}

/// Cloneable client side of the channel.
#[derive(Clone)]
pub struct CommandChannel {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl CommandChannel {
    /// Send one command and wait for its reply. This is the only place
    /// descriptors are validated; the service trusts what arrives.
    pub async fn invoke(&self, command: Command) -> Result<Value, Error> {
        command.validate()?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Wire entry point: command name plus raw JSON payload.
    pub async fn invoke_raw(&self, name: &str, payload: Option<Value>) -> Result<Value, Error> {
        let command = Command::parse(name, payload)?;
        self.invoke(command).await
    }

    pub async fn toggle_click_through(&self, enabled: bool) -> Result<(), Error> {
        self.invoke(Command::ToggleClickThrough(enabled)).await?;
        Ok(())
    }

    pub async fn get_window_bounds(&self) -> Result<Option<Bounds>, Error> {
        decode(self.invoke(Command::GetWindowBounds).await?)
    }

    pub async fn create_overlay(&self, descriptor: OverlayDescriptor) -> Result<String, Error> {
        decode(self.invoke(Command::CreateOverlay(descriptor)).await?)
    }

    pub async fn close_overlay(&self, id: impl Into<String>) -> Result<bool, Error> {
        decode(self.invoke(Command::CloseOverlay(id.into())).await?)
    }

    pub async fn close_all_overlays(&self) -> Result<(), Error> {
        self.invoke(Command::CloseAllOverlays).await?;
        Ok(())
    }

    pub async fn update_overlay_properties(
        &self,
        descriptor: OverlayDescriptor,
    ) -> Result<String, Error> {
        decode(self.invoke(Command::UpdateOverlayProperties(descriptor)).await?)
    }

    pub async fn get_overlay_position(
        &self,
        id: impl Into<String>,
    ) -> Result<Option<Position>, Error> {
        decode(self.invoke(Command::GetOverlayPosition(id.into())).await?)
    }

    pub async fn save_overlay_positions(&self, positions: Positions) -> Result<bool, Error> {
        decode(self.invoke(Command::SaveOverlayPositions(positions)).await?)
    }

    pub async fn load_overlay_positions(&self) -> Result<Positions, Error> {
        decode(self.invoke(Command::LoadOverlayPositions).await?)
    }

    pub async fn set_anchor_mode(
        &self,
        enabled: bool,
        overlays: Vec<OverlayDescriptor>,
    ) -> Result<Positions, Error> {
        decode(
            self.invoke(Command::SetAnchorMode(AnchorModeRequest { enabled, overlays }))
                .await?,
        )
    }

    pub async fn list_overlays(&self) -> Result<Vec<String>, Error> {
        decode(self.invoke(Command::ListOverlays).await?)
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, Error> {
    Ok(serde_json::from_value(value)?)
}

struct Waiter {
    generation: u64,
    reply: Reply,
}

/// The task that owns the manager and serves the channel.
pub struct OverlayService<B: WindowBackend> {
    manager: OverlayManager<B>,
    requests: mpsc::UnboundedReceiver<Envelope>,
    events: mpsc::UnboundedReceiver<SurfaceEvent>,
    timeouts_tx: mpsc::UnboundedSender<PendingLoad>,
    timeouts: mpsc::UnboundedReceiver<PendingLoad>,
    waiters: HashMap<String, Vec<Waiter>>,
    show_timeout: Duration,
}

/// Wire a manager to a new channel. `events` is the receiving end of the
/// sender the backend reports surface events on.
pub fn channel<B: WindowBackend>(
    manager: OverlayManager<B>,
    events: mpsc::UnboundedReceiver<SurfaceEvent>,
    show_timeout: Duration,
) -> (CommandChannel, OverlayService<B>) {
    let (tx, requests) = mpsc::unbounded_channel();
    let (timeouts_tx, timeouts) = mpsc::unbounded_channel();

    let service = OverlayService {
        manager,
        requests,
        events,
        timeouts_tx,
        timeouts,
        waiters: HashMap::new(),
        show_timeout,
    };

    (CommandChannel { tx }, service)
}

impl<B: WindowBackend> OverlayService<B> {
    /// Serve until every [`CommandChannel`] is dropped. Windows still open at
    /// that point are closed.
    pub async fn run(mut self) {
        tracing::info!("Overlay service started");

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Envelope { command, reply }) => self.handle_command(command, reply),
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event),
                Some(load) = self.timeouts.recv() => self.handle_timeout(load),
            }
        }

        let closed = self.manager.close_all();
        self.fail_waiters(&closed);
        tracing::info!(closed = closed.len(), "Overlay service stopped");
    }

    fn handle_command(&mut self, command: Command, reply: Reply) {
        let name = command.name();
        tracing::debug!(command = name, "Handling overlay command");

        let result = match command {
            Command::CreateOverlay(descriptor) => {
                let outcome = self.manager.create(&descriptor);
                return self.await_load(name, outcome, reply);
            }
            Command::UpdateOverlayProperties(descriptor) => {
                let outcome = self.manager.update(&descriptor);
                return self.await_load(name, outcome, reply);
            }
            Command::ToggleClickThrough(enabled) => {
                self.manager.set_click_through(enabled).map(|()| Value::Null)
            }
            Command::GetWindowBounds => to_value(&self.manager.window_bounds()),
            Command::CloseOverlay(id) => {
                let closed = self.manager.close(&id);
                if closed {
                    self.fail_waiters(std::slice::from_ref(&id));
                }
                to_value(&closed)
            }
            Command::CloseAllOverlays => {
                let closed = self.manager.close_all();
                self.fail_waiters(&closed);
                Ok(Value::Null)
            }
            Command::GetOverlayPosition(id) => to_value(&self.manager.get_position(&id)),
            Command::SaveOverlayPositions(positions) => {
                to_value(&self.manager.save_positions(&positions))
            }
            Command::LoadOverlayPositions => to_value(&self.manager.load_positions()),
            Command::SetAnchorMode(request) => self.set_anchor_mode(request),
            Command::ListOverlays => to_value(&self.manager.live_ids()),
        };

        if let Err(e) = &result {
            tracing::error!(command = name, error = %e, "Overlay command failed");
        }
        let _ = reply.send(result);
    }

    fn set_anchor_mode(&mut self, request: AnchorModeRequest) -> Result<Value, Error> {
        let change = if request.enabled {
            self.manager.enter_anchor_mode(&request.overlays)
        } else {
            self.manager.exit_anchor_mode(&request.overlays)
        };

        // Overlays that did update still need their show timeout.
        for load in change.loads {
            self.arm_show_timeout(load);
        }
        match change.error {
            Some(e) => Err(e),
            None => to_value(&change.positions),
        }
    }

    fn await_load(&mut self, name: &str, outcome: Result<PendingLoad, Error>, reply: Reply) {
        match outcome {
            Ok(load) => {
                self.waiters.entry(load.id.clone()).or_default().push(Waiter {
                    generation: load.generation,
                    reply,
                });
                self.arm_show_timeout(load);
            }
            Err(e) => {
                tracing::error!(command = name, error = %e, "Overlay command failed");
                let _ = reply.send(Err(e));
            }
        }
    }

    fn arm_show_timeout(&self, load: PendingLoad) {
        let tx = self.timeouts_tx.clone();
        let delay = self.show_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(load);
        });
    }

    fn handle_event(&mut self, event: SurfaceEvent) {
        tracing::trace!(label = %event.label, kind = ?event.kind, "Surface event");

        match self.manager.handle_surface_event(event) {
            Some(LoadSignal::Loaded { id, generation }) => {
                for waiter in self.take_waiters(&id, |g| g <= generation) {
                    let _ = waiter.reply.send(Ok(Value::String(id.clone())));
                }
            }
            Some(LoadSignal::Failed {
                id,
                generation,
                reason,
            }) => {
                for waiter in self.take_waiters(&id, |g| g <= generation) {
                    let _ = waiter.reply.send(Err(Error::ContentLoad {
                        id: id.clone(),
                        reason: reason.clone(),
                    }));
                }
            }
            Some(LoadSignal::Closed(id)) => self.fail_waiters(&[id]),
            None => {}
        }
    }

    fn handle_timeout(&mut self, load: PendingLoad) {
        self.manager.handle_show_timeout(&load.id, load.generation);

        let due = self.take_waiters(&load.id, |g| g == load.generation);
        let live = self.manager.is_live(&load.id);
        for waiter in due {
            let result = if live {
                Ok(Value::String(load.id.clone()))
            } else {
                Err(Error::WindowClosed(load.id.clone()))
            };
            let _ = waiter.reply.send(result);
        }
    }

    /// Remove and return the waiters on `id` whose generation matches.
    fn take_waiters(&mut self, id: &str, matches: impl Fn(u64) -> bool) -> Vec<Waiter> {
        let Some(waiters) = self.waiters.get_mut(id) else {
            return Vec::new();
        };
        let (due, rest): (Vec<_>, Vec<_>) =
            waiters.drain(..).partition(|w| matches(w.generation));
        *waiters = rest;
        if waiters.is_empty() {
            self.waiters.remove(id);
        }
        due
    }

    fn fail_waiters(&mut self, ids: &[String]) {
        for id in ids {
            for waiter in self.waiters.remove(id).unwrap_or_default() {
                let _ = waiter.reply.send(Err(Error::WindowClosed(id.clone())));
            }
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, Error> {
    Ok(serde_json::to_value(value)?)
}
