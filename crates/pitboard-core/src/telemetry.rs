//! Simulator telemetry, consumed passively.
//!
//! The SDK binding is injected as a [`TelemetrySource`]. The hub connects it,
//! tracks connection status and fans every event out to all windows through
//! an [`EventSink`]. Overlay management never depends on any of this.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Error;

pub const STATUS_EVENT: &str = "iracing:updateStatus";
pub const TELEMETRY_EVENT: &str = "iracing:updateTelemetry";
pub const SESSION_INFO_EVENT: &str = "iracing:updateSessionInfo";
pub const GET_STATUS: &str = "iracing:getStatus";

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Connected,
    Disconnected,
    Telemetry(Value),
    SessionInfo(Value),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryStatus {
    pub is_connected: bool,
}

pub trait TelemetrySource: Send + 'static {
    fn name(&self) -> &str;
    /// Start delivering events into `events`, sampling telemetry roughly
    /// every `update_interval`.
    fn connect(
        &mut self,
        events: mpsc::UnboundedSender<TelemetryEvent>,
        update_interval: Duration,
    ) -> Result<(), Error>;
    fn disconnect(&mut self);
}

/// Where telemetry is broadcast to, normally every open window.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: &str, payload: Value) -> Result<(), Error>;
}

/// Stand-in when no simulator SDK is available: connects, never reports.
#[derive(Debug, Default)]
pub struct UnavailableSource;

impl TelemetrySource for UnavailableSource {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn connect(
        &mut self,
        _events: mpsc::UnboundedSender<TelemetryEvent>,
        _update_interval: Duration,
    ) -> Result<(), Error> {
        tracing::warn!("No telemetry SDK available, status stays disconnected");
        Ok(())
    }

    fn disconnect(&mut self) {}
}

/// Source fed from inside the process, e.g. by an SDK binding running on
/// its own thread.
pub struct ChannelSource {
    name: String,
    incoming: Option<mpsc::UnboundedReceiver<TelemetryEvent>>,
    forwarder: Option<JoinHandle<()>>,
}

impl ChannelSource {
    pub fn new(name: impl Into<String>) -> (mpsc::UnboundedSender<TelemetryEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            name: name.into(),
            incoming: Some(rx),
            forwarder: None,
        };
        (tx, source)
    }
}

impl TelemetrySource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// The feeding side decides the sampling rate.
    fn connect(
        &mut self,
        events: mpsc::UnboundedSender<TelemetryEvent>,
        _update_interval: Duration,
    ) -> Result<(), Error> {
        let mut incoming = self.incoming.take().ok_or(Error::ChannelClosed)?;
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = incoming.recv().await {
                if events.send(event).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

pub struct TelemetryHub {
    source: Box<dyn TelemetrySource>,
    sink: Arc<dyn EventSink>,
    connected: Arc<AtomicBool>,
    update_interval: Duration,
    pump: Option<JoinHandle<()>>,
}

impl TelemetryHub {
    pub fn new(source: Box<dyn TelemetrySource>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            sink,
            connected: Arc::new(AtomicBool::new(false)),
            update_interval: Duration::from_millis(100),
            pump: None,
        }
    }

    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    /// Connect the source and start forwarding. A source that fails to
    /// connect leaves the hub disconnected; that is logged, not fatal.
    pub fn start(&mut self) {
        if self.pump.is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Err(e) = self.source.connect(tx, self.update_interval) {
            tracing::error!(source = self.source.name(), error = %e, "Telemetry source failed to connect");
            return;
        }
        tracing::info!(
            source = self.source.name(),
            interval_ms = self.update_interval.as_millis() as u64,
            "Telemetry source attached"
        );

        let sink = self.sink.clone();
        let connected = self.connected.clone();
        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                forward(&*sink, &connected, event);
            }
            connected.store(false, Ordering::SeqCst);
        }));
    }

    pub fn stop(&mut self) {
        self.source.disconnect();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.sink.emit(STATUS_EVENT, status_payload(false));
        }
    }

    pub fn status(&self) -> TelemetryStatus {
        TelemetryStatus {
            is_connected: self.connected.load(Ordering::SeqCst),
        }
    }
}

impl Drop for TelemetryHub {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

fn forward(sink: &dyn EventSink, connected: &AtomicBool, event: TelemetryEvent) {
    let (name, payload) = match event {
        TelemetryEvent::Connected => {
            connected.store(true, Ordering::SeqCst);
            tracing::info!("Simulator connected");
            (STATUS_EVENT, status_payload(true))
        }
        TelemetryEvent::Disconnected => {
            connected.store(false, Ordering::SeqCst);
            tracing::info!("Simulator disconnected");
            (STATUS_EVENT, status_payload(false))
        }
        TelemetryEvent::Telemetry(data) => (TELEMETRY_EVENT, data),
        TelemetryEvent::SessionInfo(data) => (SESSION_INFO_EVENT, data),
    };

    if let Err(e) = sink.emit(name, payload) {
        tracing::warn!(event = name, error = %e, "Failed to broadcast telemetry");
    }
}

fn status_payload(is_connected: bool) -> Value {
    serde_json::json!({ "isConnected": is_connected })
}
