use std::sync::Mutex;

use serde_json::Value;
use tauri::{State, command};

use crate::{
    channel::CommandChannel,
    telemetry::{GET_STATUS, TelemetryHub, TelemetryStatus},
};

pub struct OverlayState(pub CommandChannel);
pub struct TelemetryState(pub Mutex<TelemetryHub>);

/// Single entry point for the control surface:
/// `invoke("plugin:pitboard|ipc_invoke", { command: "create-overlay", payload: {...} })`.
#[command]
pub async fn ipc_invoke(
    overlays: State<'_, OverlayState>,
    telemetry: State<'_, TelemetryState>,
    command: String,
    payload: Option<Value>,
) -> Result<Value, String> {
    if command == GET_STATUS {
        let status = telemetry_status(telemetry)?;
        return serde_json::to_value(status).map_err(|e| e.to_string());
    }

    overlays
        .0
        .invoke_raw(&command, payload)
        .await
        .map_err(|e| e.to_string())
}

#[command]
pub fn telemetry_status(state: State<'_, TelemetryState>) -> Result<TelemetryStatus, String> {
    let hub = state.0.lock().map_err(|e| e.to_string())?;
    Ok(hub.status())
}
