pub mod channel;
#[cfg(feature = "tauri")]
pub mod commands;
pub mod config;
pub mod error;
pub mod overlay;
pub mod store;
pub mod telemetry;

pub use channel::*;
#[cfg(feature = "tauri")]
pub use commands::*;
pub use config::*;
pub use error::*;
pub use overlay::*;
pub use store::*;
pub use telemetry::*;

#[cfg(feature = "tauri")]
pub use tauri_setup::init;

#[cfg(feature = "tauri")]
mod tauri_setup {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use tauri::{
        AppHandle, Manager, Wry,
        plugin::{Builder, TauriPlugin},
    };
    use tokio::sync::mpsc;

    use crate::{
        AppConfig, OverlayManager, OverlayState, PositionStore, TelemetryHub, TelemetrySource,
        TelemetryState, commands,
        overlay::tauri_backend::{AppEventSink, TauriBackend},
    };

    /// The overlay host as a Tauri plugin. Its commands are invoked as
    /// `plugin:pitboard|ipc_invoke` and `plugin:pitboard|telemetry_status`.
    /// `main_label` is the control panel window.
    pub fn init(
        config: AppConfig,
        main_label: impl Into<String>,
        source: Box<dyn TelemetrySource>,
    ) -> TauriPlugin<Wry> {
        let main_label = main_label.into();

        Builder::<Wry, ()>::new("pitboard")
            .invoke_handler(tauri::generate_handler![
                commands::ipc_invoke,
                commands::telemetry_status
            ])
            .setup(move |app, _api| {
                start(app, &config, &main_label, source);
                Ok(())
            })
            .build()
    }

    /// Start the overlay service and the telemetry hub and put their handles
    /// into Tauri's managed state.
    fn start(
        app: &AppHandle,
        config: &AppConfig,
        main_label: &str,
        source: Box<dyn TelemetrySource>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let backend = TauriBackend::new(app.clone(), events_tx, main_label);

        let store = PositionStore::new(
            config
                .positions_path()
                .unwrap_or_else(|| PathBuf::from(&config.positions_file)),
        );
        tracing::info!(path = ?store.path(), "Overlay positions file");

        let manager = OverlayManager::new(backend, store, config);
        let (channel, service) = crate::channel::channel(manager, events_rx, config.show_timeout());
        tauri::async_runtime::spawn(service.run());
        app.manage(OverlayState(channel));

        let hub = TelemetryHub::new(source, Arc::new(AppEventSink(app.clone())))
            .with_update_interval(config.telemetry_update_interval());
        app.manage(TelemetryState(Mutex::new(hub)));

        let app = app.clone();
        tauri::async_runtime::spawn(async move {
            let state = app.state::<TelemetryState>();
            match state.0.lock() {
                Ok(mut hub) => hub.start(),
                Err(e) => tracing::error!(error = %e, "Telemetry hub lock poisoned"),
            };
        });
    }
}
