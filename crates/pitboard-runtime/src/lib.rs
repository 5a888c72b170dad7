mod logging;
mod tray;

use pitboard_core::{AppConfig, UnavailableSource};
use tauri::{Manager, WindowEvent};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};

/// Label of the control panel window declared in `tauri.conf.json`.
pub const CONTROL_PANEL: &str = "main";

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    logging::init();

    let config = AppConfig::load_default();
    tracing::info!(
        app = %config.app_name,
        content_url = %config.content_url,
        "Starting overlay host"
    );

    let result = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        // No simulator SDK is bundled; the hub reports disconnected until a
        // real source is injected here.
        .plugin(pitboard_core::init(
            config,
            CONTROL_PANEL,
            Box::new(UnavailableSource),
        ))
        .setup(|app| {
            tray::setup_tray(app)?;
            Ok(())
        })
        .on_window_event(|window, event| {
            let WindowEvent::CloseRequested { api, .. } = event else {
                return;
            };
            // Only the control panel asks; overlays close straight away.
            if window.label() != CONTROL_PANEL {
                return;
            }
            api.prevent_close();

            let window = window.clone();
            window
                .dialog()
                .message("Overlays stay open while Pitboard runs in the tray.")
                .title("Close Control Panel")
                .kind(MessageDialogKind::Info)
                .buttons(MessageDialogButtons::OkCancelCustom(
                    "Minimize to Tray".to_string(),
                    "Quit Pitboard".to_string(),
                ))
                .show({
                    let window = window.clone();
                    move |minimize| {
                        if minimize {
                            if let Err(e) = window.hide() {
                                tracing::error!(error = %e, "Failed to hide control panel");
                            }
                        } else {
                            tray::close_overlays(window.app_handle(), true);
                        }
                    }
                });
        })
        .run(tauri::generate_context!());

    if let Err(e) = result {
        tracing::error!(error = %e, "Pitboard exited with an error");
        std::process::exit(1);
    }
}
