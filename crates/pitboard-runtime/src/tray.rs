use pitboard_core::OverlayState;
use tauri::{
    App, AppHandle, Manager, Runtime,
    menu::{MenuBuilder, MenuItemBuilder, PredefinedMenuItem},
    tray::TrayIconEvent,
};

use crate::CONTROL_PANEL;

/// Id of the tray icon declared in `tauri.conf.json`.
pub const TRAY_ID: &str = "main";

pub fn setup_tray(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let show_panel = MenuItemBuilder::with_id("show_panel", "Show Control Panel").build(app)?;
    let close_overlays =
        MenuItemBuilder::with_id("close_overlays", "Close All Overlays").build(app)?;
    let separator = PredefinedMenuItem::separator(app)?;
    let quit = MenuItemBuilder::with_id("quit", "Quit Pitboard").build(app)?;

    let menu = MenuBuilder::new(app)
        .item(&show_panel)
        .item(&close_overlays)
        .item(&separator)
        .item(&quit)
        .build()?;

    let Some(tray) = app.tray_by_id(TRAY_ID) else {
        tracing::warn!(id = TRAY_ID, "Tray icon missing from configuration");
        return Ok(());
    };

    tray.set_menu(Some(menu))?;
    tray.on_menu_event(|app, event| handle_menu_event(app, event.id.as_ref()));
    tray.on_tray_icon_event(|tray, event| {
        // Double-click brings the control panel back
        if let TrayIconEvent::DoubleClick { .. } = event {
            if let Err(e) = show_control_panel(tray.app_handle()) {
                tracing::error!(error = %e, "Failed to show control panel");
            }
        }
    });

    Ok(())
}

/// Show and focus the control panel window.
pub fn show_control_panel<R: Runtime>(app: &AppHandle<R>) -> Result<(), tauri::Error> {
    let Some(window) = app.get_webview_window(CONTROL_PANEL) else {
        tracing::warn!(label = CONTROL_PANEL, "Control panel window not found");
        return Ok(());
    };
    window.show()?;
    window.unminimize()?;
    window.set_focus()
}

/// Close every overlay, then optionally exit once the service has replied.
pub fn close_overlays<R: Runtime>(app: &AppHandle<R>, then_exit: bool) {
    let channel = app.state::<OverlayState>().0.clone();
    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        if let Err(e) = channel.close_all_overlays().await {
            tracing::error!(error = %e, "Failed to close overlays");
        }
        if then_exit {
            app.exit(0);
        }
    });
}

fn handle_menu_event<R: Runtime>(app: &AppHandle<R>, id: &str) {
    match id {
        "show_panel" => {
            if let Err(e) = show_control_panel(app) {
                tracing::error!(error = %e, "Failed to show control panel");
            }
        }
        "close_overlays" => close_overlays(app, false),
        "quit" => close_overlays(app, true),
        _ => {}
    }
}
