//! Platform-specific overlay window configuration
//!
//! Tauri's `always_on_top` is enough on Linux. Elsewhere overlays also need:
//! - Windows: tool-window style (no taskbar or Alt+Tab entry) and topmost z-order
//! - macOS: a window level above normal and floating windows, presence on
//!   every space, and no Cmd+Tab entry

use tauri::WebviewWindow;

use crate::Error;

pub fn configure_overlay(window: &WebviewWindow) -> Result<(), Error> {
    #[cfg(target_os = "macos")]
    configure_overlay_macos(window)?;

    #[cfg(target_os = "windows")]
    configure_overlay_windows(window)?;

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let _ = window;

    tracing::trace!(label = window.label(), "Platform overlay configuration applied");
    Ok(())
}

#[cfg(target_os = "macos")]
fn configure_overlay_macos(window: &WebviewWindow) -> Result<(), Error> {
    use objc2::rc::Retained;
    use objc2_app_kit::{NSMainMenuWindowLevel, NSWindow, NSWindowCollectionBehavior};

    let ns_window_ptr = window
        .ns_window()
        .map_err(|e| Error::WindowCreation(format!("Failed to get NSWindow handle: {}", e)))?;

    // SAFETY: the pointer stays valid while `window` is alive, and we retain it
    // for the duration of this call.
    let ns_window: Retained<NSWindow> = unsafe { Retained::retain(ns_window_ptr as *mut NSWindow) }
        .ok_or_else(|| Error::WindowCreation("NSWindow pointer was null".to_string()))?;

    ns_window.setLevel(NSMainMenuWindowLevel);
    ns_window.setCollectionBehavior(
        NSWindowCollectionBehavior::CanJoinAllSpaces
            | NSWindowCollectionBehavior::Stationary
            | NSWindowCollectionBehavior::IgnoresCycle
            | NSWindowCollectionBehavior::FullScreenAuxiliary,
    );

    Ok(())
}

#[cfg(target_os = "windows")]
fn configure_overlay_windows(window: &WebviewWindow) -> Result<(), Error> {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        GWL_EXSTYLE, GetWindowLongPtrW, HWND_TOPMOST, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE,
        SetWindowLongPtrW, SetWindowPos, WS_EX_TOOLWINDOW,
    };

    let hwnd = window
        .hwnd()
        .map_err(|e| Error::WindowCreation(format!("Failed to get HWND handle: {}", e)))?;

    unsafe {
        let hwnd = HWND(hwnd.0);

        let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE) | WS_EX_TOOLWINDOW.0 as isize;
        SetWindowLongPtrW(hwnd, GWL_EXSTYLE, ex_style);

        SetWindowPos(
            hwnd,
            Some(HWND_TOPMOST),
            0,
            0,
            0,
            0,
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
        )
        .map_err(|e| Error::WindowCreation(format!("Failed to make window topmost: {}", e)))?;
    }

    Ok(())
}
