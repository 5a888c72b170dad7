use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;
use tauri::{
    AppHandle, Emitter, Listener, LogicalPosition, Manager, WebviewUrl, WebviewWindow,
    WebviewWindowBuilder, WindowEvent, Wry,
    webview::PageLoadEvent,
    window::Color,
};
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::{
    Error,
    overlay::{
        Bounds, ContentUrl, OverlaySurface, Position, SurfaceEvent, SurfaceEventKind, WindowBackend,
        WindowSpec, configure_overlay,
    },
    telemetry::EventSink,
};

/// Emitted by the overlay document once its DOM is parsed, with
/// `{ "label": <window label> }`.
pub const DOM_READY_EVENT: &str = "overlay:dom-ready";

#[derive(Deserialize)]
struct DomReady {
    label: String,
}

/// The document a window was last asked to show. Shared with its page-load
/// handler, which has no other way to tell which navigation finished.
#[derive(Debug, Clone)]
struct Navigation {
    url: ContentUrl,
    generation: u64,
}

fn webview_url(url: &ContentUrl) -> WebviewUrl {
    match url {
        // Resolved by Tauri against the dev server or the bundled asset
        // origin, which differs per platform.
        ContentUrl::App(path) => WebviewUrl::App(path.into()),
        ContentUrl::External(url) => WebviewUrl::External(url.clone()),
    }
}

/// Origin bundled assets are served from, for navigating an existing window.
fn app_base(app: &AppHandle) -> Result<Url, Error> {
    if tauri::is_dev() {
        if let Some(url) = &app.config().build.dev_url {
            return Ok(url.clone());
        }
    }
    let base = if cfg!(any(windows, target_os = "android")) {
        "http://tauri.localhost/"
    } else {
        "tauri://localhost/"
    };
    Ok(Url::parse(base)?)
}

/// Translate a finished page load into a surface event.
///
/// The webview reports a finished load even when the document could not be
/// fetched; it then finishes on an error page instead. Anything other than
/// the expected document therefore counts as a failed load.
fn page_load_event(expected: &Navigation, loaded: &Url) -> Option<SurfaceEventKind> {
    let generation = expected.generation;
    if expected.url.is_loaded_at(loaded) {
        Some(SurfaceEventKind::LoadFinished { generation })
    } else if expected.url.is_same_document(loaded) {
        // An earlier navigation of this window finishing late.
        None
    } else {
        Some(SurfaceEventKind::LoadFailed {
            generation,
            reason: format!("{loaded} finished loading instead of {}", expected.url.as_str()),
        })
    }
}

pub struct TauriBackend {
    app: AppHandle,
    events: UnboundedSender<SurfaceEvent>,
    main_label: String,
}

impl TauriBackend {
    pub fn new(
        app: AppHandle,
        events: UnboundedSender<SurfaceEvent>,
        main_label: impl Into<String>,
    ) -> Self {
        let tx = events.clone();
        app.listen_any(DOM_READY_EVENT, move |event| {
            match serde_json::from_str::<DomReady>(event.payload()) {
                Ok(DomReady { label }) => {
                    let _ = tx.send(SurfaceEvent::new(label, SurfaceEventKind::DomReady));
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring malformed DOM-ready event"),
            }
        });

        Self {
            app,
            events,
            main_label: main_label.into(),
        }
    }

    fn main_window(&self) -> Option<WebviewWindow> {
        self.app.get_webview_window(&self.main_label)
    }
}

impl WindowBackend for TauriBackend {
    type Surface = TauriSurface;

    fn open(&mut self, spec: &WindowSpec) -> Result<TauriSurface, Error> {
        let load_events = self.events.clone();
        let navigation = Arc::new(Mutex::new(Navigation {
            url: spec.url.clone(),
            generation: spec.generation,
        }));
        let expected = Arc::clone(&navigation);

        let window = WebviewWindowBuilder::new(&self.app, &spec.label, webview_url(&spec.url))
        .title(&spec.title)
        .inner_size(spec.size.width, spec.size.height)
        .position(spec.position.x, spec.position.y)
        .decorations(false)
        .transparent(true)
        .background_color(Color(0, 0, 0, 0))
        .always_on_top(true)
        .skip_taskbar(true)
        .minimizable(false)
        .maximizable(false)
        .closable(true)
        .resizable(spec.movable)
        .focused(false)
        .visible(false)
        .on_page_load(move |window, payload| {
            if !matches!(payload.event(), PageLoadEvent::Finished) {
                return;
            }
            let Ok(expected) = expected.lock().map(|n| n.clone()) else {
                return;
            };
            match page_load_event(&expected, payload.url()) {
                Some(kind) => {
                    let _ = load_events.send(SurfaceEvent::new(window.label(), kind));
                }
                None => tracing::trace!(
                    label = %window.label(),
                    url = %payload.url(),
                    "Ignoring load of a superseded navigation"
                ),
            }
        })
        .build()
        .map_err(|e| Error::WindowCreation(format!("{}: {}", spec.label, e)))?;

        let label = spec.label.clone();
        let events = self.events.clone();
        let app = self.app.clone();
        window.on_window_event(move |event| match event {
            WindowEvent::Moved(physical) => {
                let scale = app
                    .get_webview_window(&label)
                    .and_then(|w| w.scale_factor().ok())
                    .unwrap_or(1.0);
                let logical = physical.to_logical::<f64>(scale);
                let _ = events.send(SurfaceEvent::new(
                    label.clone(),
                    SurfaceEventKind::Moved(Position {
                        x: logical.x,
                        y: logical.y,
                    }),
                ));
            }
            WindowEvent::Destroyed => {
                let _ = events.send(SurfaceEvent::new(label.clone(), SurfaceEventKind::Closed));
            }
            _ => {}
        });

        configure_overlay(&window)?;

        let surface = TauriSurface {
            window,
            app: self.app.clone(),
            navigation,
        };
        surface.set_movable(spec.movable)?;
        Ok(surface)
    }

    fn set_main_click_through(&self, enabled: bool) -> Result<(), Error> {
        match self.main_window() {
            Some(window) => Ok(window.set_ignore_cursor_events(enabled)?),
            None => Ok(()),
        }
    }

    fn main_bounds(&self) -> Option<Bounds> {
        let window = self.main_window()?;
        let scale = window.scale_factor().ok()?;
        let position = window.outer_position().ok()?.to_logical::<f64>(scale);
        let size = window.outer_size().ok()?.to_logical::<f64>(scale);
        Some(Bounds {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        })
    }
}

pub struct TauriSurface {
    window: WebviewWindow,
    app: AppHandle,
    navigation: Arc<Mutex<Navigation>>,
}

impl OverlaySurface for TauriSurface {
    fn show(&self) -> Result<(), Error> {
        Ok(self.window.show()?)
    }

    fn focus(&self) -> Result<(), Error> {
        Ok(self.window.set_focus()?)
    }

    fn is_visible(&self) -> Result<bool, Error> {
        Ok(self.window.is_visible()?)
    }

    fn raise(&self) -> Result<(), Error> {
        Ok(self.window.set_always_on_top(true)?)
    }

    /// Frameless windows only move through the page's drag region, which the
    /// document shows in anchor mode. Outside it the overlay lets clicks
    /// through so it can't be grabbed by accident.
    fn set_movable(&self, movable: bool) -> Result<(), Error> {
        self.window.set_ignore_cursor_events(!movable)?;
        self.window.set_resizable(movable)?;
        Ok(())
    }

    fn navigate(&self, url: &ContentUrl, generation: u64) -> Result<(), Error> {
        let target = match url {
            ContentUrl::App(path) => app_base(&self.app)?.join(path)?,
            ContentUrl::External(url) => url.clone(),
        };

        if let Ok(mut navigation) = self.navigation.lock() {
            *navigation = Navigation {
                url: url.clone(),
                generation,
            };
        }
        Ok(self.window.navigate(target)?)
    }

    fn set_position(&self, position: Position) -> Result<(), Error> {
        Ok(self
            .window
            .set_position(LogicalPosition::new(position.x, position.y))?)
    }

    fn position(&self) -> Result<Position, Error> {
        let scale = self.window.scale_factor()?;
        let logical = self.window.outer_position()?.to_logical::<f64>(scale);
        Ok(Position {
            x: logical.x,
            y: logical.y,
        })
    }

    fn destroy(&self) -> Result<(), Error> {
        Ok(self.window.destroy()?)
    }
}

/// Broadcasts to every window of the app.
pub struct AppEventSink(pub AppHandle<Wry>);

impl EventSink for AppEventSink {
    fn emit(&self, event: &str, payload: Value) -> Result<(), Error> {
        Ok(self.0.emit(event, payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OverlayDescriptor;

    fn expecting(base: &str, generation: u64) -> Navigation {
        Navigation {
            url: OverlayDescriptor::new("a", 400.0, 300.0)
                .content_url(base)
                .unwrap(),
            generation,
        }
    }

    #[test]
    fn expected_document_finishes_the_load() {
        let expected = expecting("index.html", 3);
        let loaded = Url::parse("tauri://localhost/index.html?overlay=a").unwrap();
        assert_eq!(
            page_load_event(&expected, &loaded),
            Some(SurfaceEventKind::LoadFinished { generation: 3 })
        );
    }

    #[test]
    fn error_page_fails_the_load() {
        let expected = expecting("http://localhost:5173/", 7);
        let loaded = Url::parse("chrome-error://chromewebdata/").unwrap();
        assert!(matches!(
            page_load_event(&expected, &loaded),
            Some(SurfaceEventKind::LoadFailed { generation: 7, .. })
        ));
    }

    #[test]
    fn earlier_navigation_finishing_late_is_ignored() {
        let expected = expecting("http://localhost:5173/", 2);
        let loaded = Url::parse("http://localhost:5173/?overlay=a&anchorMode=true").unwrap();
        assert_eq!(page_load_event(&expected, &loaded), None);
    }

    #[test]
    fn bundled_paths_stay_app_relative() {
        let url = ContentUrl::App("index.html?overlay=a".to_string());
        assert!(matches!(webview_url(&url), WebviewUrl::App(_)));

        let url = ContentUrl::External(Url::parse("http://localhost:5173/").unwrap());
        assert!(matches!(webview_url(&url), WebviewUrl::External(_)));
    }
}
