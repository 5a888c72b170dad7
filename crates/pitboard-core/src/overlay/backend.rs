//! The seam between overlay bookkeeping and the windowing runtime.
//!
//! The registry only talks to windows through [`WindowBackend`] and
//! [`OverlaySurface`]. Backends report what happens to their windows
//! asynchronously as [`SurfaceEvent`]s, tagged with the window label the
//! registry chose when it opened the window.

use crate::Error;
use crate::overlay::{Bounds, ContentUrl, Position, Size};

/// Everything a backend needs to open one overlay window.
///
/// Windows are always frameless, always on top, hidden from the taskbar,
/// not minimizable, not maximizable but closable, and start hidden until a
/// readiness signal (or the show timeout) reveals them.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub label: String,
    pub title: String,
    pub url: ContentUrl,
    /// Load generation of the first document; echoed in its load events.
    pub generation: u64,
    pub position: Position,
    pub size: Size,
    pub movable: bool,
}

/// A live overlay window.
pub trait OverlaySurface: Send + 'static {
    fn show(&self) -> Result<(), Error>;
    fn focus(&self) -> Result<(), Error>;
    fn is_visible(&self) -> Result<bool, Error>;
    /// Re-assert the topmost z-order.
    fn raise(&self) -> Result<(), Error>;
    fn set_movable(&self, movable: bool) -> Result<(), Error>;
    /// Load another document. Its load events carry `generation`.
    fn navigate(&self, url: &ContentUrl, generation: u64) -> Result<(), Error>;
    fn set_position(&self, position: Position) -> Result<(), Error>;
    /// Current top-left corner in logical screen coordinates.
    fn position(&self) -> Result<Position, Error>;
    /// Tear the window down without asking the page. A [`SurfaceEventKind::Closed`]
    /// event still follows.
    fn destroy(&self) -> Result<(), Error>;
}

pub trait WindowBackend: Send + 'static {
    type Surface: OverlaySurface;

    fn open(&mut self, spec: &WindowSpec) -> Result<Self::Surface, Error>;

    /// Let mouse input pass through the control panel window.
    fn set_main_click_through(&self, enabled: bool) -> Result<(), Error>;

    /// Outer bounds of the control panel window, if it exists.
    fn main_bounds(&self) -> Option<Bounds>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceEvent {
    pub label: String,
    pub kind: SurfaceEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEventKind {
    /// The document is parsed; painting may not have happened yet.
    DomReady,
    LoadFinished { generation: u64 },
    LoadFailed { generation: u64, reason: String },
    Moved(Position),
    Closed,
}

impl SurfaceEvent {
    pub fn new(label: impl Into<String>, kind: SurfaceEventKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }
}
