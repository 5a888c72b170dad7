use indexmap::IndexMap;

use crate::{
    Error,
    overlay::{OverlayDescriptor, OverlaySurface, Position, Size, WindowBackend, WindowSpec},
};

/// A started content load. Completion is reported later through surface
/// events or the show timeout, matched by `generation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLoad {
    pub id: String,
    pub generation: u64,
}

pub struct OverlayWindow<S> {
    pub surface: S,
    pub label: String,
    pub anchor_mode: bool,
    pub size: Size,
    pub last_known_position: Position,
    pub visible: bool,
    pub generation: u64,
}

/// Live overlay windows keyed by overlay id, in creation order.
pub struct OverlayRegistry<B: WindowBackend> {
    backend: B,
    windows: IndexMap<String, OverlayWindow<B::Surface>>,
    content_url: String,
    min_size: Size,
    next_instance: u64,
    next_generation: u64,
}

impl<B: WindowBackend> OverlayRegistry<B> {
    pub fn new(backend: B, content_url: impl Into<String>, min_size: Size) -> Self {
        Self {
            backend,
            windows: IndexMap::new(),
            content_url: content_url.into(),
            min_size,
            next_instance: 0,
            next_generation: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open a window for `descriptor`, or update the existing one with the
    /// same id. `fallback` is used when the descriptor carries no position.
    pub fn create(
        &mut self,
        descriptor: &OverlayDescriptor,
        fallback: Position,
    ) -> Result<PendingLoad, Error> {
        if self.windows.contains_key(&descriptor.id) {
            tracing::debug!(id = %descriptor.id, "Overlay already live, updating instead");
            return self.update(descriptor, fallback);
        }

        let id = descriptor.id.clone();
        let position = descriptor.position.unwrap_or(fallback);
        let size = descriptor.size.clamped(self.min_size);
        let url = descriptor.content_url(&self.content_url)?;

        self.next_instance += 1;
        let label = format!("overlay/{}/{}", id, self.next_instance);
        let generation = self.bump_generation();

        let spec = WindowSpec {
            label: label.clone(),
            title: descriptor.name.clone().unwrap_or_else(|| id.clone()),
            url,
            generation,
            position,
            size,
            movable: descriptor.anchor_mode,
        };

        tracing::info!(
            id = %id,
            label = %label,
            x = position.x,
            y = position.y,
            width = size.width,
            height = size.height,
            anchor_mode = descriptor.anchor_mode,
            "Creating overlay window"
        );

        let surface = self.backend.open(&spec)?;

        self.windows.insert(
            id.clone(),
            OverlayWindow {
                surface,
                label,
                anchor_mode: descriptor.anchor_mode,
                size,
                last_known_position: position,
                visible: false,
                generation,
            },
        );

        Ok(PendingLoad { id, generation })
    }

    /// Reconcile a live window with `descriptor`: movability, content query,
    /// explicit position, focus. Missing windows are created.
    pub fn update(
        &mut self,
        descriptor: &OverlayDescriptor,
        fallback: Position,
    ) -> Result<PendingLoad, Error> {
        if !self.windows.contains_key(&descriptor.id) {
            return self.create(descriptor, fallback);
        }

        let url = descriptor.content_url(&self.content_url)?;
        let generation = self.bump_generation();
        let Some(overlay) = self.windows.get_mut(&descriptor.id) else {
            return Err(Error::WindowClosed(descriptor.id.clone()));
        };

        tracing::debug!(
            id = %descriptor.id,
            anchor_mode = descriptor.anchor_mode,
            position = ?descriptor.position,
            "Updating overlay window"
        );

        overlay.surface.set_movable(descriptor.anchor_mode)?;
        overlay.anchor_mode = descriptor.anchor_mode;

        overlay.surface.navigate(&url, generation)?;
        overlay.generation = generation;

        if let Some(position) = descriptor.position {
            overlay.surface.set_position(position)?;
            overlay.last_known_position = position;
        }

        overlay.surface.focus()?;

        Ok(PendingLoad {
            id: descriptor.id.clone(),
            generation,
        })
    }

    pub fn close(&mut self, id: &str) -> bool {
        let Some(overlay) = self.windows.shift_remove(id) else {
            return false;
        };

        tracing::info!(id = %id, "Closing overlay window");
        if let Err(e) = overlay.surface.destroy() {
            tracing::warn!(id = %id, error = %e, "Failed to destroy overlay window");
        }
        true
    }

    /// Close every window, returning the ids that were live.
    pub fn close_all(&mut self) -> Vec<String> {
        let windows = std::mem::take(&mut self.windows);
        tracing::info!(count = windows.len(), "Closing all overlay windows");

        windows
            .into_iter()
            .map(|(id, overlay)| {
                if let Err(e) = overlay.surface.destroy() {
                    tracing::warn!(id = %id, error = %e, "Failed to destroy overlay window");
                }
                id
            })
            .collect()
    }

    /// Live on-screen position; the last known one if the runtime can't say.
    pub fn position(&self, id: &str) -> Option<Position> {
        let overlay = self.windows.get(id)?;
        match overlay.surface.position() {
            Ok(position) => Some(position),
            Err(e) => {
                tracing::debug!(id = %id, error = %e, "Live position unavailable");
                Some(overlay.last_known_position)
            }
        }
    }

    /// Show and focus the window if it isn't already showing. Every readiness
    /// signal funnels through here, so repeated calls are harmless.
    pub fn reveal(&mut self, id: &str) -> Result<bool, Error> {
        let Some(overlay) = self.windows.get_mut(id) else {
            return Ok(false);
        };
        if overlay.visible {
            return Ok(false);
        }

        overlay.surface.show()?;
        overlay.surface.focus()?;
        overlay.visible = true;
        tracing::debug!(id = %id, "Overlay shown");
        Ok(true)
    }

    /// Timeout path: show the window unless the runtime already reports it
    /// visible, and push it back on top.
    pub fn force_reveal(&mut self, id: &str) -> Result<bool, Error> {
        let Some(overlay) = self.windows.get_mut(id) else {
            return Ok(false);
        };

        if overlay.surface.is_visible().unwrap_or(false) {
            overlay.visible = true;
            return Ok(false);
        }

        tracing::info!(id = %id, "No readiness signal in time, forcing overlay visible");
        overlay.visible = false;
        self.reveal(id)?;
        if let Some(overlay) = self.windows.get(id) {
            overlay.surface.raise()?;
        }
        Ok(true)
    }

    /// Drop the entry for a window that went away on its own. Only the
    /// current window instance for an id matches `label`.
    pub fn forget(&mut self, label: &str) -> Option<String> {
        let id = self.id_for_label(label)?.to_string();
        self.windows.shift_remove(&id);
        tracing::info!(id = %id, "Overlay window closed externally");
        Some(id)
    }

    pub fn record_move(&mut self, label: &str, position: Position) {
        if let Some(overlay) = self.windows.values_mut().find(|o| o.label == label) {
            overlay.last_known_position = position;
        }
    }

    pub fn id_for_label(&self, label: &str) -> Option<&str> {
        self.windows
            .iter()
            .find(|(_, overlay)| overlay.label == label)
            .map(|(id, _)| id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&OverlayWindow<B::Surface>> {
        self.windows.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.windows.contains_key(id)
    }

    pub fn generation(&self, id: &str) -> Option<u64> {
        self.windows.get(id).map(|o| o.generation)
    }

    pub fn ids(&self) -> Vec<String> {
        self.windows.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}
