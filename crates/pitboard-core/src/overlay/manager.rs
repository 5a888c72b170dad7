use crate::{
    Error,
    config::AppConfig,
    overlay::{
        Bounds, OverlayDescriptor, OverlayRegistry, PendingLoad, Position, SurfaceEvent,
        SurfaceEventKind, WindowBackend,
    },
    store::{PositionStore, Positions},
};

/// What a surface event means for a caller waiting on a content load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSignal {
    /// The load for `generation` finished; earlier loads were superseded by it.
    Loaded { id: String, generation: u64 },
    Failed {
        id: String,
        generation: u64,
        reason: String,
    },
    Closed(String),
}

/// Outcome of switching anchor mode. Overlays that were updated have their
/// loads listed even when another overlay failed.
#[derive(Debug)]
pub struct AnchorModeChange {
    /// Positions persisted on the way out; empty when entering.
    pub positions: Positions,
    pub loads: Vec<PendingLoad>,
    pub error: Option<Error>,
}

/// Composes the registry and the position store and owns anchor-mode policy.
pub struct OverlayManager<B: WindowBackend> {
    registry: OverlayRegistry<B>,
    store: PositionStore,
    default_position: Position,
}

impl<B: WindowBackend> OverlayManager<B> {
    pub fn new(backend: B, store: PositionStore, config: &AppConfig) -> Self {
        Self {
            registry: OverlayRegistry::new(backend, config.content_url.clone(), config.min_size()),
            store,
            default_position: config.default_position,
        }
    }

    pub fn create(&mut self, descriptor: &OverlayDescriptor) -> Result<PendingLoad, Error> {
        let fallback = self.fallback_position(&descriptor.id);
        self.registry.create(descriptor, fallback)
    }

    pub fn update(&mut self, descriptor: &OverlayDescriptor) -> Result<PendingLoad, Error> {
        let fallback = self.fallback_position(&descriptor.id);
        self.registry.update(descriptor, fallback)
    }

    pub fn close(&mut self, id: &str) -> bool {
        self.registry.close(id)
    }

    pub fn close_all(&mut self) -> Vec<String> {
        self.registry.close_all()
    }

    pub fn get_position(&self, id: &str) -> Option<Position> {
        self.registry.position(id)
    }

    pub fn save_positions(&self, positions: &Positions) -> bool {
        self.store.save(positions)
    }

    pub fn load_positions(&self) -> Positions {
        self.store.load()
    }

    pub fn live_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    pub fn set_click_through(&self, enabled: bool) -> Result<(), Error> {
        self.registry.backend().set_main_click_through(enabled)
    }

    pub fn window_bounds(&self) -> Option<Bounds> {
        self.registry.backend().main_bounds()
    }

    /// Make every active overlay draggable and show the anchor indicator.
    pub fn enter_anchor_mode(&mut self, active: &[OverlayDescriptor]) -> AnchorModeChange {
        tracing::info!(count = active.len(), "Entering anchor mode");

        let anchored = active.iter().map(|descriptor| {
            OverlayDescriptor {
                position: None,
                ..descriptor.clone()
            }
            .with_anchor_mode(true)
        });
        let (loads, error) = self.update_all(anchored);

        AnchorModeChange {
            positions: Positions::new(),
            loads,
            error,
        }
    }

    /// Persist where the user left each active overlay, then lock them again.
    /// An overlay whose own descriptor still asks for anchor mode stays movable.
    pub fn exit_anchor_mode(&mut self, active: &[OverlayDescriptor]) -> AnchorModeChange {
        tracing::info!(count = active.len(), "Leaving anchor mode");

        let positions: Positions = active
            .iter()
            .filter_map(|d| self.get_position(&d.id).map(|p| (d.id.clone(), p)))
            .collect();

        if !self.store.merge(&positions) {
            tracing::warn!("Overlay positions from anchor mode were not persisted");
        }

        let locked = active.iter().map(|descriptor| OverlayDescriptor {
            position: None,
            ..descriptor.clone()
        });
        let (loads, error) = self.update_all(locked);

        AnchorModeChange {
            positions,
            loads,
            error,
        }
    }

    /// Update each descriptor in turn. A failure doesn't stop the rest; the
    /// first one is returned.
    fn update_all(
        &mut self,
        descriptors: impl Iterator<Item = OverlayDescriptor>,
    ) -> (Vec<PendingLoad>, Option<Error>) {
        let mut loads = Vec::new();
        let mut first_error = None;

        for descriptor in descriptors {
            match self.update(&descriptor) {
                Ok(load) => loads.push(load),
                Err(e) => {
                    tracing::error!(id = %descriptor.id, error = %e, "Failed to update overlay");
                    first_error.get_or_insert(e);
                }
            }
        }

        (loads, first_error)
    }

    /// Apply a backend event. Returns a signal when a waiting caller of
    /// create/update should be answered.
    pub fn handle_surface_event(&mut self, event: SurfaceEvent) -> Option<LoadSignal> {
        let SurfaceEvent { label, kind } = event;

        match kind {
            SurfaceEventKind::Closed => self.registry.forget(&label).map(LoadSignal::Closed),
            SurfaceEventKind::Moved(position) => {
                self.registry.record_move(&label, position);
                None
            }
            SurfaceEventKind::DomReady => {
                let id = self.registry.id_for_label(&label)?.to_string();
                self.reveal(&id);
                None
            }
            SurfaceEventKind::LoadFinished { generation } => {
                let id = self.current_load(&label, generation)?;
                self.reveal(&id);
                Some(LoadSignal::Loaded { id, generation })
            }
            SurfaceEventKind::LoadFailed { generation, reason } => {
                let id = self.current_load(&label, generation)?;
                tracing::error!(id = %id, reason = %reason, "Overlay failed to load");
                Some(LoadSignal::Failed {
                    id,
                    generation,
                    reason,
                })
            }
        }
    }

    /// Id behind `label` if `generation` is its latest load. Events from a
    /// navigation that a later update replaced are dropped.
    fn current_load(&self, label: &str, generation: u64) -> Option<String> {
        let id = self.registry.id_for_label(label)?;
        if self.registry.generation(id) != Some(generation) {
            tracing::debug!(id = %id, generation, "Ignoring load event of a superseded navigation");
            return None;
        }
        Some(id.to_string())
    }

    /// Show timeout for one load. Forces the window visible whether or not
    /// a newer load superseded this one.
    pub fn handle_show_timeout(&mut self, id: &str, generation: u64) {
        if !self.registry.contains(id) {
            return;
        }
        if self.registry.generation(id) != Some(generation) {
            tracing::trace!(id = %id, generation, "Show timeout for superseded load");
        }
        if let Err(e) = self.registry.force_reveal(id) {
            tracing::warn!(id = %id, error = %e, "Failed to force overlay visible");
        }
    }

    fn reveal(&mut self, id: &str) {
        if let Err(e) = self.registry.reveal(id) {
            tracing::warn!(id = %id, error = %e, "Failed to show overlay");
        }
    }

    fn fallback_position(&self, id: &str) -> Position {
        self.store.get(id).unwrap_or(self.default_position)
    }
}
