//! Durable overlay positions.
//!
//! One flat JSON object, `{ "<overlay id>": { "x": .., "y": .. } }`, rewritten
//! in full on every save. Read failures look like an empty store and write
//! failures come back as `false`; neither is ever an error for the caller.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::Position;

pub type Positions = BTreeMap<String, Position>;

#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Positions {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Positions::new(),
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Failed to read overlay positions");
                return Positions::new();
            }
        };

        let raw: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(&content)
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Overlay positions file is corrupt, ignoring it");
                return Positions::new();
            }
        };

        raw.into_iter()
            .filter_map(|(id, value)| match serde_json::from_value::<Position>(value) {
                Ok(position) => Some((id, position)),
                Err(e) => {
                    tracing::debug!(id = %id, error = %e, "Skipping malformed position entry");
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Position> {
        self.load().remove(id)
    }

    pub fn save(&self, positions: &Positions) -> bool {
        match self.write(positions) {
            Ok(()) => {
                tracing::debug!(path = ?self.path, count = positions.len(), "Saved overlay positions");
                true
            }
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Failed to save overlay positions");
                false
            }
        }
    }

    /// Overlay `positions` onto what is already stored and save the result.
    /// Entries for other overlays are kept.
    pub fn merge(&self, positions: &Positions) -> bool {
        let mut stored = self.load();
        stored.extend(positions.iter().map(|(id, p)| (id.clone(), *p)));
        self.save(&stored)
    }

    /// Drop every stored entry whose id is not in `keep`. Never called
    /// implicitly: positions of disabled overlays survive until asked.
    pub fn prune<'a>(&self, keep: impl IntoIterator<Item = &'a str>) -> bool {
        let keep: Vec<&str> = keep.into_iter().collect();
        let mut stored = self.load();
        stored.retain(|id, _| keep.contains(&id.as_str()));
        self.save(&stored)
    }

    fn write(&self, positions: &Positions) -> Result<(), crate::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(positions)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
