pub mod backend;
pub mod descriptor;
pub mod manager;
#[cfg(feature = "tauri")]
pub mod platform;
pub mod registry;
#[cfg(feature = "tauri")]
pub mod tauri_backend;

pub use backend::*;
pub use descriptor::*;
pub use manager::{AnchorModeChange, LoadSignal, OverlayManager};
pub use registry::*;
#[cfg(feature = "tauri")]
pub use platform::configure_overlay;
