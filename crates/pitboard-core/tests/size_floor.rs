mod common;

use common::{LoadBehavior, MockBackend};
use pitboard_core::{OverlayDescriptor, OverlayRegistry, Position, Size};
use proptest::prelude::*;

const MIN: Size = Size {
    width: 400.0,
    height: 300.0,
};

proptest! {
    #[test]
    fn created_windows_respect_minimum_size(width in 1.0f64..2000.0, height in 1.0f64..2000.0) {
        let (backend, mock, _events) = MockBackend::new(LoadBehavior::Silent);
        let mut registry = OverlayRegistry::new(backend, "http://localhost:5173/", MIN);

        registry
            .create(&OverlayDescriptor::new("sized", width, height), Position { x: 0.0, y: 0.0 })
            .unwrap();

        prop_assert_eq!(registry.len(), 1);
        let window = registry.get("sized").unwrap();
        prop_assert_eq!(window.size.width, width.max(MIN.width));
        prop_assert_eq!(window.size.height, height.max(MIN.height));

        let state = mock.state();
        prop_assert!(state.windows[0].size.width >= MIN.width);
        prop_assert!(state.windows[0].size.height >= MIN.height);
    }
}
