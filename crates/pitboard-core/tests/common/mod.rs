#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use pitboard_core::{
    AppConfig, Bounds, CommandChannel, ContentUrl, Error, OverlayManager, OverlaySurface,
    Position, PositionStore, Size, SurfaceEvent, SurfaceEventKind, WindowBackend, WindowSpec,
};
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBehavior {
    /// Report load-finished as soon as a document is requested.
    Finish,
    /// Report DOM-ready only; load-finished never comes.
    DomReadyOnly,
    /// Report nothing; only the show timeout can reveal the window.
    Silent,
    Fail,
}

#[derive(Debug, Clone)]
pub struct MockWindow {
    pub label: String,
    pub url: ContentUrl,
    /// Load generation of the latest open or navigate.
    pub generation: u64,
    pub position: Position,
    pub size: Size,
    pub movable: bool,
    pub visible: bool,
    pub destroyed: bool,
    pub show_calls: usize,
    pub navigations: usize,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub windows: Vec<MockWindow>,
    pub closed_events: usize,
    pub main_click_through: bool,
    pub main_bounds: Option<Bounds>,
    pub fail_open: bool,
}

impl MockState {
    pub fn live(&self) -> Vec<&MockWindow> {
        self.windows.iter().filter(|w| !w.destroyed).collect()
    }

    pub fn live_for(&self, id: &str) -> Vec<&MockWindow> {
        let prefix = format!("overlay/{id}/");
        self.live()
            .into_iter()
            .filter(|w| w.label.starts_with(&prefix))
            .collect()
    }

    pub fn window(&self, label: &str) -> &MockWindow {
        self.windows
            .iter()
            .find(|w| w.label == label)
            .expect("no such window")
    }

    fn window_mut(&mut self, label: &str) -> &mut MockWindow {
        self.windows
            .iter_mut()
            .find(|w| w.label == label)
            .expect("no such window")
    }
}

#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    events: UnboundedSender<SurfaceEvent>,
}

impl MockHandle {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// The user drags a window somewhere.
    pub fn drag(&self, label: &str, position: Position) {
        self.state().window_mut(label).position = position;
        self.events
            .send(SurfaceEvent::new(label, SurfaceEventKind::Moved(position)))
            .unwrap();
    }

    /// The window goes away without the manager asking (OS close, crash).
    pub fn close_externally(&self, label: &str) {
        self.state().window_mut(label).destroyed = true;
        self.state().closed_events += 1;
        self.events
            .send(SurfaceEvent::new(label, SurfaceEventKind::Closed))
            .unwrap();
    }

    pub fn emit(&self, label: &str, kind: SurfaceEventKind) {
        self.events.send(SurfaceEvent::new(label, kind)).unwrap();
    }
}

pub struct MockBackend {
    handle: MockHandle,
    load: LoadBehavior,
}

impl MockBackend {
    pub fn new(load: LoadBehavior) -> (Self, MockHandle, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let handle = MockHandle {
            state: Arc::new(Mutex::new(MockState {
                main_bounds: Some(Bounds {
                    x: 10.0,
                    y: 20.0,
                    width: 1024.0,
                    height: 768.0,
                }),
                ..MockState::default()
            })),
            events,
        };
        (
            Self {
                handle: handle.clone(),
                load,
            },
            handle,
            rx,
        )
    }
}

fn report_load(handle: &MockHandle, label: &str, generation: u64, load: LoadBehavior) {
    let kind = match load {
        LoadBehavior::Finish => SurfaceEventKind::LoadFinished { generation },
        LoadBehavior::DomReadyOnly => SurfaceEventKind::DomReady,
        LoadBehavior::Silent => return,
        LoadBehavior::Fail => SurfaceEventKind::LoadFailed {
            generation,
            reason: "ERR_CONNECTION_REFUSED".into(),
        },
    };
    handle.emit(label, kind);
}

impl WindowBackend for MockBackend {
    type Surface = MockSurface;

    fn open(&mut self, spec: &WindowSpec) -> Result<MockSurface, Error> {
        if self.handle.state().fail_open {
            return Err(Error::WindowCreation(spec.label.clone()));
        }

        self.handle.state().windows.push(MockWindow {
            label: spec.label.clone(),
            url: spec.url.clone(),
            generation: spec.generation,
            position: spec.position,
            size: spec.size,
            movable: spec.movable,
            visible: false,
            destroyed: false,
            show_calls: 0,
            navigations: 1,
        });
        report_load(&self.handle, &spec.label, spec.generation, self.load);

        Ok(MockSurface {
            label: spec.label.clone(),
            handle: self.handle.clone(),
            load: self.load,
        })
    }

    fn set_main_click_through(&self, enabled: bool) -> Result<(), Error> {
        self.handle.state().main_click_through = enabled;
        Ok(())
    }

    fn main_bounds(&self) -> Option<Bounds> {
        self.handle.state().main_bounds
    }
}

pub struct MockSurface {
    label: String,
    handle: MockHandle,
    load: LoadBehavior,
}

impl OverlaySurface for MockSurface {
    fn show(&self) -> Result<(), Error> {
        let mut state = self.handle.state();
        let window = state.window_mut(&self.label);
        window.visible = true;
        window.show_calls += 1;
        Ok(())
    }

    fn focus(&self) -> Result<(), Error> {
        Ok(())
    }

    fn is_visible(&self) -> Result<bool, Error> {
        Ok(self.handle.state().window(&self.label).visible)
    }

    fn raise(&self) -> Result<(), Error> {
        Ok(())
    }

    fn set_movable(&self, movable: bool) -> Result<(), Error> {
        self.handle.state().window_mut(&self.label).movable = movable;
        Ok(())
    }

    fn navigate(&self, url: &ContentUrl, generation: u64) -> Result<(), Error> {
        {
            let mut state = self.handle.state();
            let window = state.window_mut(&self.label);
            window.url = url.clone();
            window.generation = generation;
            window.navigations += 1;
        }
        report_load(&self.handle, &self.label, generation, self.load);
        Ok(())
    }

    fn set_position(&self, position: Position) -> Result<(), Error> {
        self.handle.state().window_mut(&self.label).position = position;
        Ok(())
    }

    fn position(&self) -> Result<Position, Error> {
        Ok(self.handle.state().window(&self.label).position)
    }

    fn destroy(&self) -> Result<(), Error> {
        {
            let mut state = self.handle.state();
            state.window_mut(&self.label).destroyed = true;
            state.closed_events += 1;
        }
        self.handle.emit(&self.label, SurfaceEventKind::Closed);
        Ok(())
    }
}

pub struct Harness {
    pub channel: CommandChannel,
    pub mock: MockHandle,
    pub store: PositionStore,
    pub config: AppConfig,
    _dir: TempDir,
}

impl Harness {
    pub fn start(load: LoadBehavior) -> Self {
        Self::start_with(load, |_| {})
    }

    /// Build a service over a mock backend. `seed` runs against the position
    /// store before the service starts.
    pub fn start_with(load: LoadBehavior, seed: impl FnOnce(&PositionStore)) -> Self {
        let config = AppConfig {
            content_url: "http://localhost:5173/".to_string(),
            ..AppConfig::default()
        };
        Self::start_configured(load, config, seed)
    }

    pub fn start_configured(
        load: LoadBehavior,
        config: AppConfig,
        seed: impl FnOnce(&PositionStore),
    ) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("pitboard_core=debug")
            .with_test_writer()
            .try_init();

        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::new(dir.path().join("pitboard").join("overlay-positions.json"));
        seed(&store);

        let (backend, mock, events) = MockBackend::new(load);
        let manager = OverlayManager::new(backend, store.clone(), &config);
        let (channel, service) = pitboard_core::channel(manager, events, config.show_timeout());
        tokio::spawn(service.run());

        Self {
            channel,
            mock,
            store,
            config,
            _dir: dir,
        }
    }
}

/// Let the service drain queued surface events.
pub async fn settle() {
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn label_of(mock: &MockHandle, id: &str) -> String {
    let state = mock.state();
    let live = state.live_for(id);
    assert_eq!(live.len(), 1, "expected exactly one live window for {id}");
    live[0].label.clone()
}
