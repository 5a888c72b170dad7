use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

pub const DESCRIPTOR_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Grow each dimension up to `min`; never shrinks.
    pub fn clamped(self, min: Size) -> Size {
        Size {
            width: self.width.max(min.width),
            height: self.height.max(min.height),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// What the control surface asks for when it wants an overlay on screen.
///
/// Only `id` and `size` are required on the wire. The informational fields
/// (`name`, `description`, `component`, `enabled`) are carried so the control
/// surface can send its own overlay records unchanged; they do not affect the
/// window.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDescriptor {
    #[serde(default = "default_version")]
    pub version: u32,
    pub id: String,
    pub size: Size,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub anchor_mode: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Replaces the configured content base for this overlay only.
    #[serde(default)]
    pub url: Option<String>,
}

fn default_version() -> u32 {
    DESCRIPTOR_VERSION
}

impl OverlayDescriptor {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            id: id.into(),
            size: Size { width, height },
            position: None,
            anchor_mode: false,
            name: None,
            description: None,
            component: None,
            enabled: None,
            url: None,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_anchor_mode(mut self, anchor_mode: bool) -> Self {
        self.anchor_mode = anchor_mode;
        self
    }

    /// Reject descriptors the registry must never see.
    pub fn validate(&self) -> Result<(), Error> {
        if self.version != DESCRIPTOR_VERSION {
            return Err(Error::InvalidDescriptor(format!(
                "unsupported descriptor version {}",
                self.version
            )));
        }
        if self.id.is_empty() {
            return Err(Error::InvalidDescriptor("overlay id is empty".to_string()));
        }
        if let Some(bad) = self.id.chars().find(|c| !is_label_char(*c)) {
            return Err(Error::InvalidDescriptor(format!(
                "overlay id {:?} contains {:?}",
                self.id, bad
            )));
        }
        if !self.size.width.is_finite() || !self.size.height.is_finite() {
            return Err(Error::InvalidDescriptor(format!(
                "overlay {} has a non-finite size",
                self.id
            )));
        }
        if self
            .position
            .is_some_and(|pos| !pos.x.is_finite() || !pos.y.is_finite())
        {
            return Err(Error::InvalidDescriptor(format!(
                "overlay {} has a non-finite position",
                self.id
            )));
        }
        Ok(())
    }

    /// The document address for this overlay: `base?overlay=<id>[&anchorMode=true]`.
    /// Other query pairs already on the base are kept. A relative base names
    /// a bundled asset.
    pub fn content_url(&self, base: &str) -> Result<ContentUrl, Error> {
        let base = self.url.as_deref().unwrap_or(base);
        let invalid = |e: url::ParseError| Error::ContentLoad {
            id: self.id.clone(),
            reason: format!("invalid content URL {base:?}: {e}"),
        };

        let (mut url, bundled) = match Url::parse(base) {
            Ok(url) => (url, false),
            Err(url::ParseError::RelativeUrlWithoutBase) => (
                Url::parse(BUNDLE_ROOT)
                    .and_then(|root| root.join(base))
                    .map_err(invalid)?,
                true,
            ),
            Err(e) => return Err(invalid(e)),
        };

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "overlay" && k != "anchorMode")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.extend_pairs(kept);
            query.append_pair("overlay", &self.id);
            if self.anchor_mode {
                query.append_pair("anchorMode", "true");
            }
        }

        Ok(if bundled {
            ContentUrl::App(app_relative(&url))
        } else {
            ContentUrl::External(url)
        })
    }
}

/// Stand-in origin for resolving bundled paths; never leaves this module.
const BUNDLE_ROOT: &str = "app://bundle/";

/// Where an overlay window's document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentUrl {
    /// Bundled asset relative to the app root, query included:
    /// `index.html?overlay=tyre-wear`.
    App(String),
    /// Absolute URL, loaded as is.
    External(Url),
}

impl ContentUrl {
    pub fn as_str(&self) -> &str {
        match self {
            ContentUrl::App(path) => path,
            ContentUrl::External(url) => url.as_str(),
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            ContentUrl::App(path) => path.split_once('?').map(|(_, query)| query),
            ContentUrl::External(url) => url.query(),
        }
    }

    /// Whether a page that finished loading at `loaded` is this document.
    pub fn is_loaded_at(&self, loaded: &Url) -> bool {
        match self {
            ContentUrl::App(path) => app_relative(loaded) == *path,
            ContentUrl::External(url) => without_fragment(url) == without_fragment(loaded),
        }
    }

    /// Same document with any query: an earlier navigation of the same
    /// window finishing late.
    pub fn is_same_document(&self, loaded: &Url) -> bool {
        match self {
            ContentUrl::App(path) => {
                path.split('?').next() == Some(loaded.path().trim_start_matches('/'))
            }
            ContentUrl::External(url) => {
                url.origin() == loaded.origin() && url.path() == loaded.path()
            }
        }
    }
}

fn app_relative(url: &Url) -> String {
    let path = url.path().trim_start_matches('/');
    match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_wire_descriptor() {
        let d: OverlayDescriptor =
            serde_json::from_str(r#"{"id":"tyre-wear","size":{"width":300,"height":200}}"#)
                .unwrap();
        assert_eq!(d.version, 1);
        assert_eq!(d.position, None);
        assert!(!d.anchor_mode);
        d.validate().unwrap();
    }

    #[test]
    fn control_panel_record_is_accepted() {
        let d: OverlayDescriptor = serde_json::from_str(
            r##"{
                "id": "relative-widget",
                "name": "Relative Widget",
                "description": "Shows position relative to cars around you",
                "enabled": true,
                "size": {"width": 400, "height": 300},
                "position": {"x": 100, "y": 100},
                "anchorMode": true,
                "config": {"textColor": "#ffffff", "opacity": 90}
            }"##,
        )
        .unwrap();
        assert!(d.anchor_mode);
        assert_eq!(d.position, Some(Position { x: 100.0, y: 100.0 }));
        assert_eq!(d.name.as_deref(), Some("Relative Widget"));
        d.validate().unwrap();
    }

    #[test]
    fn rejects_bad_ids_and_versions() {
        assert!(OverlayDescriptor::new("", 400.0, 300.0).validate().is_err());
        assert!(OverlayDescriptor::new("has space", 400.0, 300.0).validate().is_err());

        let mut d = OverlayDescriptor::new("ok", 400.0, 300.0);
        d.version = 2;
        assert!(matches!(d.validate(), Err(Error::InvalidDescriptor(_))));

        let d = OverlayDescriptor::new("ok", f64::NAN, 300.0);
        assert!(d.validate().is_err());
    }

    #[test]
    fn clamp_only_grows() {
        let min = Size { width: 400.0, height: 300.0 };
        assert_eq!(Size { width: 100.0, height: 50.0 }.clamped(min), min);
        assert_eq!(
            Size { width: 800.0, height: 120.0 }.clamped(min),
            Size { width: 800.0, height: 300.0 }
        );
    }

    #[test]
    fn content_url_carries_id_and_anchor_flag() {
        let d = OverlayDescriptor::new("track-position", 350.0, 300.0);
        let url = d.content_url("http://localhost:5173/?track=spa").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5173/?track=spa&overlay=track-position");

        let url = d
            .with_anchor_mode(true)
            .content_url("http://localhost:5173/?overlay=stale&anchorMode=true")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5173/?overlay=track-position&anchorMode=true"
        );
    }

    #[test]
    fn relative_base_is_a_bundled_asset() {
        let d = OverlayDescriptor::new("tyre-wear", 400.0, 300.0).with_anchor_mode(true);
        let url = d.content_url("index.html").unwrap();
        assert_eq!(
            url,
            ContentUrl::App("index.html?overlay=tyre-wear&anchorMode=true".to_string())
        );
        assert_eq!(url.query(), Some("overlay=tyre-wear&anchorMode=true"));

        let url = d.content_url("./overlays/index.html?theme=dark").unwrap();
        assert_eq!(url.as_str(), "overlays/index.html?theme=dark&overlay=tyre-wear&anchorMode=true");
    }

    #[test]
    fn absolute_base_with_custom_scheme_stays_external() {
        let d = OverlayDescriptor::new("tyre-wear", 400.0, 300.0);
        assert!(matches!(
            d.content_url("tauri://localhost/index.html").unwrap(),
            ContentUrl::External(_)
        ));
    }

    #[test]
    fn loaded_url_matching() {
        let d = OverlayDescriptor::new("a", 400.0, 300.0);
        let bundled = d.content_url("index.html").unwrap();
        let loaded = Url::parse("http://tauri.localhost/index.html?overlay=a").unwrap();
        assert!(bundled.is_loaded_at(&loaded));

        let earlier = Url::parse("tauri://localhost/index.html?overlay=a&anchorMode=true").unwrap();
        assert!(!bundled.is_loaded_at(&earlier));
        assert!(bundled.is_same_document(&earlier));

        let external = d.content_url("http://localhost:5173/").unwrap();
        let loaded = Url::parse("http://localhost:5173/?overlay=a#top").unwrap();
        assert!(external.is_loaded_at(&loaded));

        let error_page = Url::parse("chrome-error://chromewebdata/").unwrap();
        assert!(!external.is_loaded_at(&error_page));
        assert!(!external.is_same_document(&error_page));
    }

    #[test]
    fn content_url_rejects_garbage_base() {
        let d = OverlayDescriptor::new("x", 400.0, 300.0);
        assert!(matches!(d.content_url("http://[::1"), Err(Error::ContentLoad { .. })));
    }
}
