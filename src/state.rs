//! Application state consumed by the preview and its comparison-ready
//! projection.
//!
//! The state is owned by the caller (loaded from a YAML/JSON file by the
//! binary); the preview only reads it.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::dimension::Dimension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    Breakpoints,
    DeviceWall,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Breakpoints => "breakpoints",
            DisplayMode::DeviceWall => "device-wall",
        }
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakpoints" => Ok(DisplayMode::Breakpoints),
            "device-wall" => Ok(DisplayMode::DeviceWall),
            other => Err(format!("unknown display mode: {other}")),
        }
    }
}

fn full_height() -> Dimension {
    Dimension::new(100.0, "%")
}

/// Size and behaviour of one view: a breakpoint of the reel or a device of
/// the wall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ViewSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub width: Dimension,
    #[serde(default = "full_height")]
    pub height: Dimension,
    /// Media query the breakpoint was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_viewport_width: Option<f64>,
    #[serde(default)]
    pub resize: bool,
    #[serde(default)]
    pub use_page_viewport: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub user_defined: bool,
}

impl ViewSpec {
    pub fn with_width(width: f64) -> Self {
        Self {
            id: None,
            title: None,
            label: None,
            width: Dimension::px(width),
            height: full_height(),
            query: None,
            max_viewport_width: None,
            resize: false,
            use_page_viewport: false,
            user_agent: None,
            user_defined: false,
        }
    }

    pub fn device(id: &str, title: &str, width: f64, height: f64) -> Self {
        Self {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            height: Dimension::px(height),
            ..Self::with_width(width)
        }
    }

    /// Identity used to match views across updates. Breakpoints without an
    /// id are identified by their width.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self.width.to_string(),
        }
    }

    pub fn area(&self) -> f64 {
        self.width.value * self.height.value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Preset {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub user_defined: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    pub max_viewport_width: Option<f64>,
    pub item_margin: f64,
    pub activate_key: u32,
    pub disable_animations: bool,
    pub no_scroll_override: bool,
    pub scroll_width: Option<f64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_viewport_width: Some(600.0),
            item_margin: 20.0,
            activate_key: 16,
            disable_animations: false,
            no_scroll_override: false,
            scroll_width: None,
        }
    }
}

/// Partial options update pushed to a live layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsPatch {
    pub max_viewport_width: Option<f64>,
    pub item_margin: Option<f64>,
    pub activate_key: Option<u32>,
    pub disable_animations: Option<bool>,
    pub no_scroll_override: Option<bool>,
    pub scroll_width: Option<f64>,
}

impl OptionsPatch {
    /// Fields of `next` that differ from `prev`
    pub fn diff(prev: &Options, next: &Options) -> Self {
        fn changed<T: PartialEq + Copy>(a: T, b: T) -> Option<T> {
            (a != b).then_some(b)
        }
        Self {
            max_viewport_width: changed(prev.max_viewport_width, next.max_viewport_width)
                .flatten(),
            item_margin: changed(prev.item_margin, next.item_margin),
            activate_key: changed(prev.activate_key, next.activate_key),
            disable_animations: changed(prev.disable_animations, next.disable_animations),
            no_scroll_override: changed(prev.no_scroll_override, next.no_scroll_override),
            scroll_width: changed(prev.scroll_width, next.scroll_width).flatten(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, options: &mut Options) {
        if let Some(v) = self.max_viewport_width {
            options.max_viewport_width = Some(v);
        }
        if let Some(v) = self.item_margin {
            options.item_margin = v;
        }
        if let Some(v) = self.activate_key {
            options.activate_key = v;
        }
        if let Some(v) = self.disable_animations {
            options.disable_animations = v;
        }
        if let Some(v) = self.no_scroll_override {
            options.no_scroll_override = v;
        }
        if let Some(v) = self.scroll_width {
            options.scroll_width = Some(v);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Preset,
    Device,
}

/// What the device wall displays: one device or every device of a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySelector {
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceWallPicker {
    pub display: Option<DisplaySelector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ui {
    /// Kept as text: an unrecognised mode renders nothing
    pub mode: String,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Breakpoints.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub devices: Vec<ViewSpec>,
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppState {
    pub page_url: String,
    pub ui: Ui,
    pub options: Options,
    pub breakpoints: Vec<ViewSpec>,
    pub device_wall_picker: DeviceWallPicker,
    pub devices: Vec<ViewSpec>,
    pub presets: Vec<Preset>,
    pub user: UserData,
}

impl AppState {
    /// Load from YAML (or JSON, which YAML accepts) and repair the wall
    /// selector
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        let mut state: AppState = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;
        catalog::validate_selection(&mut state);
        Ok(state)
    }

    pub fn mode(&self) -> Option<DisplayMode> {
        self.ui.mode.parse().ok()
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.ui.mode = mode.as_str().to_string();
    }
}

/// Everything the mode controller needs to decide what to render
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub mode: Option<DisplayMode>,
    pub url: String,
    pub options: Options,
    pub specs: Vec<ViewSpec>,
}

impl Snapshot {
    pub fn project(state: &AppState) -> Self {
        let mode = state.mode();
        let specs = match mode {
            Some(DisplayMode::Breakpoints) => breakpoint_specs(state),
            Some(DisplayMode::DeviceWall) => wall_specs(state),
            None => Vec::new(),
        };
        Self {
            mode,
            url: state.page_url.clone(),
            options: state.options.clone(),
            specs,
        }
    }

    pub fn can_render(&self) -> bool {
        !self.url.is_empty() && !self.specs.is_empty() && self.mode.is_some()
    }

    /// Structural equality ignoring options
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.mode == other.mode && self.url == other.url && self.specs == other.specs
    }
}

fn breakpoint_specs(state: &AppState) -> Vec<ViewSpec> {
    state
        .breakpoints
        .iter()
        .map(|spec| ViewSpec {
            height: full_height(),
            max_viewport_width: state.options.max_viewport_width,
            resize: true,
            ..spec.clone()
        })
        .collect()
}

fn wall_specs(state: &AppState) -> Vec<ViewSpec> {
    let Some(display) = &state.device_wall_picker.display else {
        return Vec::new();
    };
    let devices = catalog::devices(state);
    let selected: Vec<ViewSpec> = match display.kind {
        SelectorKind::Device => devices
            .into_iter()
            .filter(|d| d.id.as_deref() == Some(display.id.as_str()))
            .take(1)
            .collect(),
        SelectorKind::Preset => match catalog::presets(state)
            .into_iter()
            .find(|p| p.id == display.id)
        {
            Some(preset) => devices
                .into_iter()
                .filter(|d| d.id.as_ref().is_some_and(|id| preset.devices.contains(id)))
                .collect(),
            None => Vec::new(),
        },
    };
    selected
        .into_iter()
        .map(|spec| ViewSpec {
            use_page_viewport: true,
            ..spec
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> AppState {
        AppState {
            page_url: "http://localhost/".into(),
            breakpoints: vec![ViewSpec::with_width(320.0), ViewSpec::with_width(768.0)],
            devices: vec![
                ViewSpec::device("iphone", "iPhone", 375.0, 667.0),
                ViewSpec::device("ipad", "iPad", 768.0, 1024.0),
                ViewSpec::device("pixel", "Pixel", 412.0, 915.0),
            ],
            presets: vec![Preset {
                id: "phones".into(),
                title: "Phones".into(),
                devices: vec!["iphone".into(), "pixel".into()],
                user_defined: false,
            }],
            device_wall_picker: DeviceWallPicker {
                display: Some(DisplaySelector {
                    kind: SelectorKind::Preset,
                    id: "phones".into(),
                }),
            },
            ..AppState::default()
        }
    }

    #[test]
    fn test_breakpoint_projection() {
        let snapshot = Snapshot::project(&sample_state());
        assert_eq!(snapshot.mode, Some(DisplayMode::Breakpoints));
        assert_eq!(snapshot.specs.len(), 2);
        assert!(snapshot.specs.iter().all(|s| s.resize));
        assert!(snapshot.specs.iter().all(|s| s.height.to_string() == "100%"));
        assert_eq!(snapshot.specs[0].max_viewport_width, Some(600.0));
        assert!(snapshot.can_render());
    }

    #[test]
    fn test_wall_projection_resolves_preset() {
        let mut state = sample_state();
        state.set_mode(DisplayMode::DeviceWall);
        let snapshot = Snapshot::project(&state);
        let ids: Vec<_> = snapshot.specs.iter().filter_map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["iphone", "pixel"]);
        assert!(snapshot.specs.iter().all(|s| s.use_page_viewport));
    }

    #[test]
    fn test_unknown_mode_cannot_render() {
        let mut state = sample_state();
        state.ui.mode = "carousel".into();
        assert!(!Snapshot::project(&state).can_render());

        let mut empty_url = sample_state();
        empty_url.page_url.clear();
        assert!(!Snapshot::project(&empty_url).can_render());
    }

    #[test]
    fn test_options_are_ignored_by_content_comparison() {
        let state = sample_state();
        let a = Snapshot::project(&state);
        let mut changed = state.clone();
        changed.options.item_margin = 5.0;
        let b = Snapshot::project(&changed);
        assert!(a.same_content(&b));
        assert_ne!(a, b);

        let patch = OptionsPatch::diff(&a.options, &b.options);
        assert_eq!(patch.item_margin, Some(5.0));
        assert_eq!(patch.max_viewport_width, None);
    }

    #[test]
    fn test_parse_state_yaml() {
        let yaml = r#"
page-url: http://localhost/index.html
ui:
  mode: device-wall
breakpoints:
  - width: 320
  - width: "768px"
devices:
  - id: phone
    title: Phone
    width: "360"
    height: 640
device-wall-picker:
  display:
    type: device
    id: phone
"#;
        let state: AppState = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(state.mode(), Some(DisplayMode::DeviceWall));
        assert_eq!(state.breakpoints[1].width, Dimension::px(768.0));
        assert_eq!(state.options.item_margin, 20.0);
        let snapshot = Snapshot::project(&state);
        assert_eq!(snapshot.specs.len(), 1);
        assert_eq!(snapshot.specs[0].height, Dimension::px(640.0));
    }
}
