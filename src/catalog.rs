//! Device and preset lookup over built-in and user-defined items

use log::debug;

use crate::state::{AppState, DisplaySelector, Preset, SelectorKind, ViewSpec};

pub trait CatalogItem: Clone {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn mark_user_defined(&mut self);
}

impl CatalogItem for ViewSpec {
    fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    fn mark_user_defined(&mut self) {
        self.user_defined = true;
    }
}

impl CatalogItem for Preset {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn mark_user_defined(&mut self) {
        self.user_defined = true;
    }
}

/// User items first (so they shadow built-ins with the same id), unique by
/// id, sorted by title
pub fn items<T: CatalogItem>(user: &[T], builtin: &[T]) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<T> = user
        .iter()
        .cloned()
        .map(|mut item| {
            item.mark_user_defined();
            item
        })
        .chain(builtin.iter().cloned())
        .filter(|item| seen.insert(item.id().to_string()))
        .collect();
    out.sort_by(|a, b| a.title().cmp(b.title()));
    out
}

pub fn devices(state: &AppState) -> Vec<ViewSpec> {
    items(&state.user.devices, &state.devices)
}

pub fn presets(state: &AppState) -> Vec<Preset> {
    items(&state.user.presets, &state.presets)
}

/// Make sure the wall selector points at an existing item. A dangling
/// selector falls back to the first item of the same kind; a missing one to
/// the first preset. Returns true when the selector changed.
pub fn validate_selection(state: &mut AppState) -> bool {
    let current = state.device_wall_picker.display.clone();
    let kind = current
        .as_ref()
        .map_or(SelectorKind::Preset, |display| display.kind);

    let ids: Vec<String> = match kind {
        SelectorKind::Device => devices(state).iter().map(|d| d.id().to_string()).collect(),
        SelectorKind::Preset => presets(state).iter().map(|p| p.id.clone()).collect(),
    };

    if let Some(display) = &current {
        if ids.iter().any(|id| *id == display.id) {
            return false;
        }
    }

    let repaired = ids.into_iter().next().map(|id| DisplaySelector { kind, id });
    debug!("wall selection {current:?} repaired to {repaired:?}");
    let changed = repaired != current;
    state.device_wall_picker.display = repaired;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(id: &str, title: &str) -> Preset {
        Preset {
            id: id.into(),
            title: title.into(),
            devices: Vec::new(),
            user_defined: false,
        }
    }

    #[test]
    fn test_user_items_shadow_builtins_and_sort_by_title() {
        let builtin = vec![
            ViewSpec::device("b", "Beta", 300.0, 500.0),
            ViewSpec::device("a", "Alpha", 300.0, 500.0),
        ];
        let user = vec![ViewSpec::device("b", "Custom", 200.0, 300.0)];
        let merged = items(&user, &builtin);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title(), "Alpha");
        assert_eq!(merged[1].title(), "Custom");
        assert!(merged[1].user_defined);
        assert!(!merged[0].user_defined);
    }

    #[test]
    fn test_dangling_selection_falls_back_to_first_preset() {
        let mut state = AppState {
            presets: vec![preset("tablets", "Tablets"), preset("phones", "Phones")],
            ..AppState::default()
        };
        state.device_wall_picker.display = Some(DisplaySelector {
            kind: SelectorKind::Preset,
            id: "gone".into(),
        });

        assert!(validate_selection(&mut state));
        assert_eq!(
            state.device_wall_picker.display,
            Some(DisplaySelector {
                kind: SelectorKind::Preset,
                id: "phones".into()
            })
        );
        assert!(!validate_selection(&mut state));
    }

    #[test]
    fn test_dangling_device_selection_falls_back_to_first_device() {
        let mut state = AppState {
            devices: vec![ViewSpec::device("z", "Zed", 300.0, 500.0)],
            ..AppState::default()
        };
        state.device_wall_picker.display = Some(DisplaySelector {
            kind: SelectorKind::Device,
            id: "missing".into(),
        });
        validate_selection(&mut state);
        assert_eq!(
            state.device_wall_picker.display.map(|d| d.id),
            Some("z".to_string())
        );
    }
}
