//! Zoom overlay shown over the wall while the activation key is held.
//!
//! Wheel motion scrolls a proxy whose scroll range maps linearly onto
//! `[min_scale, max_scale]`; every proxy position zooms the wall around the
//! last known pointer position.

use super::pan_zoom::PanZoom;
use crate::animate::{Easing, Tween};
use crate::timer::Millis;

/// Shift
pub const DEFAULT_ACTIVATE_KEY: u32 = 16;

const FADE_DURATION: Millis = 300;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveControl {
    scroll_top: f64,
    range: f64,
    shown_at: Millis,
}

#[derive(Debug)]
pub struct ControlLayer {
    activate_key: u32,
    pointer: (f64, f64),
    active: Option<ActiveControl>,
}

impl ControlLayer {
    pub fn new(activate_key: u32) -> Self {
        Self {
            activate_key,
            pointer: (0.0, 0.0),
            active: None,
        }
    }

    pub fn activate_key(&self) -> u32 {
        self.activate_key
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.pointer = (x, y);
    }

    /// Show the overlay, replacing a previous one. The proxy starts at the
    /// position matching the current scale.
    pub fn key_down(&mut self, key: u32, pan_zoom: &PanZoom, now: Millis) -> bool {
        if key != self.activate_key {
            return false;
        }
        let range = pan_zoom.viewport().height * (pan_zoom.max_scale - pan_zoom.min_scale);
        let span = pan_zoom.max_scale - pan_zoom.min_scale;
        let position = if span > 0.0 {
            (pan_zoom.scale - pan_zoom.min_scale) / span
        } else {
            0.0
        };
        self.active = Some(ActiveControl {
            scroll_top: (range * position).round(),
            range,
            shown_at: now,
        });
        true
    }

    pub fn key_up(&mut self, key: u32) -> bool {
        key == self.activate_key && self.active.take().is_some()
    }

    /// Scroll the proxy by `dy` and zoom accordingly
    pub fn scroll(&mut self, dy: f64, pan_zoom: &mut PanZoom) -> bool {
        let Some(active) = self.active else {
            return false;
        };
        self.scroll_to(active.scroll_top + dy, pan_zoom)
    }

    pub fn scroll_to(&mut self, top: f64, pan_zoom: &mut PanZoom) -> bool {
        let pointer = self.pointer;
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        active.scroll_top = top.clamp(0.0, active.range);
        let position = if active.range > 0.0 {
            active.scroll_top / active.range
        } else {
            0.0
        };
        let scale = pan_zoom.min_scale + (pan_zoom.max_scale - pan_zoom.min_scale) * position;
        pan_zoom.zoom_at(scale, pointer.0, pointer.1);
        true
    }

    pub fn opacity(&self, now: Millis) -> f64 {
        match self.active {
            Some(active) => Tween::new(0.0, 1.0, FADE_DURATION, Easing::OutCubic)
                .value_at(now.saturating_sub(active.shown_at)),
            None => 0.0,
        }
    }
}
