//! Pan and zoom state of the device wall layer
//!
//! The layer is translated by `(x, y)` and scaled by `scale` inside a fixed
//! viewport. Positions are clamped so the layer never uncovers empty space
//! beyond its edges; a layer smaller than the viewport is centered.

use super::packing::Size;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoom {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    viewport: Size,
    layer: Size,
    drag: Option<(f64, f64)>,
}

impl PanZoom {
    /// Start fully zoomed out and centered
    pub fn new(viewport: Size, layer: Size, min_scale: f64, max_scale: f64) -> Self {
        let mut state = Self {
            x: 0.0,
            y: 0.0,
            scale: min_scale,
            min_scale,
            max_scale,
            viewport,
            layer,
            drag: None,
        };
        let x = (viewport.width - layer.width * min_scale) / 2.0;
        let y = (viewport.height - layer.height * min_scale) / 2.0;
        state.render(x, y, min_scale);
        state
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn layer(&self) -> Size {
        self.layer
    }

    /// Re-read layer and viewport sizes after a relayout
    pub fn update(&mut self, viewport: Size, layer: Size, min_scale: f64, max_scale: f64) {
        self.viewport = viewport;
        self.layer = layer;
        self.min_scale = min_scale;
        self.max_scale = max_scale;
        let scale = self.clamp_scale(self.scale);
        self.render(self.x, self.y, scale);
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale.max(self.min_scale))
    }

    /// Apply a position and scale, clamping the position to the layer edges.
    /// Offsets are truncated to whole pixels.
    pub fn render(&mut self, x: f64, y: f64, scale: f64) {
        let dw = self.viewport.width - self.layer.width * scale;
        let dh = self.viewport.height - self.layer.height * scale;

        let min_x = dw.min(dw / 2.0);
        let max_x = min_x.max(0.0);
        let min_y = dh.min(dh / 2.0);
        let max_y = min_y.max(0.0);

        self.x = x.clamp(min_x, max_x).trunc();
        self.y = y.clamp(min_y, max_y).trunc();
        self.scale = scale;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// A new drag replaces any previous one
    pub fn begin_drag(&mut self, pointer_x: f64, pointer_y: f64) {
        self.drag = Some((self.x - pointer_x, self.y - pointer_y));
    }

    pub fn drag_to(&mut self, pointer_x: f64, pointer_y: f64) {
        if let Some((start_x, start_y)) = self.drag {
            self.render(pointer_x + start_x, pointer_y + start_y, self.scale);
        }
    }

    pub fn end_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Zoom so that the content point under the pointer stays under it
    pub fn zoom_at(&mut self, scale: f64, pointer_x: f64, pointer_y: f64) {
        let scale = self.clamp_scale(scale);

        let mx = pointer_x - self.x;
        let my = pointer_y - self.y;

        let cw = self.layer.width * self.scale;
        let ch = self.layer.height * self.scale;
        let tw = self.layer.width * scale;
        let th = self.layer.height * scale;

        let dx = if cw > 0.0 { (cw - tw) * (mx / cw) } else { 0.0 };
        let dy = if ch > 0.0 { (ch - th) * (my / ch) } else { 0.0 };

        self.render(self.x + dx, self.y + dy, scale);
    }

    /// Map a layer-space point to viewport coordinates
    pub fn to_viewport(&self, x: f64, y: f64) -> (f64, f64) {
        (self.x + x * self.scale, self.y + y * self.scale)
    }

    /// Map a viewport point back into layer space
    pub fn to_layer(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x) / self.scale, (y - self.y) / self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> PanZoom {
        PanZoom::new(Size::new(1000.0, 800.0), Size::new(2000.0, 1600.0), 0.5, 1.0)
    }

    #[test]
    fn test_starts_centered_at_min_scale() {
        let pz = PanZoom::new(Size::new(1000.0, 800.0), Size::new(1000.0, 400.0), 0.5, 1.0);
        assert_eq!(pz.scale, 0.5);
        assert_eq!((pz.x, pz.y), (250.0, 300.0));
    }

    #[test]
    fn test_pan_is_clamped_to_edges() {
        let mut pz = wall();
        pz.zoom_at(1.0, 0.0, 0.0);
        pz.render(100.0, 100.0, 1.0);
        assert_eq!((pz.x, pz.y), (0.0, 0.0));
        pz.render(-5000.0, -5000.0, 1.0);
        assert_eq!((pz.x, pz.y), (-1000.0, -800.0));
    }

    #[test]
    fn test_drag_moves_by_pointer_delta() {
        let mut pz = wall();
        pz.render(-200.0, -200.0, 1.0);
        pz.begin_drag(500.0, 400.0);
        pz.drag_to(450.0, 380.0);
        assert_eq!((pz.x, pz.y), (-250.0, -220.0));
        assert!(pz.end_drag());
        pz.drag_to(0.0, 0.0);
        assert_eq!((pz.x, pz.y), (-250.0, -220.0));
    }

    #[test]
    fn test_zoom_keeps_point_under_cursor() {
        let mut pz = wall();
        pz.render(-400.0, -300.0, 0.75);
        let pointer = (300.0, 200.0);
        let before = pz.to_layer(pointer.0, pointer.1);
        pz.zoom_at(1.0, pointer.0, pointer.1);
        let after = pz.to_layer(pointer.0, pointer.1);
        assert!((before.0 - after.0).abs() <= 1.0);
        assert!((before.1 - after.1).abs() <= 1.0);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut pz = wall();
        pz.zoom_at(3.0, 0.0, 0.0);
        assert_eq!(pz.scale, 1.0);
        pz.zoom_at(0.1, 0.0, 0.0);
        assert_eq!(pz.scale, 0.5);
    }
}
