/// Drag state of a view's resize handle
#[derive(Debug, Default)]
pub struct ResizeHandle {
    drag: Option<ResizeDrag>,
}

#[derive(Debug, Clone, Copy)]
struct ResizeDrag {
    pointer_start: f64,
    width_start: f64,
}

impl ResizeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Starting a drag replaces any drag that never saw its pointer-up
    pub fn begin(&mut self, pointer_x: f64, width: f64) {
        self.drag = Some(ResizeDrag {
            pointer_start: pointer_x,
            width_start: width,
        });
    }

    /// Width the view should take for the current pointer position
    pub fn track(&self, pointer_x: f64) -> Option<f64> {
        self.drag
            .map(|d| d.width_start + pointer_x - d.pointer_start)
    }

    pub fn end(&mut self) -> bool {
        self.drag.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_follows_pointer_delta() {
        let mut handle = ResizeHandle::new();
        assert_eq!(handle.track(10.0), None);

        handle.begin(100.0, 320.0);
        assert_eq!(handle.track(150.0), Some(370.0));
        assert_eq!(handle.track(40.0), Some(260.0));
        assert!(handle.end());
        assert!(!handle.end());
    }
}
