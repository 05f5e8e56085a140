//! Scroll bridge for the reel: vertical and horizontal wheel input both
//! scroll the reel horizontally.
//!
//! A proxy scroller with the same overflow on both axes receives the wheel
//! deltas. Whichever axis moved most drives the other one and the reel's
//! horizontal offset, proportionally.

use super::packing::Size;
use crate::timer::{Debounce, Millis};

/// Pixels per wheel line step
pub const PIXELS_PER_LINE: f64 = 40.0;

/// How long the bridge keeps capturing wheel input after the last tick
pub const OVERRIDE_WINDOW: Millis = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMode {
    Pixel,
    Line,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelDelta {
    pub dx: f64,
    pub dy: f64,
    pub mode: DeltaMode,
}

impl WheelDelta {
    pub fn pixels(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            mode: DeltaMode::Pixel,
        }
    }
}

#[derive(Debug)]
pub struct ScrollBridge {
    viewport: Size,
    overflow: f64,
    proxy: (f64, f64),
    prev: (f64, f64),
    content_left: f64,
    overriding: bool,
    reset: Debounce,
}

impl ScrollBridge {
    pub fn new(content_width: f64, viewport: Size) -> Self {
        let mut bridge = Self {
            viewport,
            overflow: 0.0,
            proxy: (0.0, 0.0),
            prev: (-1.0, -1.0),
            content_left: 0.0,
            overriding: false,
            reset: Debounce::new(OVERRIDE_WINDOW),
        };
        bridge.update(content_width, viewport);
        bridge
    }

    /// Horizontal scroll offset of the reel
    pub fn scroll_left(&self) -> f64 {
        self.content_left
    }

    pub fn has_overflow(&self) -> bool {
        self.overflow > 0.0
    }

    /// True while wheel input is captured by the proxy
    pub fn is_overriding(&self) -> bool {
        self.overriding
    }

    /// Resize the proxy after the reel or its container changed size,
    /// keeping the current horizontal offset
    pub fn update(&mut self, content_width: f64, viewport: Size) {
        self.viewport = viewport;
        self.overflow = (content_width - viewport.width).max(0.0);
        let left = self.content_left.min(self.overflow);
        self.proxy.0 = left;
        self.prev = (-1.0, -1.0);
        self.sync();
    }

    /// Feed a wheel event. `over_frame` input is left to the frame under
    /// the pointer. Returns true when the event was consumed.
    pub fn wheel(&mut self, delta: WheelDelta, over_frame: bool, now: Millis) -> bool {
        if over_frame {
            return false;
        }
        self.overriding = true;
        self.reset.trigger(now);

        let (dx, dy) = self.scroll_amount(delta);
        self.proxy.0 = (self.proxy.0 + dx).clamp(0.0, self.overflow);
        self.proxy.1 = (self.proxy.1 + dy).clamp(0.0, self.overflow);
        self.sync();
        true
    }

    /// Direct scroll of the reel (scrollbar drag, keyboard)
    pub fn scroll_to(&mut self, left: f64, now: Millis) {
        self.reset.trigger(now);
        self.proxy.0 = left.clamp(0.0, self.overflow);
        self.sync();
    }

    pub fn poll(&mut self, now: Millis) {
        if self.reset.fire(now) {
            self.overriding = false;
        }
    }

    fn sync(&mut self) {
        let (left, top) = self.proxy;
        if (left, top) == self.prev {
            return;
        }
        let ratio = |v: f64| {
            if self.overflow > 0.0 {
                (v / self.overflow).min(1.0)
            } else {
                0.0
            }
        };

        let percent = if (left - self.prev.0).abs() > (top - self.prev.1).abs() {
            let p = ratio(left);
            self.proxy.1 = self.overflow * p;
            p
        } else {
            let p = ratio(top);
            self.proxy.0 = self.overflow * p;
            p
        };

        self.content_left = self.overflow * percent;
        self.prev = self.proxy;
    }

    fn scroll_amount(&self, delta: WheelDelta) -> (f64, f64) {
        match delta.mode {
            DeltaMode::Pixel => (delta.dx, delta.dy),
            DeltaMode::Line => (delta.dx * PIXELS_PER_LINE, delta.dy * PIXELS_PER_LINE),
            DeltaMode::Page => (
                delta.dx * page_step(self.viewport.width),
                delta.dy * page_step(self.viewport.height),
            ),
        }
    }
}

fn page_step(page_size: f64) -> f64 {
    (page_size * 0.875).max(page_size - 40.0).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> ScrollBridge {
        ScrollBridge::new(3000.0, Size::new(1000.0, 800.0))
    }

    #[test]
    fn test_vertical_wheel_scrolls_horizontally() {
        let mut b = bridge();
        assert!(b.wheel(WheelDelta::pixels(0.0, 500.0), false, 0));
        assert_eq!(b.scroll_left(), 500.0);
        assert!(b.is_overriding());
    }

    #[test]
    fn test_line_and_page_modes() {
        let mut b = bridge();
        b.wheel(
            WheelDelta {
                dx: 0.0,
                dy: 3.0,
                mode: DeltaMode::Line,
            },
            false,
            0,
        );
        assert_eq!(b.scroll_left(), 120.0);

        b.wheel(
            WheelDelta {
                dx: 1.0,
                dy: 0.0,
                mode: DeltaMode::Page,
            },
            false,
            10,
        );
        assert_eq!(b.scroll_left(), 1080.0);
    }

    #[test]
    fn test_wheel_over_frame_is_not_captured() {
        let mut b = bridge();
        assert!(!b.wheel(WheelDelta::pixels(0.0, 300.0), true, 0));
        assert_eq!(b.scroll_left(), 0.0);
    }

    #[test]
    fn test_offset_is_clamped_and_override_expires() {
        let mut b = bridge();
        b.wheel(WheelDelta::pixels(0.0, 5000.0), false, 0);
        assert_eq!(b.scroll_left(), 2000.0);

        b.poll(400);
        assert!(b.is_overriding());
        b.poll(500);
        assert!(!b.is_overriding());
    }

    #[test]
    fn test_no_overflow() {
        let b = ScrollBridge::new(800.0, Size::new(1000.0, 800.0));
        assert!(!b.has_overflow());
        assert_eq!(b.scroll_left(), 0.0);
    }
}
