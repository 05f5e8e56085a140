//! Element and embedded-frame sizing for a view.
//!
//! The element is what takes space in the layout. The frame inside it may
//! be larger (page viewport emulation, capped viewport width) and is then
//! visually scaled down so the page still renders at full resolution.

use crate::dimension::Dimension;
use crate::frame::FrameGeometry;
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInput<'a> {
    pub width: &'a Dimension,
    pub height: &'a Dimension,
    pub scroll_width: f64,
    pub max_viewport_width: Option<f64>,
    pub width_ratio: f64,
    pub use_page_viewport: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextGeometry {
    pub element_width: Dimension,
    pub element_height: Dimension,
    pub frame: FrameGeometry,
    pub downscale: f64,
}

/// How much wider than the view the document lays out, never below 1
pub fn width_ratio(
    width: &Dimension,
    viewport: &Viewport,
    use_page_viewport: bool,
    default_viewport_width: f64,
) -> f64 {
    if !use_page_viewport || !width.is_px() || width.value <= 0.0 {
        return 1.0;
    }
    let layout_width = viewport.layout_width(width.value, default_viewport_width);
    layout_width.max(width.value) / width.value
}

pub fn compute(input: &GeometryInput<'_>) -> ContextGeometry {
    let mut element_width = input.width.clone();
    if input.width.is_px() && input.scroll_width > 0.0 {
        element_width = element_width.with_value(element_width.value + input.scroll_width);
    }

    let mut downscale = 1.0;
    if let Some(max_vp) = input.max_viewport_width {
        if element_width.is_px() && element_width.value > 0.0 {
            downscale = (max_vp / element_width.value).min(1.0);
            element_width = element_width.with_value(element_width.value.min(max_vp));
        }
    }

    let mut frame_width = input.width.scaled_value(input.width_ratio);
    if input.width.is_px() {
        let real = (input.width.value * input.width_ratio).round();
        frame_width = format!("{}px", real + input.scroll_width);
    }

    let height_ratio = if input.use_page_viewport {
        input.width_ratio
    } else {
        1.0
    };
    let frame_height = compensated(input.height, height_ratio / downscale);

    ContextGeometry {
        element_width,
        element_height: input.height.clone(),
        frame: FrameGeometry {
            width: frame_width,
            height: frame_height,
            scale: downscale / input.width_ratio,
        },
        downscale,
    }
}

/// Frame height before the visual scale is applied. Percentages are
/// proportional to the holder, so they grow by the same factor as pixels
/// to fill it once scaled down.
fn compensated(height: &Dimension, factor: f64) -> String {
    if height.unit == "%" {
        format!("{}%", (height.value * factor).round())
    } else {
        height.scaled_value(factor)
    }
}
