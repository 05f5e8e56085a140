//! `<meta name="viewport">` declarations of embedded documents

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ViewportWidth {
    Pixels(f64),
    /// `width=device-width`: the document lays out at the view's own width
    DeviceWidth,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: Option<ViewportWidth>,
    pub initial_scale: Option<f64>,
}

impl Viewport {
    /// Parse a `content` attribute such as `width=device-width, initial-scale=1`.
    /// Unknown keys and malformed values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut viewport = Viewport::default();
        for pair in content.split([',', ';']) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "width" => {
                    viewport.width = if value.eq_ignore_ascii_case("device-width") {
                        Some(ViewportWidth::DeviceWidth)
                    } else {
                        value
                            .trim_end_matches("px")
                            .parse::<f64>()
                            .ok()
                            .filter(|w| *w > 0.0)
                            .map(ViewportWidth::Pixels)
                    };
                }
                "initial-scale" => viewport.initial_scale = value.parse().ok(),
                _ => {}
            }
        }
        viewport
    }

    /// Layout width the document will use inside a view `view_width` wide
    pub fn layout_width(&self, view_width: f64, default_width: f64) -> f64 {
        match self.width {
            Some(ViewportWidth::Pixels(w)) => w,
            Some(ViewportWidth::DeviceWidth) => view_width,
            None => default_width,
        }
    }
}

/// What the readiness detector learned about a document that became
/// interactive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMeta {
    pub url: Option<String>,
    pub viewport: Viewport,
}
