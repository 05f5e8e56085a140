//! Seam between views and whatever actually renders the target page.
//!
//! A [`Frame`] is one isolated embedding (an iframe, a webview, a headless
//! tab). Frames never call back into the core: views poll them and drain
//! their signals from the main loop.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::context::ContextId;
use crate::protocol::Message;

/// URL of the placeholder document every fresh embedding starts with
pub const BLANK_URL: &str = "about:blank";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// What can be observed about the embedded document right now
#[derive(Debug, Clone, PartialEq)]
pub enum FrameProbe {
    /// Not attached to any container
    Detached,
    /// Still showing the initial placeholder
    Blank,
    /// Cross-origin content: the document exists but cannot be introspected
    Inaccessible,
    /// Same-origin content
    Document {
        url: String,
        ready_state: ReadyState,
        viewport: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameSignal {
    /// The embedded document finished loading
    Load,
    /// The embedded document is going away (navigation or reload)
    Unload,
    /// A message posted by the embedded document
    Message(Message),
}

/// Size and visual scale applied to the embedding
#[derive(Debug, Clone, PartialEq)]
pub struct FrameGeometry {
    pub width: String,
    pub height: String,
    pub scale: f64,
}

pub trait Frame {
    fn navigate(&mut self, url: &str);
    fn attach(&mut self);
    fn detach(&mut self);
    fn is_attached(&self) -> bool;
    fn set_geometry(&mut self, geometry: &FrameGeometry);
    fn probe(&self) -> FrameProbe;
    fn drain_signals(&mut self) -> Vec<FrameSignal>;
    fn post_message(&mut self, message: &Message);
}

/// Environment-level facts the geometry and animation code depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    /// Width of a native vertical scrollbar, in pixels
    pub scrollbar_width: u32,
    /// Whether visual transforms (scale/translate) are supported
    pub transforms: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            scrollbar_width: 0,
            transforms: true,
        }
    }
}

pub trait Platform {
    fn create_frame(&self, id: ContextId) -> Box<dyn Frame>;
    fn probe_capabilities(&self) -> Capabilities;
}

/// Lazily probes platform capabilities once and caches the answer.
///
/// One probe is created per preview and handed to the engines that need it.
pub struct CapabilityProbe {
    platform: Rc<dyn Platform>,
    cached: OnceCell<Capabilities>,
}

impl CapabilityProbe {
    pub fn new(platform: Rc<dyn Platform>) -> Self {
        Self {
            platform,
            cached: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Capabilities {
        *self
            .cached
            .get_or_init(|| self.platform.probe_capabilities())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animate::animations_enabled;
    use crate::sim::{SimClock, SimPlatform};

    #[test]
    fn test_capabilities_are_probed_once() {
        let sim = Rc::new(SimPlatform::new(SimClock::default()).with_capabilities(Capabilities {
            scrollbar_width: 15,
            transforms: false,
        }));
        let platform: Rc<dyn Platform> = sim.clone();
        let probe = CapabilityProbe::new(platform);
        assert_eq!(sim.probe_count(), 0);

        assert_eq!(probe.get().scrollbar_width, 15);
        assert!(!animations_enabled(false, probe.get()));
        assert_eq!(sim.probe_count(), 1);
    }
}
