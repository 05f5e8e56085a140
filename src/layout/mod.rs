//! Layout engines: the reel (one scrollable row of breakpoint views) and
//! the wall (packed device views with pan and zoom).

pub mod control_layer;
pub mod mount_queue;
pub mod packing;
pub mod pan_zoom;
pub mod reel;
pub mod scroller;
pub mod wall;

use std::rc::Rc;

use crate::context::{ContextEvent, ContextId, ContextOptions, RenderContext};
use crate::deferred::Deferred;
use crate::emitter::Inbox;
use crate::frame::{CapabilityProbe, Platform};
use crate::readiness::DetectorTimings;
use crate::state::{DisplayMode, OptionsPatch, ViewSpec};
use crate::sync::PageSync;
use crate::timer::Millis;

use self::packing::Size;
use self::scroller::WheelDelta;

/// Screen rectangle in container coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn intersects_x(&self, left: f64, right: f64) -> bool {
        self.right().min(right) > self.x.max(left)
    }
}

/// Where a view currently appears
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedContext {
    pub id: ContextId,
    pub rect: Rect,
    pub scale: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove { x: f64, y: f64 },
    PointerDown { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    Wheel { x: f64, y: f64, delta: WheelDelta },
    KeyDown(u32),
    KeyUp(u32),
}

/// Lifecycle notification of one view, forwarded to preview observers
#[derive(Debug, Clone, PartialEq)]
pub struct ContextNotice {
    pub context: ContextId,
    pub event: ContextEvent,
}

/// What every engine needs to create and mount views
#[derive(Clone)]
pub struct EngineEnv {
    pub url: String,
    pub platform: Rc<dyn Platform>,
    pub probe: Rc<CapabilityProbe>,
    pub timings: DetectorTimings,
    pub notices: Inbox<ContextNotice>,
}

impl EngineEnv {
    /// Create a view whose notable lifecycle events are forwarded to
    /// `notices`
    pub fn create_context(&self, options: ContextOptions) -> RenderContext {
        let mut ctx = RenderContext::new(self.url.clone(), options, &self.probe, self.timings);
        let id = ctx.id();
        let notices = Rc::clone(&self.notices);
        ctx.subscribe(move |event| {
            if matches!(
                event,
                ContextEvent::DocumentReady(_)
                    | ContextEvent::Unload
                    | ContextEvent::ResizeStart
                    | ContextEvent::ResizeEnd
                    | ContextEvent::Destroy
            ) {
                notices.borrow_mut().push(ContextNotice {
                    context: id,
                    event: event.clone(),
                });
            }
        });
        ctx
    }

    pub fn animations_enabled(&self, disabled_by_user: bool) -> bool {
        crate::animate::animations_enabled(disabled_by_user, self.probe.get())
    }
}

pub trait LayoutEngine {
    fn mode(&self) -> DisplayMode;

    /// Insert the views and run the entrance animation; views mount one by
    /// one once it completes
    fn show(&mut self, now: Millis) -> Deferred<()>;

    /// Replace the spec list, keeping views whose spec is still present.
    /// Engines that are rebuilt on every spec change keep the default.
    fn update(&mut self, _specs: &[ViewSpec], _now: Millis) {}

    fn update_options(&mut self, patch: &OptionsPatch);

    /// Tear down sync and input handling, run the exit animation and
    /// destroy every view
    fn destroy(&mut self, now: Millis) -> Deferred<()>;

    fn poll(&mut self, now: Millis);

    /// Returns true when the event was consumed
    fn handle_input(&mut self, event: InputEvent, now: Millis) -> bool;

    fn resize_container(&mut self, size: Size, now: Millis);

    fn placements(&self) -> Vec<PlacedContext>;

    fn contexts(&self) -> &[RenderContext];

    fn sync(&self) -> Option<&PageSync>;

    /// Opacity of the zoom overlay while it is shown
    fn overlay_opacity(&self, _now: Millis) -> Option<f64> {
        None
    }
}

/// Destroy views whose key is gone and create views for new keys. Returns
/// the ids of the created views.
pub(crate) fn reconcile(
    contexts: &mut Vec<RenderContext>,
    specs: &[ViewSpec],
    sync: Option<&mut PageSync>,
    mut create: impl FnMut(&ViewSpec) -> RenderContext,
) -> Vec<ContextId> {
    let keys: Vec<String> = specs.iter().map(ViewSpec::key).collect();
    let mut sync = sync;

    let mut kept = Vec::with_capacity(contexts.len());
    for mut ctx in contexts.drain(..) {
        if keys.iter().any(|k| k == ctx.key()) {
            kept.push(ctx);
        } else {
            if let Some(sync) = sync.as_deref_mut() {
                sync.forget(&mut ctx);
            }
            ctx.destroy();
        }
    }

    let mut added = Vec::new();
    for spec in specs {
        let key = spec.key();
        if kept.iter().any(|c| c.key() == key) {
            continue;
        }
        let mut ctx = create(spec);
        if let Some(sync) = sync.as_deref_mut() {
            sync.watch(&mut ctx);
        }
        added.push(ctx.id());
        kept.push(ctx);
    }

    *contexts = kept;
    added
}

pub(crate) fn hit_test(placements: &[PlacedContext], x: f64, y: f64) -> Option<ContextId> {
    placements
        .iter()
        .find(|p| p.rect.contains(x, y))
        .map(|p| p.id)
}
