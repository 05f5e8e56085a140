//! A view: one isolated embedding of the target page at a given size.
//!
//! Lifecycle: `Unmounted -> Mounting -> Available -> Ready`, back to
//! `Mounting` whenever the embedded document unloads, and `Destroyed` from
//! anywhere. The view owns its embedded frame and drives the readiness
//! detector from [`RenderContext::poll`].

pub mod geometry;
pub mod resize;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, warn};

use crate::deferred::Deferred;
use crate::dimension::Dimension;
use crate::emitter::{Emitter, ListenerId};
use crate::error::{ViewError, ViewResult};
use crate::frame::{CapabilityProbe, Frame, FrameSignal, Platform};
use crate::protocol::{EVENT, Message};
use crate::readiness::{DetectorTimings, Progress, ReadinessDetector};
use crate::state::ViewSpec;
use crate::timer::{CancelToken, Millis};
use crate::viewport::{DocumentMeta, Viewport};

use self::geometry::{ContextGeometry, GeometryInput};
use self::resize::ResizeHandle;

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unmounted,
    Mounting,
    Available,
    Ready,
    Destroyed,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Unmounted => "unmounted",
            Lifecycle::Mounting => "mounting",
            Lifecycle::Available => "available",
            Lifecycle::Ready => "ready",
            Lifecycle::Destroyed => "destroyed",
        }
    }
}

/// Notifications a view emits to its observers
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    Mount,
    Unmount,
    Available,
    DocumentReady(DocumentMeta),
    Unload,
    ResizeStart,
    ResizeEnd,
    Failed(ViewError),
    /// Interaction captured inside the embedded document
    Message(Message),
    Destroy,
}

impl ContextEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ContextEvent::Mount => "mount",
            ContextEvent::Unmount => "unmount",
            ContextEvent::Available => "available",
            ContextEvent::DocumentReady(_) => "ready",
            ContextEvent::Unload => "unload",
            ContextEvent::ResizeStart => "resize:start",
            ContextEvent::ResizeEnd => "resize:end",
            ContextEvent::Failed(_) => "error",
            ContextEvent::Message(_) => "message",
            ContextEvent::Destroy => "destroy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    /// Identity of the spec this view was created from
    pub key: String,
    pub label: Option<String>,
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: f64,
    pub max_width: f64,
    pub default_viewport_width: f64,
    pub use_page_viewport: bool,
    pub max_viewport_width: Option<f64>,
    /// Scroll gutter reserved next to the page; probed when unset
    pub scroll_width: Option<f64>,
    pub resize: bool,
    pub margin: f64,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            key: String::new(),
            label: None,
            width: Dimension::px(320.0),
            height: Dimension::new(100.0, "%"),
            min_width: 200.0,
            max_width: 4096.0,
            default_viewport_width: 980.0,
            use_page_viewport: false,
            max_viewport_width: None,
            scroll_width: None,
            resize: false,
            margin: 0.0,
        }
    }
}

impl ContextOptions {
    pub fn from_spec(spec: &ViewSpec) -> Self {
        Self {
            key: spec.key(),
            label: spec.label.clone().or_else(|| spec.title.clone()),
            width: spec.width.clone(),
            height: spec.height.clone(),
            use_page_viewport: spec.use_page_viewport,
            max_viewport_width: spec.max_viewport_width,
            resize: spec.resize,
            ..Self::default()
        }
    }
}

/// Option changes pushed to live views without remounting
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContextOptionsPatch {
    pub max_viewport_width: Option<f64>,
    pub scroll_width: Option<f64>,
}

/// What a view's container node currently looks like
#[derive(Debug, Clone, PartialEq)]
pub struct ContextElement {
    pub width: Dimension,
    pub height: Dimension,
    pub attached: bool,
    pub ready: bool,
    pub resizing: bool,
    pub size_label: String,
    pub margin: f64,
    /// Animation state: opacity and visual offset from the laid-out spot
    pub opacity: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub visual_scale: f64,
}

pub struct RenderContext {
    id: ContextId,
    url: String,
    options: ContextOptions,
    width: Dimension,
    height: Dimension,
    viewport: Viewport,
    scroll_width: f64,
    downscale: f64,
    lifecycle: Lifecycle,
    element: ContextElement,
    frame: Option<Box<dyn Frame>>,
    geometry: Option<ContextGeometry>,
    detector: Option<ReadinessDetector>,
    timings: DetectorTimings,
    cancel: CancelToken,
    available: Deferred<()>,
    ready: Deferred<DocumentMeta>,
    resize_handle: Option<ResizeHandle>,
    events: Emitter<ContextEvent>,
    last_error: Option<ViewError>,
    generation: u32,
}

impl RenderContext {
    pub fn new(
        url: impl Into<String>,
        options: ContextOptions,
        probe: &CapabilityProbe,
        timings: DetectorTimings,
    ) -> Self {
        let scroll_width = options
            .scroll_width
            .unwrap_or_else(|| f64::from(probe.get().scrollbar_width));
        let width = options.width.clamp_px(options.min_width, options.max_width);
        let height = options.height.clone();
        let resize_handle = options.resize.then(ResizeHandle::new);

        let mut ctx = Self {
            id: ContextId::next(),
            url: url.into(),
            element: ContextElement {
                width: width.clone(),
                height: height.clone(),
                attached: false,
                ready: false,
                resizing: false,
                size_label: String::new(),
                margin: options.margin,
                opacity: 1.0,
                translate_x: 0.0,
                translate_y: 0.0,
                visual_scale: 1.0,
            },
            options,
            width,
            height,
            viewport: Viewport::default(),
            scroll_width,
            downscale: 1.0,
            lifecycle: Lifecycle::Unmounted,
            frame: None,
            geometry: None,
            detector: None,
            timings,
            cancel: CancelToken::new(),
            available: Deferred::new(),
            ready: Deferred::new(),
            resize_handle,
            events: Emitter::new(),
            last_error: None,
            generation: 0,
        };
        ctx.refresh();
        ctx
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn key(&self) -> &str {
        &self.options.key
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    pub fn is_mounted(&self) -> bool {
        self.frame.as_ref().is_some_and(|f| f.is_attached())
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    pub fn element(&self) -> &ContextElement {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut ContextElement {
        &mut self.element
    }

    pub fn geometry(&self) -> Option<&ContextGeometry> {
        self.geometry.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn last_error(&self) -> Option<&ViewError> {
        self.last_error.as_ref()
    }

    /// Bumped every time the embedded document is replaced
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn available(&self) -> Deferred<()> {
        self.available.clone()
    }

    pub fn ready(&self) -> Deferred<DocumentMeta> {
        self.ready.clone()
    }

    pub fn width(&self) -> &Dimension {
        &self.width
    }

    pub fn height(&self) -> &Dimension {
        &self.height
    }

    pub fn downscale(&self) -> f64 {
        self.downscale
    }

    pub fn scale(&self) -> f64 {
        self.geometry.as_ref().map_or(1.0, |g| g.frame.scale)
    }

    /// Pixel widths are clamped to the configured bounds
    pub fn set_width(&mut self, width: Dimension) {
        let width = width.clamp_px(self.options.min_width, self.options.max_width);
        if width != self.width {
            self.width = width;
            self.refresh();
        }
    }

    pub fn set_height(&mut self, height: Dimension) {
        let height = height.with_value(height.value.max(0.0));
        if height != self.height {
            self.height = height;
            self.refresh();
        }
    }

    pub fn width_ratio(&self) -> f64 {
        geometry::width_ratio(
            &self.width,
            &self.viewport,
            self.options.use_page_viewport,
            self.options.default_viewport_width,
        )
    }

    pub fn real_width(&self) -> String {
        self.width.scaled_value(self.width_ratio())
    }

    pub fn real_height(&self) -> String {
        let scale = if self.options.use_page_viewport {
            self.width_ratio()
        } else {
            1.0
        };
        self.height.scaled_value(scale / self.downscale)
    }

    pub fn label(&self) -> String {
        match &self.options.label {
            Some(label) => label.clone(),
            None => format!("{}×{}", self.real_width(), self.real_height()),
        }
    }

    pub fn update_options(&mut self, patch: ContextOptionsPatch) {
        if let Some(max_vp) = patch.max_viewport_width {
            self.options.max_viewport_width = Some(max_vp);
        }
        if let Some(scroll_width) = patch.scroll_width {
            self.options.scroll_width = Some(scroll_width);
            self.scroll_width = scroll_width;
        }
        self.refresh();
    }

    /// Recompute element and frame geometry from the current size,
    /// viewport declaration and options
    pub fn refresh(&mut self) {
        if self.is_destroyed() {
            return;
        }
        let geometry = geometry::compute(&GeometryInput {
            width: &self.width,
            height: &self.height,
            scroll_width: self.scroll_width,
            max_viewport_width: self.options.max_viewport_width,
            width_ratio: self.width_ratio(),
            use_page_viewport: self.options.use_page_viewport,
        });

        self.downscale = geometry.downscale;
        self.element.width = geometry.element_width.clone();
        self.element.height = geometry.element_height.clone();
        self.element.size_label = size_label(&self.width, &self.height);
        if let Some(frame) = self.frame.as_mut() {
            frame.set_geometry(&geometry.frame);
        }
        self.geometry = Some(geometry);
    }

    /// Create (once) and attach the embedded frame, then start readiness
    /// detection. Calling it again while mounting or mounted returns the
    /// same readiness signal; after a detection failure it retries.
    pub fn mount(&mut self, platform: &dyn Platform, now: Millis) -> Deferred<DocumentMeta> {
        if self.is_destroyed() {
            let rejected = Deferred::new();
            rejected.reject(ViewError::PollCancelled(self.id));
            return rejected;
        }

        if self.frame.is_none() {
            let mut frame = platform.create_frame(self.id);
            if let Some(geometry) = &self.geometry {
                frame.set_geometry(&geometry.frame);
            }
            frame.navigate(&self.url);
            self.frame = Some(frame);
        }

        let attached_now = match self.frame.as_mut() {
            Some(frame) if !frame.is_attached() => {
                frame.attach();
                true
            }
            _ => false,
        };

        if attached_now {
            debug!("mount view {}", self.id);
            self.element.attached = true;
            self.start_detection(now);
            self.events.emit(&ContextEvent::Mount);
        } else if self.detector.is_none() && self.lifecycle != Lifecycle::Ready {
            debug!("view {}: retrying readiness detection", self.id);
            self.start_detection(now);
        }

        self.ready.clone()
    }

    fn start_detection(&mut self, now: Millis) {
        if self.available.is_settled() {
            self.available = Deferred::new();
        }
        if self.ready.is_settled() {
            self.ready = Deferred::new();
        }
        self.last_error = None;
        self.lifecycle = Lifecycle::Mounting;
        self.detector = Some(ReadinessDetector::start(
            self.id,
            self.timings,
            self.cancel.clone(),
            now,
        ));
    }

    /// Detach the frame from the container, keeping it (and its navigation
    /// state) for a later remount
    pub fn unmount(&mut self) -> bool {
        let Some(frame) = self.frame.as_mut() else {
            return false;
        };
        if !frame.is_attached() {
            return false;
        }
        frame.detach();
        self.element.attached = false;
        if self.detector.take().is_some() {
            self.reject_pending(ViewError::PollCancelled(self.id));
        }
        if !self.is_destroyed() {
            self.lifecycle = Lifecycle::Unmounted;
        }
        self.events.emit(&ContextEvent::Unmount);
        true
    }

    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.cancel.cancel();
        if self.detector.take().is_some() {
            self.reject_pending(ViewError::PollCancelled(self.id));
        }
        self.unmount();
        self.resize_handle = None;
        self.frame = None;
        self.element.attached = false;
        self.lifecycle = Lifecycle::Destroyed;
        debug!("view {} destroyed", self.id);
        self.events.emit(&ContextEvent::Destroy);
    }

    fn reject_pending(&mut self, err: ViewError) {
        self.available.reject(err.clone());
        self.ready.reject(err);
    }

    /// Drain frame signals and advance readiness detection
    pub fn poll(&mut self, now: Millis) {
        if self.is_destroyed() {
            return;
        }
        let signals = match self.frame.as_mut() {
            Some(frame) => frame.drain_signals(),
            None => return,
        };

        for signal in signals {
            match &signal {
                FrameSignal::Unload => self.handle_unload(now),
                FrameSignal::Message(msg) if msg.is_sync(EVENT) => {
                    self.events.emit(&ContextEvent::Message(msg.clone()));
                }
                _ => {}
            }
            if let Some(detector) = self.detector.as_mut() {
                detector.observe(&signal);
            }
        }

        self.drive_detector(now);
    }

    fn handle_unload(&mut self, now: Millis) {
        debug!("view {}: document unloaded", self.id);
        self.generation += 1;
        self.element.ready = false;
        self.events.emit(&ContextEvent::Unload);
        self.start_detection(now);
    }

    fn drive_detector(&mut self, now: Millis) {
        loop {
            let (Some(detector), Some(frame)) = (self.detector.as_mut(), self.frame.as_deref())
            else {
                return;
            };
            match detector.poll(frame, now) {
                Progress::Pending => return,
                Progress::Available => {
                    debug!("view {} became available", self.id);
                    self.lifecycle = Lifecycle::Available;
                    self.available.resolve(());
                    self.events.emit(&ContextEvent::Available);
                }
                Progress::Ready(meta) => {
                    debug!("view {} was loaded", self.id);
                    self.detector = None;
                    self.lifecycle = Lifecycle::Ready;
                    self.element.ready = true;
                    self.viewport = meta.viewport.clone();
                    self.refresh();
                    self.ready.resolve(meta.clone());
                    self.events.emit(&ContextEvent::DocumentReady(meta));
                    return;
                }
                Progress::Failed(err) => {
                    self.detector = None;
                    if !err.is_cancelled() {
                        warn!("view {}: {err}", self.id);
                    }
                    self.last_error = Some(err.clone());
                    self.reject_pending(err.clone());
                    self.events.emit(&ContextEvent::Failed(err));
                    return;
                }
            }
        }
    }

    /// Post a message into the embedded document
    pub fn deliver(&mut self, message: &Message) -> ViewResult<()> {
        match self.frame.as_mut() {
            Some(frame) => {
                frame.post_message(message);
                Ok(())
            }
            None => Err(ViewError::NotMounted(self.id)),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ContextEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }

    pub fn has_resize_handle(&self) -> bool {
        self.resize_handle.is_some()
    }

    pub fn is_resizing(&self) -> bool {
        self.resize_handle.as_ref().is_some_and(|h| h.is_dragging())
    }

    pub fn begin_resize(&mut self, pointer_x: f64) -> bool {
        let width = self.width.value;
        let Some(handle) = self.resize_handle.as_mut() else {
            return false;
        };
        handle.begin(pointer_x, width);
        self.element.resizing = true;
        self.events.emit(&ContextEvent::ResizeStart);
        true
    }

    pub fn drag_resize(&mut self, pointer_x: f64) {
        let target = self.resize_handle.as_ref().and_then(|h| h.track(pointer_x));
        if let Some(width) = target {
            self.set_width(self.width.with_value(width));
        }
    }

    pub fn end_resize(&mut self) {
        let ended = self.resize_handle.as_mut().is_some_and(|h| h.end());
        if ended {
            self.element.resizing = false;
            self.events.emit(&ContextEvent::ResizeEnd);
        }
    }

    /// Double-click on the resize handle restores the spec width
    pub fn reset_width(&mut self) {
        if self.resize_handle.is_some() {
            self.set_width(self.options.width.clone());
        }
    }
}

fn size_label(width: &Dimension, height: &Dimension) -> String {
    let part = |d: &Dimension| {
        if d.is_px() {
            d.value.to_string()
        } else {
            d.scaled_value(1.0)
        }
    };
    format!("{}×{}", part(width), part(height))
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::sim::{SimClock, SimPlatform};

    fn context(options: ContextOptions) -> (Rc<SimPlatform>, RenderContext) {
        let platform = Rc::new(SimPlatform::new(SimClock::default()));
        let shared: Rc<dyn Platform> = platform.clone();
        let probe = CapabilityProbe::new(shared);
        let ctx = RenderContext::new(
            "http://localhost/",
            options,
            &probe,
            DetectorTimings::default(),
        );
        (platform, ctx)
    }

    fn recorded(ctx: &mut RenderContext) -> Rc<RefCell<Vec<&'static str>>> {
        let names = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&names);
        ctx.subscribe(move |event| sink.borrow_mut().push(event.name()));
        names
    }

    #[test]
    fn test_width_is_clamped() {
        let (_, narrow) = context(ContextOptions {
            width: Dimension::px(50.0),
            ..ContextOptions::default()
        });
        assert_eq!(narrow.width().value, 200.0);

        let (_, mut wide) = context(ContextOptions {
            width: Dimension::px(5000.0),
            ..ContextOptions::default()
        });
        assert_eq!(wide.width().value, 4096.0);
        wide.set_width(Dimension::px(100.0));
        assert_eq!(wide.width().value, 200.0);
    }

    #[test]
    fn test_downscale_follows_max_viewport_width() {
        let (_, mut ctx) = context(ContextOptions {
            width: Dimension::px(1200.0),
            max_viewport_width: Some(600.0),
            ..ContextOptions::default()
        });
        assert_eq!(ctx.downscale(), 0.5);

        ctx.update_options(ContextOptionsPatch {
            max_viewport_width: Some(2400.0),
            scroll_width: None,
        });
        assert_eq!(ctx.downscale(), 1.0);
    }

    #[test]
    fn test_deliver_needs_a_frame() {
        let (_, mut ctx) = context(ContextOptions::default());
        let err = ctx
            .deliver(&Message::apply(&crate::protocol::SyncEvent::Reload))
            .unwrap_err();
        assert_eq!(err, ViewError::NotMounted(ctx.id()));
    }

    #[test]
    fn test_mount_emits_lifecycle_in_order() {
        let (platform, mut ctx) = context(ContextOptions::default());
        let names = recorded(&mut ctx);
        let clock = platform.clock().clone();

        let ready = ctx.mount(platform.as_ref(), 0);
        let again = ctx.mount(platform.as_ref(), 0);
        assert!(again.same_as(&ready));

        while !ready.is_settled() && clock.now() < 2000 {
            let now = clock.advance(10);
            ctx.poll(now);
        }
        assert!(ready.is_resolved());
        assert_eq!(*names.borrow(), vec!["mount", "available", "ready"]);
        assert!(ctx.element().ready);
        assert!(ctx.element().attached);
    }

    #[test]
    fn test_resize_drag_and_reset() {
        let (_, mut ctx) = context(ContextOptions {
            width: Dimension::px(480.0),
            resize: true,
            ..ContextOptions::default()
        });
        let names = recorded(&mut ctx);

        assert!(ctx.begin_resize(500.0));
        assert!(ctx.is_resizing());
        ctx.drag_resize(620.0);
        assert_eq!(ctx.width().value, 600.0);
        ctx.drag_resize(-1000.0);
        assert_eq!(ctx.width().value, 200.0);
        ctx.end_resize();
        ctx.end_resize();
        assert!(!ctx.is_resizing());

        ctx.reset_width();
        assert_eq!(ctx.width().value, 480.0);
        assert_eq!(*names.borrow(), vec!["resize:start", "resize:end"]);
    }

    #[test]
    fn test_views_without_handle_ignore_resize() {
        let (_, mut ctx) = context(ContextOptions::default());
        assert!(!ctx.has_resize_handle());
        assert!(!ctx.begin_resize(10.0));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (platform, mut ctx) = context(ContextOptions::default());
        let names = recorded(&mut ctx);
        let ready = ctx.mount(platform.as_ref(), 0);

        ctx.destroy();
        ctx.destroy();

        assert!(ready.error().is_some_and(|e| e.is_cancelled()));
        assert!(ctx.is_destroyed());
        assert!(!ctx.element().attached);
        assert_eq!(
            names.borrow().iter().filter(|n| **n == "destroy").count(),
            1
        );
    }
}
