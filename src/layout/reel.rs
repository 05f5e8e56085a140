//! Breakpoints mode: every view in a single horizontally scrollable row,
//! full container height, sorted by width.

use log::debug;

use super::mount_queue::MountQueue;
use super::packing::Size;
use super::scroller::ScrollBridge;
use super::{EngineEnv, InputEvent, LayoutEngine, PlacedContext, Rect, hit_test, reconcile};
use crate::animate::{Easing, Property, Track, Transition, Tween};
use crate::context::{ContextId, ContextOptions, ContextOptionsPatch, RenderContext};
use crate::deferred::Deferred;
use crate::state::{DisplayMode, Options, OptionsPatch, ViewSpec};
use crate::sync::PageSync;
use crate::timer::Millis;

pub const DEFAULT_MAX_VIEWPORT_WIDTH: f64 = 600.0;

const ENTER_DURATION: Millis = 900;
const ENTER_STAGGER: Millis = 70;
const SLIDE_DISTANCE: f64 = 500.0;
const RESIZE_HANDLE_WIDTH: f64 = 12.0;

/// Viewport cap for reel views, `[200, 2500]`
pub fn max_viewport_width(options: &Options) -> f64 {
    clamp_viewport_width(options.max_viewport_width)
}

fn clamp_viewport_width(value: Option<f64>) -> f64 {
    value
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_MAX_VIEWPORT_WIDTH)
        .clamp(200.0, 2500.0)
}

#[derive(Debug)]
enum Stage {
    Created,
    Entering(Transition),
    Live,
    Leaving(Transition),
    Destroyed,
}

pub struct Reel {
    env: EngineEnv,
    options: Options,
    max_viewport_width: f64,
    container: Size,
    contexts: Vec<RenderContext>,
    stage: Stage,
    mounts: MountQueue,
    sync: Option<PageSync>,
    scroller: Option<ScrollBridge>,
    resizing: Option<ContextId>,
    hovered: Option<ContextId>,
    shown: Deferred<()>,
    destroyed: Deferred<()>,
}

impl Reel {
    pub fn new(env: EngineEnv, specs: &[ViewSpec], options: Options, container: Size) -> Self {
        let mut reel = Self {
            env,
            max_viewport_width: max_viewport_width(&options),
            options,
            container,
            contexts: Vec::new(),
            stage: Stage::Created,
            mounts: MountQueue::new(),
            sync: None,
            scroller: None,
            resizing: None,
            hovered: None,
            shown: Deferred::new(),
            destroyed: Deferred::new(),
        };
        let create = reel.context_factory();
        reel.contexts = specs.iter().map(create).collect();
        reel.sort();
        reel
    }

    fn context_factory(&self) -> impl Fn(&ViewSpec) -> RenderContext + use<> {
        let env = self.env.clone();
        let max_viewport_width = self.max_viewport_width;
        let scroll_width = self.options.scroll_width;
        move |spec| {
            env.create_context(ContextOptions {
                max_viewport_width: Some(
                    spec.max_viewport_width
                        .map_or(max_viewport_width, |v| clamp_viewport_width(Some(v))),
                ),
                scroll_width,
                ..ContextOptions::from_spec(spec)
            })
        }
    }

    /// Order by spec width; a drag-resized view keeps its slot
    fn sort(&mut self) {
        self.contexts
            .sort_by(|a, b| a.options().width.value.total_cmp(&b.options().width.value));
    }

    pub fn scroll_left(&self) -> f64 {
        self.scroller.as_ref().map_or(0.0, ScrollBridge::scroll_left)
    }

    pub fn scroller(&self) -> Option<&ScrollBridge> {
        self.scroller.as_ref()
    }

    fn item_size(&self, ctx: &RenderContext) -> Size {
        let el = ctx.element();
        let width = if el.width.is_px() {
            el.width.value
        } else {
            self.container.width * el.width.value / 100.0
        };
        let height = if el.height.is_px() {
            el.height.value
        } else {
            self.container.height * el.height.value / 100.0
        };
        Size::new(width, height)
    }

    fn content_width(&self) -> f64 {
        self.contexts.iter().map(|c| self.item_size(c).width).sum()
    }

    /// Layout positions without animation offsets
    fn slots(&self) -> Vec<(ContextId, Rect)> {
        let mut x = -self.scroll_left();
        self.contexts
            .iter()
            .map(|ctx| {
                let size = self.item_size(ctx);
                let rect = Rect {
                    x,
                    y: 0.0,
                    width: size.width,
                    height: size.height,
                };
                x += size.width;
                (ctx.id(), rect)
            })
            .collect()
    }

    fn visible_ids(&self) -> Vec<ContextId> {
        self.slots()
            .into_iter()
            .filter(|(_, rect)| rect.intersects_x(0.0, self.container.width))
            .map(|(id, _)| id)
            .collect()
    }

    fn transition(&mut self, reverse: bool, now: Millis) -> Transition {
        let mut visible = self.visible_ids();
        if reverse {
            visible.reverse();
        }
        let animate = self.env.animations_enabled(self.options.disable_animations);

        let mut tracks = Vec::with_capacity(visible.len() * 2);
        for (i, id) in visible.into_iter().enumerate() {
            let delay = ENTER_STAGGER * i as Millis;
            let mut opacity = Tween::new(0.0, 1.0, ENTER_DURATION, Easing::InOutCubic).delayed(delay);
            let mut slide =
                Tween::new(SLIDE_DISTANCE, 0.0, ENTER_DURATION, Easing::InOutCubic).delayed(delay);
            if reverse {
                opacity = opacity.reversed();
                slide = slide.reversed();
            }
            tracks.push(Track {
                target: id,
                property: Property::Opacity,
                tween: opacity,
            });
            tracks.push(Track {
                target: id,
                property: Property::TranslateX,
                tween: slide,
            });
        }

        let mut transition = Transition::start(tracks, now, animate);
        let samples = transition.sample(now);
        self.apply_samples(&samples);
        transition
    }

    fn apply_samples(&mut self, samples: &[crate::animate::Sample]) {
        for sample in samples {
            if let Some(ctx) = self.contexts.iter_mut().find(|c| c.id() == sample.target) {
                sample.apply_to(ctx.element_mut());
            }
        }
    }

    fn go_live(&mut self, now: Millis) {
        debug!("reel: {} views shown", self.contexts.len());
        self.stage = Stage::Live;
        self.mounts.extend(self.contexts.iter().map(|c| c.id()));
        self.sync = Some(PageSync::new(&mut self.contexts));
        if !self.options.no_scroll_override {
            self.scroller = Some(ScrollBridge::new(self.content_width(), self.container));
        }
        self.shown.resolve(());
        self.mounts
            .poll(&mut self.contexts, self.env.platform.as_ref(), now);
    }

    fn finish_destroy(&mut self) {
        for ctx in self.contexts.iter_mut() {
            ctx.destroy();
        }
        self.contexts.clear();
        self.stage = Stage::Destroyed;
        self.destroyed.resolve(());
    }

    fn refresh_scroller(&mut self) {
        let content_width = self.content_width();
        let container = self.container;
        if let Some(scroller) = self.scroller.as_mut() {
            scroller.update(content_width, container);
        }
    }

    fn resize_handle_at(&self, x: f64, y: f64) -> Option<ContextId> {
        self.placements()
            .into_iter()
            .find(|p| {
                p.rect.contains(x, y) && x >= p.rect.right() - RESIZE_HANDLE_WIDTH
            })
            .map(|p| p.id)
            .filter(|id| {
                self.contexts
                    .iter()
                    .any(|c| c.id() == *id && c.has_resize_handle())
            })
    }

    fn context_mut(&mut self, id: ContextId) -> Option<&mut RenderContext> {
        self.contexts.iter_mut().find(|c| c.id() == id)
    }
}

impl LayoutEngine for Reel {
    fn mode(&self) -> DisplayMode {
        DisplayMode::Breakpoints
    }

    fn show(&mut self, now: Millis) -> Deferred<()> {
        if !matches!(self.stage, Stage::Created) {
            return self.shown.clone();
        }
        let transition = self.transition(false, now);
        if transition.is_finished() {
            self.go_live(now);
        } else {
            self.stage = Stage::Entering(transition);
        }
        self.shown.clone()
    }

    fn update(&mut self, specs: &[ViewSpec], now: Millis) {
        if matches!(self.stage, Stage::Leaving(_) | Stage::Destroyed) {
            return;
        }
        let create = self.context_factory();
        let added = reconcile(&mut self.contexts, specs, self.sync.as_mut(), create);
        self.sort();
        debug!("reel: update added {} views", added.len());

        if matches!(self.stage, Stage::Live) {
            self.mounts.extend(added);
            self.mounts
                .poll(&mut self.contexts, self.env.platform.as_ref(), now);
        }
        self.refresh_scroller();
    }

    fn update_options(&mut self, patch: &OptionsPatch) {
        patch.apply(&mut self.options);
        let mut context_patch = ContextOptionsPatch {
            max_viewport_width: None,
            scroll_width: patch.scroll_width,
        };
        if patch.max_viewport_width.is_some() {
            self.max_viewport_width = max_viewport_width(&self.options);
            context_patch.max_viewport_width = Some(self.max_viewport_width);
        }
        if context_patch != ContextOptionsPatch::default() {
            for ctx in self.contexts.iter_mut() {
                ctx.update_options(context_patch);
            }
        }

        if let Some(disabled) = patch.no_scroll_override {
            if matches!(self.stage, Stage::Live) {
                self.scroller = (!disabled)
                    .then(|| ScrollBridge::new(self.content_width(), self.container));
            }
        }
        self.refresh_scroller();
    }

    fn destroy(&mut self, now: Millis) -> Deferred<()> {
        if matches!(self.stage, Stage::Leaving(_) | Stage::Destroyed) {
            return self.destroyed.clone();
        }
        if let Some(mut sync) = self.sync.take() {
            sync.destroy(&mut self.contexts);
        }
        self.scroller = None;
        self.mounts.clear();
        self.resizing = None;
        self.shown.resolve(());

        let transition = self.transition(true, now);
        if transition.is_finished() {
            self.finish_destroy();
        } else {
            self.stage = Stage::Leaving(transition);
        }
        self.destroyed.clone()
    }

    fn poll(&mut self, now: Millis) {
        match &mut self.stage {
            Stage::Entering(transition) => {
                let samples = transition.sample(now);
                let finished = transition.is_finished();
                self.apply_samples(&samples);
                if finished {
                    self.go_live(now);
                }
            }
            Stage::Leaving(transition) => {
                let samples = transition.sample(now);
                let finished = transition.is_finished();
                self.apply_samples(&samples);
                if finished {
                    self.finish_destroy();
                }
                return;
            }
            Stage::Destroyed => return,
            Stage::Created | Stage::Live => {}
        }

        for ctx in self.contexts.iter_mut() {
            ctx.poll(now);
        }
        self.mounts
            .poll(&mut self.contexts, self.env.platform.as_ref(), now);
        if let Some(sync) = self.sync.as_mut() {
            sync.poll(&mut self.contexts);
        }
        if let Some(scroller) = self.scroller.as_mut() {
            scroller.poll(now);
        }
    }

    fn handle_input(&mut self, event: InputEvent, now: Millis) -> bool {
        if !matches!(self.stage, Stage::Live) {
            return false;
        }
        match event {
            InputEvent::PointerMove { x, y } => {
                if let Some(id) = self.resizing {
                    if let Some(ctx) = self.context_mut(id) {
                        ctx.drag_resize(x);
                    }
                    self.refresh_scroller();
                    return true;
                }
                let hit = hit_test(&self.placements(), x, y);
                if hit.is_some() && hit != self.hovered {
                    if let (Some(id), Some(sync)) = (hit, self.sync.as_mut()) {
                        sync.promote(id, &mut self.contexts);
                    }
                }
                self.hovered = hit;
                hit.is_some()
            }
            InputEvent::PointerDown { x, y } => {
                let Some(id) = self.resize_handle_at(x, y) else {
                    return false;
                };
                let started = self.context_mut(id).is_some_and(|ctx| ctx.begin_resize(x));
                if started {
                    self.resizing = Some(id);
                }
                started
            }
            InputEvent::PointerUp { .. } => match self.resizing.take() {
                Some(id) => {
                    if let Some(ctx) = self.context_mut(id) {
                        ctx.end_resize();
                    }
                    true
                }
                None => false,
            },
            InputEvent::DoubleClick { x, y } => {
                let Some(id) = self.resize_handle_at(x, y) else {
                    return false;
                };
                if let Some(ctx) = self.context_mut(id) {
                    ctx.reset_width();
                }
                self.refresh_scroller();
                true
            }
            InputEvent::Wheel { x, y, delta } => {
                // an override in flight keeps the wheel even when it drifts over a view
                if let Some(scroller) = self.scroller.as_mut().filter(|s| s.is_overriding()) {
                    return scroller.wheel(delta, false, now);
                }
                if let Some(id) = hit_test(&self.placements(), x, y) {
                    if let Some(sync) = self.sync.as_mut() {
                        sync.promote(id, &mut self.contexts);
                    }
                    return false;
                }
                match self.scroller.as_mut() {
                    Some(scroller) => scroller.wheel(delta, false, now),
                    None => false,
                }
            }
            InputEvent::KeyDown(_) | InputEvent::KeyUp(_) => false,
        }
    }

    fn resize_container(&mut self, size: Size, _now: Millis) {
        self.container = size;
        for ctx in self.contexts.iter_mut() {
            ctx.refresh();
        }
        self.refresh_scroller();
    }

    fn placements(&self) -> Vec<PlacedContext> {
        self.slots()
            .into_iter()
            .filter_map(|(id, rect)| {
                let ctx = self.contexts.iter().find(|c| c.id() == id)?;
                let el = ctx.element();
                Some(PlacedContext {
                    id,
                    rect: Rect {
                        x: rect.x + el.translate_x,
                        ..rect
                    },
                    scale: ctx.scale(),
                    opacity: el.opacity,
                })
            })
            .collect()
    }

    fn contexts(&self) -> &[RenderContext] {
        &self.contexts
    }

    fn sync(&self) -> Option<&PageSync> {
        self.sync.as_ref()
    }
}
