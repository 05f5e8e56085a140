//! Device wall mode: device-sized views packed into rows on a pannable,
//! zoomable layer.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::control_layer::ControlLayer;
use super::mount_queue::MountQueue;
use super::packing::{Size, WallLayout, calculate_optimal_wall_size};
use super::pan_zoom::PanZoom;
use super::scroller::{DeltaMode, PIXELS_PER_LINE, WheelDelta};
use super::{EngineEnv, InputEvent, LayoutEngine, PlacedContext, Rect, hit_test};
use crate::animate::{Easing, Property, Sample, Track, Transition, Tween};
use crate::context::{ContextId, ContextOptions, ContextOptionsPatch, RenderContext};
use crate::deferred::Deferred;
use crate::state::{DisplayMode, Options, OptionsPatch, ViewSpec};
use crate::sync::PageSync;
use crate::timer::{Debounce, Millis};

const RESIZE_DEBOUNCE: Millis = 500;
const PERSPECTIVE: f64 = 1000.0;

#[derive(Debug)]
enum Stage {
    Created,
    Entering(Transition),
    Live,
    Leaving(Transition),
    Destroyed,
}

pub struct Wall {
    env: EngineEnv,
    options: Options,
    container: Size,
    scroll_width: f64,
    contexts: Vec<RenderContext>,
    item_sizes: Vec<Size>,
    layout: Option<WallLayout>,
    pan_zoom: Option<PanZoom>,
    control: ControlLayer,
    stage: Stage,
    mounts: MountQueue,
    sync: Option<PageSync>,
    resize: Debounce,
    hovered: Option<ContextId>,
    rng: StdRng,
    shown: Deferred<()>,
    destroyed: Deferred<()>,
}

impl Wall {
    pub fn new(env: EngineEnv, specs: &[ViewSpec], options: Options, container: Size) -> Self {
        let scroll_width = options
            .scroll_width
            .unwrap_or_else(|| f64::from(env.probe.get().scrollbar_width));
        let mut wall = Self {
            env,
            control: ControlLayer::new(options.activate_key),
            options,
            container,
            scroll_width,
            contexts: Vec::new(),
            item_sizes: Vec::new(),
            layout: None,
            pan_zoom: None,
            stage: Stage::Created,
            mounts: MountQueue::new(),
            sync: None,
            resize: Debounce::new(RESIZE_DEBOUNCE),
            hovered: None,
            rng: StdRng::from_entropy(),
            shown: Deferred::new(),
            destroyed: Deferred::new(),
        };
        let mut ordered: Vec<&ViewSpec> = specs.iter().collect();
        ordered.sort_by(|a, b| a.area().total_cmp(&b.area()));
        let create = wall.context_factory();
        wall.contexts = ordered.into_iter().map(create).collect();
        wall
    }

    /// Reproducible entrance and exit animations
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn context_factory(&self) -> impl Fn(&ViewSpec) -> RenderContext + use<> {
        let env = self.env.clone();
        let scroll_width = self.scroll_width;
        let margin = self.options.item_margin;
        move |spec| {
            env.create_context(ContextOptions {
                scroll_width: Some(scroll_width),
                margin,
                ..ContextOptions::from_spec(spec)
            })
        }
    }

    pub fn layout(&self) -> Option<&WallLayout> {
        self.layout.as_ref()
    }

    pub fn pan_zoom(&self) -> Option<&PanZoom> {
        self.pan_zoom.as_ref()
    }

    pub fn control(&self) -> &ControlLayer {
        &self.control
    }

    /// Repack for the current views and container, keeping the zoom level
    /// where it is still allowed
    fn relayout(&mut self) {
        let margin = self.options.item_margin;
        let container = self.container;
        self.item_sizes = self
            .contexts
            .iter()
            .map(|ctx| {
                let options = ctx.options();
                let height = if options.height.is_px() {
                    options.height.value
                } else {
                    container.height
                };
                Size::new(
                    options.width.value + margin * 2.0 + self.scroll_width,
                    height + margin * 2.0,
                )
            })
            .collect();

        self.layout = calculate_optimal_wall_size(&self.item_sizes, container);
        let Some(layout) = &self.layout else {
            self.pan_zoom = None;
            return;
        };
        let layer = Size::new(layout.width, layout.height);
        let min_scale = layout.min_zoom(container);
        debug!(
            "wall: {} rows, {}x{} at min scale {min_scale:.3}",
            layout.rows.len(),
            layout.width,
            layout.height
        );
        match self.pan_zoom.as_mut() {
            Some(pz) => pz.update(container, layer, min_scale, 1.0),
            None => self.pan_zoom = Some(PanZoom::new(container, layer, min_scale, 1.0)),
        }
    }

    fn transition(&mut self, reverse: bool, now: Millis) -> Transition {
        let animate = self.env.animations_enabled(self.options.disable_animations);
        let mut tracks = Vec::with_capacity(self.contexts.len() * 2);
        for ctx in &self.contexts {
            let duration = self.rng.gen_range(800..=1200);
            let delay = self.rng.gen_range(0..=200);
            let depth: f64 = self.rng.gen_range(1000.0..1800.0);
            let mut opacity = Tween::new(0.0, 1.0, duration, Easing::InOutExpo).delayed(delay);
            let mut scale = Tween::new(PERSPECTIVE / (PERSPECTIVE + depth), 1.0, duration, Easing::InOutExpo)
                .delayed(delay);
            if reverse {
                opacity = opacity.reversed();
                scale = scale.reversed();
            }
            tracks.push(Track {
                target: ctx.id(),
                property: Property::Opacity,
                tween: opacity,
            });
            tracks.push(Track {
                target: ctx.id(),
                property: Property::Scale,
                tween: scale,
            });
        }
        let mut transition = Transition::start(tracks, now, animate);
        let samples = transition.sample(now);
        self.apply_samples(&samples);
        transition
    }

    fn apply_samples(&mut self, samples: &[Sample]) {
        for sample in samples {
            if let Some(ctx) = self.contexts.iter_mut().find(|c| c.id() == sample.target) {
                sample.apply_to(ctx.element_mut());
            }
        }
    }

    fn go_live(&mut self, now: Millis) {
        debug!("wall: {} views shown", self.contexts.len());
        self.stage = Stage::Live;
        for ctx in self.contexts.iter_mut() {
            ctx.element_mut().visual_scale = 1.0;
        }
        self.mounts.extend(self.contexts.iter().map(|c| c.id()));
        self.sync = Some(PageSync::new(&mut self.contexts));
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

    fn wheel_dy(&self, delta: WheelDelta) -> f64 {
        match delta.mode {
            DeltaMode::Pixel => delta.dy,
            DeltaMode::Line => delta.dy * PIXELS_PER_LINE,
            DeltaMode::Page => delta.dy * self.container.height,
        }
    }
}

impl LayoutEngine for Wall {
    fn mode(&self) -> DisplayMode {
        DisplayMode::DeviceWall
    }

    fn show(&mut self, now: Millis) -> Deferred<()> {
        if !matches!(self.stage, Stage::Created) {
            return self.shown.clone();
        }
        self.relayout();
        let transition = self.transition(false, now);
        if transition.is_finished() {
            self.go_live(now);
        } else {
            self.stage = Stage::Entering(transition);
        }
        self.shown.clone()
    }

    fn update_options(&mut self, patch: &OptionsPatch) {
        patch.apply(&mut self.options);
        if let Some(key) = patch.activate_key {
            self.control = ControlLayer::new(key);
        }
        if let Some(scroll_width) = patch.scroll_width {
            self.scroll_width = scroll_width;
            for ctx in self.contexts.iter_mut() {
                ctx.update_options(ContextOptionsPatch {
                    max_viewport_width: None,
                    scroll_width: Some(scroll_width),
                });
            }
        }
        if let Some(margin) = patch.item_margin {
            for ctx in self.contexts.iter_mut() {
                ctx.element_mut().margin = margin;
            }
        }
        if (patch.item_margin.is_some() || patch.scroll_width.is_some())
            && !matches!(self.stage, Stage::Created)
        {
            self.relayout();
        }
    }

    fn destroy(&mut self, now: Millis) -> Deferred<()> {
        if matches!(self.stage, Stage::Leaving(_) | Stage::Destroyed) {
            return self.destroyed.clone();
        }
        if let Some(mut sync) = self.sync.take() {
            sync.destroy(&mut self.contexts);
        }
        self.control = ControlLayer::new(self.options.activate_key);
        if let Some(pz) = self.pan_zoom.as_mut() {
            pz.end_drag();
        }
        self.resize.cancel();
        self.mounts.clear();
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

        if self.resize.fire(now) {
            self.relayout();
        }
        for ctx in self.contexts.iter_mut() {
            ctx.poll(now);
        }
        self.mounts
            .poll(&mut self.contexts, self.env.platform.as_ref(), now);
        if let Some(sync) = self.sync.as_mut() {
            sync.poll(&mut self.contexts);
        }
    }

    fn handle_input(&mut self, event: InputEvent, now: Millis) -> bool {
        if !matches!(self.stage, Stage::Live) {
            return false;
        }
        match event {
            InputEvent::PointerMove { x, y } => {
                self.control.pointer_moved(x, y);
                if let Some(pz) = self.pan_zoom.as_mut().filter(|pz| pz.is_dragging()) {
                    pz.drag_to(x, y);
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
                let over_view = hit_test(&self.placements(), x, y).is_some();
                if over_view && !self.control.is_active() {
                    return false;
                }
                match self.pan_zoom.as_mut() {
                    Some(pz) => {
                        pz.begin_drag(x, y);
                        true
                    }
                    None => false,
                }
            }
            InputEvent::PointerUp { .. } => self.pan_zoom.as_mut().is_some_and(|pz| pz.end_drag()),
            InputEvent::DoubleClick { .. } => false,
            InputEvent::Wheel { x, y, delta } => {
                if self.control.is_active() {
                    let dy = self.wheel_dy(delta);
                    return match self.pan_zoom.as_mut() {
                        Some(pz) => self.control.scroll(dy, pz),
                        None => false,
                    };
                }
                if let Some(id) = hit_test(&self.placements(), x, y) {
                    if let Some(sync) = self.sync.as_mut() {
                        sync.promote(id, &mut self.contexts);
                    }
                }
                false
            }
            InputEvent::KeyDown(key) => match self.pan_zoom.as_ref() {
                Some(pz) => self.control.key_down(key, pz, now),
                None => false,
            },
            InputEvent::KeyUp(key) => self.control.key_up(key),
        }
    }

    fn resize_container(&mut self, size: Size, now: Millis) {
        self.container = size;
        self.resize.trigger(now);
    }

    fn placements(&self) -> Vec<PlacedContext> {
        let (Some(layout), Some(pz)) = (&self.layout, &self.pan_zoom) else {
            return Vec::new();
        };
        let margin = self.options.item_margin;
        layout
            .positions(&self.item_sizes)
            .into_iter()
            .zip(self.contexts.iter().zip(&self.item_sizes))
            .map(|((lx, ly), (ctx, size))| {
                let el = ctx.element();
                let width = (size.width - margin * 2.0) * pz.scale;
                let height = (size.height - margin * 2.0) * pz.scale;
                let (x, y) = pz.to_viewport(lx + margin, ly + margin);
                let visual = el.visual_scale;
                PlacedContext {
                    id: ctx.id(),
                    rect: Rect {
                        x: x + width * (1.0 - visual) / 2.0,
                        y: y + height * (1.0 - visual) / 2.0,
                        width: width * visual,
                        height: height * visual,
                    },
                    scale: ctx.scale() * pz.scale * visual,
                    opacity: el.opacity,
                }
            })
            .collect()
    }

    fn contexts(&self) -> &[RenderContext] {
        &self.contexts
    }

    fn sync(&self) -> Option<&PageSync> {
        self.sync.as_ref()
    }

    fn overlay_opacity(&self, now: Millis) -> Option<f64> {
        self.control.is_active().then(|| self.control.opacity(now))
    }
}
