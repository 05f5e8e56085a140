//! In-process embedding platform.
//!
//! Frames follow a scripted timeline (load delay, readiness delay,
//! cross-origin handshake) against a shared clock, apply relayed events to
//! a tiny document model and expose hooks to drive them from tests and the
//! terminal demo.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::ContextId;
use crate::frame::{
    BLANK_URL, Capabilities, Frame, FrameGeometry, FrameProbe, FrameSignal, Platform, ReadyState,
};
use crate::protocol::{APPLY, Message, SyncEvent};
use crate::timer::Millis;

#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<Millis>>);

impl SimClock {
    pub fn now(&self) -> Millis {
        self.0.get()
    }

    pub fn set(&self, now: Millis) {
        self.0.set(now);
    }

    pub fn advance(&self, ms: Millis) -> Millis {
        self.0.set(self.0.get() + ms);
        self.0.get()
    }
}

/// Timeline of one embedded document, relative to navigation start
#[derive(Debug, Clone, PartialEq)]
pub struct SimDocument {
    pub load_after: Millis,
    pub ready_after: Millis,
    pub cross_origin: bool,
    pub never_loads: bool,
    pub viewport: Option<String>,
    /// Scrollable range of the document, in pixels
    pub scroll_range: (f64, f64),
}

impl Default for SimDocument {
    fn default() -> Self {
        Self {
            load_after: 50,
            ready_after: 120,
            cross_origin: false,
            never_loads: false,
            viewport: Some("width=device-width, initial-scale=1".to_string()),
            scroll_range: (0.0, 2000.0),
        }
    }
}

impl SimDocument {
    pub fn cross_origin() -> Self {
        Self {
            cross_origin: true,
            ..Self::default()
        }
    }

    pub fn never_loads() -> Self {
        Self {
            never_loads: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct SimFrameState {
    id: ContextId,
    document: SimDocument,
    url: String,
    attached: bool,
    started_at: Option<Millis>,
    load_fired: bool,
    handshake_sent: bool,
    navigations: usize,
    attaches: usize,
    geometry: Option<FrameGeometry>,
    pending: Vec<FrameSignal>,
    received: Vec<Message>,
    scroll: (f64, f64),
    inputs: HashMap<String, String>,
    clicks: Vec<String>,
}

impl SimFrameState {
    fn restart(&mut self, now: Millis) {
        if self.started_at.is_some() {
            self.pending.push(FrameSignal::Unload);
        }
        self.started_at = Some(now);
        self.load_fired = false;
        self.handshake_sent = false;
        self.scroll = (0.0, 0.0);
    }

    fn since_start(&self, now: Millis) -> Option<Millis> {
        self.started_at.map(|t| now.saturating_sub(t))
    }

    fn is_loaded(&self, now: Millis) -> bool {
        !self.document.never_loads
            && self
                .since_start(now)
                .is_some_and(|t| t >= self.document.load_after)
    }

    fn advance(&mut self, now: Millis) {
        if !self.attached || !self.is_loaded(now) {
            return;
        }
        if !self.load_fired {
            self.load_fired = true;
            self.pending.push(FrameSignal::Load);
        }
        let interactive = self
            .since_start(now)
            .is_some_and(|t| t >= self.document.ready_after);
        if self.document.cross_origin && interactive && !self.handshake_sent {
            self.handshake_sent = true;
            self.pending.push(FrameSignal::Message(Message::document_ready(
                self.id,
                self.document.viewport.as_deref(),
            )));
        }
    }

    fn apply(&mut self, event: &SyncEvent, now: Millis) {
        match event {
            SyncEvent::Scroll { .. } => {
                let (max_left, max_top) = self.document.scroll_range;
                if let Some(pos) = event.scroll_to_pixels(max_left, max_top) {
                    self.scroll = pos;
                }
            }
            SyncEvent::Input { target, value } => {
                self.inputs.insert(target.clone(), value.clone());
            }
            SyncEvent::Click { target } => self.clicks.push(target.clone()),
            SyncEvent::Navigate { url } => {
                self.url = url.clone();
                self.navigations += 1;
                self.restart(now);
            }
            SyncEvent::Reload => self.restart(now),
        }
    }
}

/// Test and demo hooks into one simulated frame
#[derive(Clone)]
pub struct SimFrameHandle {
    state: Rc<RefCell<SimFrameState>>,
    clock: SimClock,
}

impl SimFrameHandle {
    /// Interaction performed by the user inside this document
    pub fn emit(&self, event: SyncEvent) {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        // the host applies its own navigation locally before reporting it
        if matches!(event, SyncEvent::Navigate { .. } | SyncEvent::Reload) {
            state.apply(&event, now);
        }
        state
            .pending
            .push(FrameSignal::Message(Message::event(&event)));
    }

    pub fn scroll_to(&self, left: f64, top: f64) {
        let (max_left, max_top) = self.state.borrow().document.scroll_range;
        self.state.borrow_mut().scroll = (left, top);
        self.emit(SyncEvent::scroll_from_pixels(left, top, max_left, max_top));
    }

    pub fn reload(&self) {
        let now = self.clock.now();
        self.state.borrow_mut().restart(now);
    }

    pub fn received(&self) -> Vec<Message> {
        self.state.borrow().received.clone()
    }

    pub fn applied_events(&self) -> Vec<SyncEvent> {
        self.state
            .borrow()
            .received
            .iter()
            .filter(|m| m.is_sync(APPLY))
            .filter_map(Message::sync_event)
            .collect()
    }

    pub fn scroll(&self) -> (f64, f64) {
        self.state.borrow().scroll
    }

    pub fn input(&self, target: &str) -> Option<String> {
        self.state.borrow().inputs.get(target).cloned()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn url(&self) -> String {
        self.state.borrow().url.clone()
    }

    pub fn navigation_count(&self) -> usize {
        self.state.borrow().navigations
    }

    pub fn attach_count(&self) -> usize {
        self.state.borrow().attaches
    }

    pub fn is_attached(&self) -> bool {
        self.state.borrow().attached
    }

    pub fn geometry(&self) -> Option<FrameGeometry> {
        self.state.borrow().geometry.clone()
    }
}

struct SimFrame {
    state: Rc<RefCell<SimFrameState>>,
    clock: SimClock,
}

impl Frame for SimFrame {
    fn navigate(&mut self, url: &str) {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.url = url.to_string();
        state.navigations += 1;
        if state.attached {
            state.restart(now);
        }
    }

    fn attach(&mut self) {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.attached = true;
        state.attaches += 1;
        if state.started_at.is_none() {
            state.started_at = Some(now);
        }
    }

    fn detach(&mut self) {
        self.state.borrow_mut().attached = false;
    }

    fn is_attached(&self) -> bool {
        self.state.borrow().attached
    }

    fn set_geometry(&mut self, geometry: &FrameGeometry) {
        self.state.borrow_mut().geometry = Some(geometry.clone());
    }

    fn probe(&self) -> FrameProbe {
        let now = self.clock.now();
        let state = self.state.borrow();
        if !state.attached {
            return FrameProbe::Detached;
        }
        if !state.is_loaded(now) {
            return FrameProbe::Blank;
        }
        if state.document.cross_origin {
            return FrameProbe::Inaccessible;
        }
        let interactive = state
            .since_start(now)
            .is_some_and(|t| t >= state.document.ready_after);
        FrameProbe::Document {
            url: if state.url.is_empty() {
                BLANK_URL.to_string()
            } else {
                state.url.clone()
            },
            ready_state: if interactive {
                ReadyState::Complete
            } else {
                ReadyState::Loading
            },
            viewport: state.document.viewport.clone(),
        }
    }

    fn drain_signals(&mut self) -> Vec<FrameSignal> {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.advance(now);
        std::mem::take(&mut state.pending)
    }

    fn post_message(&mut self, message: &Message) {
        let now = self.clock.now();
        let mut state = self.state.borrow_mut();
        state.received.push(message.clone());
        if message.is_sync(APPLY) {
            if let Some(event) = message.sync_event() {
                state.apply(&event, now);
            }
        }
    }
}

pub struct SimPlatform {
    clock: SimClock,
    capabilities: Capabilities,
    default_document: SimDocument,
    scripted: RefCell<HashMap<ContextId, SimDocument>>,
    frames: RefCell<Vec<(ContextId, Rc<RefCell<SimFrameState>>)>>,
    probes: Cell<usize>,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new(SimClock::default())
    }
}

impl SimPlatform {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            capabilities: Capabilities::default(),
            default_document: SimDocument::default(),
            scripted: RefCell::new(HashMap::new()),
            frames: RefCell::new(Vec::new()),
            probes: Cell::new(0),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Script the document of a view that has not created its frame yet
    pub fn script(&self, id: ContextId, document: SimDocument) {
        self.scripted.borrow_mut().insert(id, document);
    }

    pub fn frame(&self, id: ContextId) -> Option<SimFrameHandle> {
        self.frames
            .borrow()
            .iter()
            .rev()
            .find(|(fid, _)| *fid == id)
            .map(|(_, state)| SimFrameHandle {
                state: Rc::clone(state),
                clock: self.clock.clone(),
            })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.borrow().len()
    }

    /// How many times capabilities were probed
    pub fn probe_count(&self) -> usize {
        self.probes.get()
    }
}

impl Platform for SimPlatform {
    fn create_frame(&self, id: ContextId) -> Box<dyn Frame> {
        let document = self
            .scripted
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.default_document.clone());
        let state = Rc::new(RefCell::new(SimFrameState {
            id,
            document,
            url: String::new(),
            attached: false,
            started_at: None,
            load_fired: false,
            handshake_sent: false,
            navigations: 0,
            attaches: 0,
            geometry: None,
            pending: Vec::new(),
            received: Vec::new(),
            scroll: (0.0, 0.0),
            inputs: HashMap::new(),
            clicks: Vec::new(),
        }));
        self.frames.borrow_mut().push((id, Rc::clone(&state)));
        Box::new(SimFrame {
            state,
            clock: self.clock.clone(),
        })
    }

    fn probe_capabilities(&self) -> Capabilities {
        self.probes.set(self.probes.get() + 1);
        self.capabilities
    }
}
