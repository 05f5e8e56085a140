//! The preview facade: owns the active layout engine and interprets the
//! view-mode machine's effects.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info};

use crate::deferred::Deferred;
use crate::emitter::{Emitter, Inbox, ListenerId};
use crate::frame::{CapabilityProbe, Platform};
use crate::layout::packing::Size;
use crate::layout::reel::Reel;
use crate::layout::wall::Wall;
use crate::layout::{ContextNotice, EngineEnv, InputEvent, LayoutEngine};
use crate::mode::{Effect, ModeEvent, ModeMachine, Phase, transition};
use crate::readiness::DetectorTimings;
use crate::state::{AppState, DisplayMode, OptionsPatch, Snapshot};
use crate::timer::Millis;

/// Phase changes kept for inspection
const HISTORY_LIMIT: usize = 64;

/// Completion the machine is waiting for
#[derive(Debug)]
enum Waiting {
    Shown(Deferred<()>),
    Hidden(Deferred<()>),
}

pub struct Preview {
    platform: Rc<dyn Platform>,
    probe: Rc<CapabilityProbe>,
    timings: DetectorTimings,
    container: Option<Size>,
    machine: ModeMachine,
    engine: Option<Box<dyn LayoutEngine>>,
    waiting: Option<Waiting>,
    unmounted_snapshot: Option<Snapshot>,
    history: Vec<(Phase, Phase)>,
    inbox: Inbox<ContextNotice>,
    notices: Emitter<ContextNotice>,
    wall_seed: Option<u64>,
    destroyed: Deferred<()>,
}

impl Preview {
    pub fn new(platform: Rc<dyn Platform>, timings: DetectorTimings) -> Self {
        Self {
            probe: Rc::new(CapabilityProbe::new(Rc::clone(&platform))),
            platform,
            timings,
            container: None,
            machine: ModeMachine::default(),
            engine: None,
            waiting: None,
            unmounted_snapshot: None,
            history: Vec::new(),
            inbox: Rc::new(RefCell::new(Vec::new())),
            notices: Emitter::new(),
            wall_seed: None,
            destroyed: Deferred::new(),
        }
    }

    /// Seed the wall's animation randomness
    pub fn with_wall_seed(mut self, seed: u64) -> Self {
        self.wall_seed = Some(seed);
        self
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase
    }

    /// The most recent phase changes, oldest first
    pub fn history(&self) -> &[(Phase, Phase)] {
        &self.history
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.machine.current.as_ref()
    }

    pub fn engine(&self) -> Option<&dyn LayoutEngine> {
        self.engine.as_deref()
    }

    pub fn container(&self) -> Option<Size> {
        self.container
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ContextNotice) + 'static) -> ListenerId {
        self.notices.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notices.unsubscribe(id)
    }

    /// Attach to a container of the given size and render whatever state
    /// was received so far
    pub fn mount(&mut self, container: Size, now: Millis) -> Deferred<()> {
        self.container = Some(container);
        if let Some(snapshot) = self.unmounted_snapshot.take() {
            self.dispatch(ModeEvent::Changed(snapshot), now);
        }
        self.settled()
    }

    pub fn update(&mut self, state: &AppState, now: Millis) -> Deferred<()> {
        self.update_snapshot(Snapshot::project(state), now)
    }

    pub fn update_snapshot(&mut self, snapshot: Snapshot, now: Millis) -> Deferred<()> {
        if self.container.is_none() {
            self.unmounted_snapshot = Some(snapshot);
            return Deferred::resolved(());
        }
        self.dispatch(ModeEvent::Changed(snapshot), now);
        self.settled()
    }

    /// Options-only change of the latest snapshot
    pub fn update_options(&mut self, patch: OptionsPatch, now: Millis) -> Deferred<()> {
        let base = self
            .machine
            .pending
            .clone()
            .or_else(|| self.unmounted_snapshot.clone());
        match base {
            Some(mut snapshot) => {
                patch.apply(&mut snapshot.options);
                self.update_snapshot(snapshot, now)
            }
            None => Deferred::resolved(()),
        }
    }

    pub fn destroy(&mut self, now: Millis) -> Deferred<()> {
        if self.machine.phase != Phase::Destroyed {
            self.dispatch(ModeEvent::Destroy, now);
            if self.engine.is_none() {
                self.destroyed.resolve(());
            }
        }
        self.destroyed.clone()
    }

    pub fn poll(&mut self, now: Millis) {
        if let Some(engine) = self.engine.as_mut() {
            engine.poll(now);
        }

        match self.waiting.take() {
            Some(Waiting::Shown(done)) if done.is_settled() => {
                self.dispatch(ModeEvent::Shown, now);
            }
            Some(Waiting::Hidden(done)) if done.is_settled() => {
                self.engine = None;
                if self.machine.phase == Phase::Destroyed {
                    self.destroyed.resolve(());
                } else {
                    self.dispatch(ModeEvent::Hidden, now);
                }
            }
            other => self.waiting = other,
        }

        let notices: Vec<_> = self.inbox.borrow_mut().drain(..).collect();
        for notice in &notices {
            debug!("view {}: {}", notice.context, notice.event.name());
            self.notices.emit(notice);
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Millis) -> bool {
        match self.engine.as_mut() {
            Some(engine) if self.machine.phase != Phase::Destroyed => {
                engine.handle_input(event, now)
            }
            _ => false,
        }
    }

    pub fn resize(&mut self, container: Size, now: Millis) {
        self.container = Some(container);
        if let Some(engine) = self.engine.as_mut() {
            engine.resize_container(container, now);
        }
    }

    /// Completion of the operation in flight, or an already resolved signal
    fn settled(&self) -> Deferred<()> {
        match &self.waiting {
            Some(Waiting::Shown(done)) | Some(Waiting::Hidden(done)) => done.clone(),
            None => Deferred::resolved(()),
        }
    }

    /// Feed an event to the machine and run effects until nothing settles
    /// synchronously any more
    fn dispatch(&mut self, event: ModeEvent, now: Millis) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let from = self.machine.phase;
            let (machine, effects) = transition(std::mem::take(&mut self.machine), event);
            self.machine = machine;
            if from != self.machine.phase {
                info!("preview: {} -> {}", from.as_str(), self.machine.phase.as_str());
                if self.history.len() == HISTORY_LIMIT {
                    self.history.remove(0);
                }
                self.history.push((from, self.machine.phase));
            }
            for effect in effects {
                if let Some(follow_up) = self.run(effect, now) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    fn run(&mut self, effect: Effect, now: Millis) -> Option<ModeEvent> {
        match effect {
            Effect::Mount(snapshot) => {
                let mut engine = self.create_engine(&snapshot)?;
                let shown = engine.show(now);
                self.engine = Some(engine);
                if shown.is_settled() {
                    return Some(ModeEvent::Shown);
                }
                self.waiting = Some(Waiting::Shown(shown));
                None
            }
            Effect::UpdateOptions(patch) => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.update_options(&patch);
                }
                None
            }
            Effect::UpdateSpecs(specs) => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.update(&specs, now);
                }
                None
            }
            Effect::Unmount => {
                let Some(engine) = self.engine.as_mut() else {
                    return Some(ModeEvent::Hidden);
                };
                let hidden = engine.destroy(now);
                if hidden.is_settled() {
                    self.engine = None;
                    return Some(ModeEvent::Hidden);
                }
                self.waiting = Some(Waiting::Hidden(hidden));
                None
            }
            Effect::Teardown => {
                if let Some(engine) = self.engine.as_mut() {
                    let done = engine.destroy(now);
                    if done.is_settled() {
                        self.engine = None;
                        self.destroyed.resolve(());
                    } else {
                        self.waiting = Some(Waiting::Hidden(done));
                    }
                }
                None
            }
        }
    }

    fn create_engine(&self, snapshot: &Snapshot) -> Option<Box<dyn LayoutEngine>> {
        let container = self.container?;
        let env = EngineEnv {
            url: snapshot.url.clone(),
            platform: Rc::clone(&self.platform),
            probe: Rc::clone(&self.probe),
            timings: self.timings,
            notices: Rc::clone(&self.inbox),
        };
        let options = snapshot.options.clone();
        match snapshot.mode? {
            DisplayMode::Breakpoints => Some(Box::new(Reel::new(
                env,
                &snapshot.specs,
                options,
                container,
            ))),
            DisplayMode::DeviceWall => {
                let wall = Wall::new(env, &snapshot.specs, options, container);
                Some(Box::new(match self.wall_seed {
                    Some(seed) => wall.with_seed(seed),
                    None => wall,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimPlatform};
    use crate::state::ViewSpec;

    fn preview() -> Preview {
        let platform: Rc<dyn Platform> = Rc::new(SimPlatform::new(SimClock::default()));
        Preview::new(platform, DetectorTimings::default())
    }

    fn state(disable_animations: bool) -> AppState {
        let mut state = AppState {
            page_url: "http://localhost/".into(),
            breakpoints: vec![ViewSpec::with_width(320.0), ViewSpec::with_width(768.0)],
            ..AppState::default()
        };
        state.options.disable_animations = disable_animations;
        state
    }

    #[test]
    fn test_without_animations_show_settles_synchronously() {
        let mut preview = preview();
        preview.mount(Size::new(1200.0, 800.0), 0);
        let done = preview.update(&state(true), 0);

        assert!(done.is_resolved());
        assert_eq!(preview.phase(), Phase::Idle);
        assert_eq!(preview.engine().map(|e| e.contexts().len()), Some(2));
    }

    #[test]
    fn test_update_options_before_any_state_is_a_no_op() {
        let mut preview = preview();
        let done = preview.update_options(
            OptionsPatch {
                item_margin: Some(4.0),
                ..OptionsPatch::default()
            },
            0,
        );
        assert!(done.is_resolved());
        assert_eq!(preview.phase(), Phase::Initial);
        assert!(preview.snapshot().is_none());
    }

    #[test]
    fn test_unrenderable_state_renders_nothing() {
        let mut preview = preview();
        preview.mount(Size::new(1200.0, 800.0), 0);
        let mut empty = state(false);
        empty.page_url.clear();
        preview.update(&empty, 0);

        assert_eq!(preview.phase(), Phase::Initial);
        assert!(preview.engine().is_none());
        assert!(preview.history().is_empty());
    }

    #[test]
    fn test_history_keeps_only_recent_changes() {
        let mut preview = preview();
        preview.mount(Size::new(1200.0, 800.0), 0);
        let mut state = state(true);
        for i in 0..40 {
            state.page_url = format!("http://localhost/{i}");
            assert!(preview.update(&state, i).is_resolved());
        }

        assert_eq!(preview.phase(), Phase::Idle);
        assert_eq!(preview.history().len(), HISTORY_LIMIT);
        assert_eq!(preview.history().last(), Some(&(Phase::Show, Phase::Idle)));
    }

    #[test]
    fn test_destroy_without_layout_resolves_immediately() {
        let mut preview = preview();
        assert!(preview.destroy(0).is_resolved());
        assert_eq!(preview.phase(), Phase::Destroyed);
        assert!(!preview.handle_input(InputEvent::KeyDown(16), 0));
    }
}
