//! View-mode state machine.
//!
//! `transition` is pure: it takes the machine and an event and returns the
//! next machine plus the effects to perform. [`crate::preview::Preview`]
//! interprets the effects and feeds completion events back in.

use crate::state::{DisplayMode, OptionsPatch, Snapshot, ViewSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing shown
    Initial,
    /// A layout is being built and animated in
    Show,
    /// Stable, watching for changes
    Idle,
    /// The layout is being torn down
    Hide,
    Destroyed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::Show => "show",
            Phase::Idle => "idle",
            Phase::Hide => "hide",
            Phase::Destroyed => "destroy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModeEvent {
    /// The application state projected to a new snapshot
    Changed(Snapshot),
    /// The layout finished its entrance
    Shown,
    /// The layout finished its teardown
    Hidden,
    Destroy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Build a layout for the snapshot and show it
    Mount(Snapshot),
    UpdateOptions(OptionsPatch),
    /// Incremental spec update of the live reel
    UpdateSpecs(Vec<ViewSpec>),
    /// Animate the layout out and drop it
    Unmount,
    /// Final teardown
    Teardown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeMachine {
    pub phase: Phase,
    /// Snapshot the current layout was built from (or last refused)
    pub current: Option<Snapshot>,
    /// Latest snapshot received
    pub pending: Option<Snapshot>,
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self {
            phase: Phase::Initial,
            current: None,
            pending: None,
        }
    }
}

pub fn transition(mut machine: ModeMachine, event: ModeEvent) -> (ModeMachine, Vec<Effect>) {
    let mut effects = Vec::new();
    if machine.phase == Phase::Destroyed {
        return (machine, effects);
    }

    match event {
        ModeEvent::Changed(snapshot) => {
            machine.pending = Some(snapshot);
            // changes during show/hide are picked up once those settle
            if matches!(machine.phase, Phase::Initial | Phase::Idle) {
                reconcile(&mut machine, &mut effects);
            }
        }
        ModeEvent::Shown => {
            if machine.phase == Phase::Show {
                machine.phase = Phase::Idle;
                reconcile(&mut machine, &mut effects);
            }
        }
        ModeEvent::Hidden => {
            if machine.phase == Phase::Hide {
                machine.phase = Phase::Initial;
                machine.current = None;
                reconcile(&mut machine, &mut effects);
            }
        }
        ModeEvent::Destroy => {
            if matches!(machine.phase, Phase::Show | Phase::Idle | Phase::Hide) {
                effects.push(Effect::Teardown);
            }
            machine.phase = Phase::Destroyed;
            machine.current = None;
            machine.pending = None;
        }
    }
    (machine, effects)
}

/// Compare the pending snapshot with the current one and decide what to do
fn reconcile(machine: &mut ModeMachine, effects: &mut Vec<Effect>) {
    let Some(next) = machine.pending.clone() else {
        return;
    };
    if machine.current.as_ref() == Some(&next) {
        return;
    }

    match machine.phase {
        Phase::Initial => {
            if next.can_render() {
                machine.phase = Phase::Show;
                effects.push(Effect::Mount(next.clone()));
            }
            machine.current = Some(next);
        }
        Phase::Idle => {
            let Some(current) = machine.current.as_ref() else {
                machine.phase = Phase::Hide;
                effects.push(Effect::Unmount);
                return;
            };
            let patch = OptionsPatch::diff(&current.options, &next.options);

            if current.same_content(&next) {
                effects.push(Effect::UpdateOptions(patch));
                machine.current = Some(next);
            } else if next.can_render()
                && next.mode == Some(DisplayMode::Breakpoints)
                && current.mode == next.mode
                && current.url == next.url
            {
                effects.push(Effect::UpdateSpecs(next.specs.clone()));
                if !patch.is_empty() {
                    effects.push(Effect::UpdateOptions(patch));
                }
                machine.current = Some(next);
            } else {
                machine.phase = Phase::Hide;
                effects.push(Effect::Unmount);
            }
        }
        Phase::Show | Phase::Hide | Phase::Destroyed => {}
    }
}
