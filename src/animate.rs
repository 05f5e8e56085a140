//! Entrance and exit tweens for views inside a layout.

use crate::context::{ContextElement, ContextId};
use crate::deferred::Deferred;
use crate::frame::Capabilities;
use crate::timer::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    OutCubic,
    InOutCubic,
    InOutExpo,
}

impl Easing {
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::OutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::InOutExpo => {
                if t == 0.0 || t == 1.0 {
                    t
                } else if t < 0.5 {
                    2f64.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2f64.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Opacity,
    TranslateX,
    TranslateY,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    pub delay: Millis,
    pub duration: Millis,
    pub easing: Easing,
}

impl Tween {
    pub fn new(from: f64, to: f64, duration: Millis, easing: Easing) -> Self {
        Self {
            from,
            to,
            delay: 0,
            duration,
            easing,
        }
    }

    pub fn delayed(mut self, delay: Millis) -> Self {
        self.delay = delay;
        self
    }

    pub fn reversed(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
            ..*self
        }
    }

    /// Value `elapsed` ms after the transition started
    pub fn value_at(&self, elapsed: Millis) -> f64 {
        if elapsed < self.delay {
            return self.from;
        }
        let t = if self.duration == 0 {
            1.0
        } else {
            (elapsed - self.delay) as f64 / self.duration as f64
        };
        self.from + (self.to - self.from) * self.easing.apply(t)
    }

    pub fn end(&self) -> Millis {
        self.delay + self.duration
    }
}

/// One animated property of one view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Track {
    pub target: ContextId,
    pub property: Property,
    pub tween: Tween,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub target: ContextId,
    pub property: Property,
    pub value: f64,
}

impl Sample {
    pub fn apply_to(&self, element: &mut ContextElement) {
        match self.property {
            Property::Opacity => element.opacity = self.value,
            Property::TranslateX => element.translate_x = self.value,
            Property::TranslateY => element.translate_y = self.value,
            Property::Scale => element.visual_scale = self.value,
        }
    }
}

/// Whether a layout should animate at all
pub fn animations_enabled(disabled_by_user: bool, capabilities: Capabilities) -> bool {
    !disabled_by_user && capabilities.transforms
}

/// A group of tracks completing together
#[derive(Debug)]
pub struct Transition {
    tracks: Vec<Track>,
    started_at: Millis,
    done: Deferred<()>,
}

impl Transition {
    /// When `animate` is false every track jumps to its end value on the
    /// first sample and the completion signal is already resolved.
    pub fn start(mut tracks: Vec<Track>, now: Millis, animate: bool) -> Self {
        let done = Deferred::new();
        if !animate {
            for track in tracks.iter_mut() {
                track.tween.delay = 0;
                track.tween.duration = 0;
            }
            done.resolve(());
        } else if tracks.is_empty() {
            done.resolve(());
        }
        Self {
            tracks,
            started_at: now,
            done,
        }
    }

    pub fn completion(&self) -> Deferred<()> {
        self.done.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_settled()
    }

    pub fn duration(&self) -> Millis {
        self.tracks.iter().map(|t| t.tween.end()).max().unwrap_or(0)
    }

    /// Current values of every track; resolves completion once all ended
    pub fn sample(&mut self, now: Millis) -> Vec<Sample> {
        let elapsed = now.saturating_sub(self.started_at);
        let samples = self
            .tracks
            .iter()
            .map(|t| Sample {
                target: t.target,
                property: t.property,
                value: t.tween.value_at(elapsed),
            })
            .collect();
        if elapsed >= self.duration() {
            self.done.resolve(());
        }
        samples
    }
}
