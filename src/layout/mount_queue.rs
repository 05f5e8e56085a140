//! Mounts views one after another: the next view starts loading once the
//! previous one is ready or has failed.

use std::collections::VecDeque;

use crate::context::{ContextId, RenderContext};
use crate::deferred::Deferred;
use crate::frame::Platform;
use crate::timer::Millis;
use crate::viewport::DocumentMeta;

#[derive(Debug, Default)]
pub struct MountQueue {
    pending: VecDeque<ContextId>,
    current: Option<(ContextId, Deferred<DocumentMeta>)>,
}

impl MountQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: ContextId) {
        if !self.pending.contains(&id) && self.current.as_ref().map(|(c, _)| *c) != Some(id) {
            self.pending.push_back(id);
        }
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = ContextId>) {
        for id in ids {
            self.push(id);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    /// View currently loading
    pub fn current(&self) -> Option<ContextId> {
        self.current.as_ref().map(|(id, _)| *id)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    pub fn poll(&mut self, contexts: &mut [RenderContext], platform: &dyn Platform, now: Millis) {
        loop {
            if let Some((_, ready)) = &self.current {
                if !ready.is_settled() {
                    return;
                }
                self.current = None;
            }
            let Some(id) = self.pending.pop_front() else {
                return;
            };
            let Some(ctx) = contexts
                .iter_mut()
                .find(|c| c.id() == id && !c.is_destroyed())
            else {
                continue;
            };
            let ready = ctx.mount(platform, now);
            self.current = Some((id, ready));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::context::ContextOptions;
    use crate::frame::CapabilityProbe;
    use crate::readiness::DetectorTimings;
    use crate::sim::{SimClock, SimPlatform};

    fn setup(n: usize) -> (SimClock, Rc<SimPlatform>, Vec<RenderContext>) {
        let clock = SimClock::default();
        let platform = Rc::new(SimPlatform::new(clock.clone()));
        let shared: Rc<dyn Platform> = platform.clone();
        let probe = CapabilityProbe::new(shared);
        let contexts = (0..n)
            .map(|_| {
                RenderContext::new(
                    "http://localhost/",
                    ContextOptions::default(),
                    &probe,
                    DetectorTimings::default(),
                )
            })
            .collect();
        (clock, platform, contexts)
    }

    #[test]
    fn test_views_mount_one_at_a_time() {
        let (clock, platform, mut contexts) = setup(3);
        let mut queue = MountQueue::new();
        queue.extend(contexts.iter().map(|c| c.id()));
        queue.push(contexts[0].id());

        queue.poll(&mut contexts, platform.as_ref(), 0);
        assert_eq!(queue.current(), Some(contexts[0].id()));
        assert_eq!(platform.frame_count(), 1);

        while !queue.is_idle() && clock.now() < 5000 {
            let now = clock.advance(10);
            for ctx in contexts.iter_mut() {
                ctx.poll(now);
            }
            queue.poll(&mut contexts, platform.as_ref(), now);
            let mounting = contexts.iter().filter(|c| c.is_mounted() && !c.is_ready()).count();
            assert!(mounting <= 1);
        }
        assert!(queue.is_idle());
        assert!(contexts.iter().all(RenderContext::is_ready));
        assert_eq!(platform.frame_count(), 3);
    }

    #[test]
    fn test_destroyed_views_are_skipped() {
        let (_, platform, mut contexts) = setup(2);
        contexts[0].destroy();
        let mut queue = MountQueue::new();
        queue.extend(contexts.iter().map(|c| c.id()));

        queue.poll(&mut contexts, platform.as_ref(), 0);
        assert_eq!(queue.current(), Some(contexts[1].id()));

        queue.clear();
        assert!(queue.is_idle());
    }
}
