use std::cell::RefCell;
use std::rc::Rc;

use viewreel::context::{ContextEvent, ContextOptions, Lifecycle, RenderContext};
use viewreel::error::{TimeoutCode, ViewError};
use viewreel::frame::{CapabilityProbe, Platform};
use viewreel::readiness::DetectorTimings;
use viewreel::sim::{SimClock, SimDocument, SimPlatform};

struct Harness {
    clock: SimClock,
    platform: Rc<SimPlatform>,
    ctx: RenderContext,
}

impl Harness {
    fn new(timings: DetectorTimings, document: SimDocument) -> Self {
        let clock = SimClock::default();
        let platform = Rc::new(SimPlatform::new(clock.clone()));
        let shared: Rc<dyn Platform> = platform.clone();
        let probe = CapabilityProbe::new(shared);
        let ctx = RenderContext::new(
            "http://localhost:3000/",
            ContextOptions::default(),
            &probe,
            timings,
        );
        platform.script(ctx.id(), document);
        Self {
            clock,
            platform,
            ctx,
        }
    }

    fn run_for(&mut self, ms: u64) {
        let until = self.clock.now() + ms;
        while self.clock.now() < until {
            let now = self.clock.advance(10);
            self.ctx.poll(now);
        }
    }
}

fn fast_timeouts() -> DetectorTimings {
    DetectorTimings {
        availability_timeout: 100,
        interactivity_timeout: 300,
        ..DetectorTimings::default()
    }
}

#[test]
fn test_blank_frame_times_out_with_window_timeout() {
    let mut h = Harness::new(fast_timeouts(), SimDocument::never_loads());
    let failures = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&failures);
    h.ctx.subscribe(move |event| {
        if let ContextEvent::Failed(err) = event {
            sink.borrow_mut().push(err.clone());
        }
    });

    let ready = h.ctx.mount(h.platform.as_ref(), 0);
    h.run_for(500);

    let err = ready.error().unwrap();
    assert!(matches!(
        err,
        ViewError::Timeout {
            code: TimeoutCode::WindowTimeout,
            ..
        }
    ));
    assert!(err.is_recoverable());
    assert_eq!(failures.borrow().len(), 1);
    assert_eq!(h.ctx.last_error(), Some(&err));
    assert!(!h.ctx.is_ready());
}

#[test]
fn test_remount_after_document_timeout_retries() {
    let slow = SimDocument {
        ready_after: 2000,
        ..SimDocument::default()
    };
    let mut h = Harness::new(fast_timeouts(), slow);

    let first = h.ctx.mount(h.platform.as_ref(), 0);
    h.run_for(1000);
    assert!(matches!(
        first.error(),
        Some(ViewError::Timeout {
            code: TimeoutCode::DocumentTimeout,
            ..
        })
    ));
    assert!(h.ctx.available().is_resolved());

    h.run_for(1500);
    let now = h.clock.now();
    let second = h.ctx.mount(h.platform.as_ref(), now);
    assert!(!second.same_as(&first));
    h.run_for(1000);

    assert!(second.is_resolved());
    assert!(h.ctx.is_ready());
    assert_eq!(h.ctx.last_error(), None);
    let frame = h.platform.frame(h.ctx.id()).unwrap();
    assert_eq!(frame.attach_count(), 1);
    assert_eq!(frame.navigation_count(), 1);
}

#[test]
fn test_cross_origin_document_ready_after_handshake() {
    let mut h = Harness::new(DetectorTimings::default(), SimDocument::cross_origin());
    let ready = h.ctx.mount(h.platform.as_ref(), 0);

    h.run_for(100);
    assert!(h.ctx.available().is_resolved());
    assert!(!ready.is_settled());

    h.run_for(400);
    let meta = ready.value().unwrap();
    // cross-origin documents only report their viewport declaration
    assert_eq!(meta.url, None);
    assert_eq!(h.ctx.lifecycle(), Lifecycle::Ready);
}

#[test]
fn test_unmount_during_detection_cancels_quietly() {
    let mut h = Harness::new(DetectorTimings::default(), SimDocument::default());
    let ready = h.ctx.mount(h.platform.as_ref(), 0);
    h.run_for(20);

    assert!(h.ctx.unmount());
    assert!(ready.error().unwrap().is_cancelled());
    assert_eq!(h.ctx.lifecycle(), Lifecycle::Unmounted);

    let now = h.clock.now();
    let again = h.ctx.mount(h.platform.as_ref(), now);
    h.run_for(1000);
    assert!(again.is_resolved());
    assert_eq!(h.platform.frame(h.ctx.id()).unwrap().attach_count(), 2);
}

#[test]
fn test_destroyed_view_refuses_to_mount() {
    let mut h = Harness::new(DetectorTimings::default(), SimDocument::default());
    h.ctx.mount(h.platform.as_ref(), 0);
    h.ctx.destroy();
    h.ctx.destroy();

    let ready = h.ctx.mount(h.platform.as_ref(), 10);
    assert!(ready.error().unwrap().is_cancelled());
    assert!(h.ctx.is_destroyed());
}
