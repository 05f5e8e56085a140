//! Two-phase readiness detection for an embedded document.
//!
//! 1. Availability: the embedding navigated away from its blank placeholder.
//!    Races short-interval polling, the load signal and a timeout.
//! 2. Interactivity: the document can be synchronised with. Same-origin
//!    documents are polled for their ready state; cross-origin documents
//!    must post a `document-ready` handshake tagged with the view id.
//!
//! The detector owns no timers. The view drives it from its poll loop and
//! it checks the cancellation token before every probe.

use log::debug;

use crate::context::ContextId;
use crate::error::{TimeoutCode, ViewError};
use crate::frame::{BLANK_URL, Frame, FrameProbe, FrameSignal, ReadyState};
use crate::protocol::Message;
use crate::timer::{CancelToken, Millis, RetrySchedule};
use crate::viewport::{DocumentMeta, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorTimings {
    pub availability_interval: Millis,
    pub availability_timeout: Millis,
    pub interactivity_interval: Millis,
    pub interactivity_timeout: Millis,
}

impl Default for DetectorTimings {
    fn default() -> Self {
        Self {
            availability_interval: 30,
            availability_timeout: 30_000,
            interactivity_interval: 200,
            interactivity_timeout: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Pending,
    Available,
    Ready(DocumentMeta),
    Failed(ViewError),
}

#[derive(Debug)]
enum Phase {
    Availability(RetrySchedule),
    Interactivity(RetrySchedule),
    Finished,
}

#[derive(Debug)]
pub struct ReadinessDetector {
    context: ContextId,
    timings: DetectorTimings,
    cancel: CancelToken,
    phase: Phase,
    loaded: bool,
    handshake: Option<Message>,
}

impl ReadinessDetector {
    pub fn start(
        context: ContextId,
        timings: DetectorTimings,
        cancel: CancelToken,
        now: Millis,
    ) -> Self {
        debug!("view {context}: waiting for embedded window");
        Self {
            context,
            timings,
            cancel,
            phase: Phase::Availability(RetrySchedule::start(
                now,
                timings.availability_interval,
                timings.availability_timeout,
            )),
            loaded: false,
            handshake: None,
        }
    }

    /// Feed signals drained from the frame. Load and matching handshakes
    /// are remembered so that a burst arriving in one batch is not lost
    /// between phases.
    pub fn observe(&mut self, signal: &FrameSignal) {
        match signal {
            FrameSignal::Load => self.loaded = true,
            FrameSignal::Message(msg) if msg.is_handshake_for(self.context) => {
                self.handshake = Some(msg.clone());
            }
            _ => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    /// Advance detection. Call repeatedly until it returns `Pending` or a
    /// terminal result: availability and readiness may both settle in the
    /// same tick.
    pub fn poll(&mut self, frame: &dyn Frame, now: Millis) -> Progress {
        if self.is_finished() {
            return Progress::Pending;
        }
        if self.cancel.is_cancelled() {
            return self.finish(Progress::Failed(ViewError::PollCancelled(self.context)));
        }

        match &mut self.phase {
            Phase::Availability(retry) => {
                let mut available = self.loaded;
                if !available && retry.is_due(now) {
                    available = window_available(&frame.probe());
                    retry.reschedule(now);
                }

                if available {
                    debug!("view {}: embedded window available", self.context);
                    self.phase = Phase::Interactivity(RetrySchedule::start_delayed(
                        now,
                        self.timings.interactivity_interval,
                        self.timings.interactivity_timeout,
                    ));
                    Progress::Available
                } else if retry.is_expired(now) {
                    let elapsed_ms = retry.elapsed(now);
                    self.finish(Progress::Failed(ViewError::Timeout {
                        context: self.context,
                        code: TimeoutCode::WindowTimeout,
                        elapsed_ms,
                    }))
                } else {
                    Progress::Pending
                }
            }
            Phase::Interactivity(retry) => {
                if let Some(msg) = self.handshake.take() {
                    let meta = DocumentMeta {
                        url: None,
                        viewport: msg
                            .viewport_content()
                            .map(Viewport::parse)
                            .unwrap_or_default(),
                    };
                    return self.finish(Progress::Ready(meta));
                }

                if retry.is_due(now) {
                    retry.reschedule(now);
                    if let Some(meta) = interactive_document(&frame.probe()) {
                        return self.finish(Progress::Ready(meta));
                    }
                }

                if retry.is_expired(now) {
                    let elapsed_ms = retry.elapsed(now);
                    self.finish(Progress::Failed(ViewError::Timeout {
                        context: self.context,
                        code: TimeoutCode::DocumentTimeout,
                        elapsed_ms,
                    }))
                } else {
                    Progress::Pending
                }
            }
            Phase::Finished => Progress::Pending,
        }
    }

    fn finish(&mut self, progress: Progress) -> Progress {
        self.phase = Phase::Finished;
        progress
    }
}

fn window_available(probe: &FrameProbe) -> bool {
    matches!(probe, FrameProbe::Document { url, .. } if url != BLANK_URL)
}

fn interactive_document(probe: &FrameProbe) -> Option<DocumentMeta> {
    match probe {
        FrameProbe::Document {
            url,
            ready_state: ReadyState::Interactive | ReadyState::Complete,
            viewport,
        } if url != BLANK_URL => Some(DocumentMeta {
            url: Some(url.clone()),
            viewport: viewport.as_deref().map(Viewport::parse).unwrap_or_default(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameGeometry;
    use crate::viewport::ViewportWidth;

    struct ProbeFrame {
        probe: FrameProbe,
    }

    impl Frame for ProbeFrame {
        fn navigate(&mut self, _url: &str) {}
        fn attach(&mut self) {}
        fn detach(&mut self) {}
        fn is_attached(&self) -> bool {
            true
        }
        fn set_geometry(&mut self, _geometry: &FrameGeometry) {}
        fn probe(&self) -> FrameProbe {
            self.probe.clone()
        }
        fn drain_signals(&mut self) -> Vec<FrameSignal> {
            Vec::new()
        }
        fn post_message(&mut self, _message: &Message) {}
    }

    fn same_origin(state: ReadyState) -> ProbeFrame {
        ProbeFrame {
            probe: FrameProbe::Document {
                url: "http://localhost/page.html".into(),
                ready_state: state,
                viewport: Some("width=device-width".into()),
            },
        }
    }

    fn detector(now: Millis) -> ReadinessDetector {
        ReadinessDetector::start(
            ContextId::new(1),
            DetectorTimings::default(),
            CancelToken::new(),
            now,
        )
    }

    #[test]
    fn test_same_origin_goes_available_then_ready() {
        let frame = same_origin(ReadyState::Interactive);
        let mut det = detector(0);

        assert_eq!(det.poll(&frame, 0), Progress::Available);
        // interactivity polling starts one interval later
        assert_eq!(det.poll(&frame, 100), Progress::Pending);
        match det.poll(&frame, 200) {
            Progress::Ready(meta) => {
                assert_eq!(meta.viewport.width, Some(ViewportWidth::DeviceWidth));
            }
            other => panic!("expected ready, got {other:?}"),
        }
        assert!(det.is_finished());
    }

    #[test]
    fn test_loading_document_is_not_ready() {
        let frame = same_origin(ReadyState::Loading);
        let mut det = detector(0);
        assert_eq!(det.poll(&frame, 0), Progress::Available);
        assert_eq!(det.poll(&frame, 200), Progress::Pending);
        assert_eq!(det.poll(&frame, 400), Progress::Pending);
    }

    #[test]
    fn test_cross_origin_needs_load_and_handshake() {
        let frame = ProbeFrame {
            probe: FrameProbe::Inaccessible,
        };
        let mut det = detector(0);
        assert_eq!(det.poll(&frame, 0), Progress::Pending);
        assert_eq!(det.poll(&frame, 500), Progress::Pending);

        det.observe(&FrameSignal::Load);
        det.observe(&FrameSignal::Message(Message::document_ready(
            ContextId::new(1),
            Some("width=1024"),
        )));
        assert_eq!(det.poll(&frame, 510), Progress::Available);
        match det.poll(&frame, 510) {
            Progress::Ready(meta) => {
                assert_eq!(meta.viewport.width, Some(ViewportWidth::Pixels(1024.0)));
            }
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_handshake_is_ignored() {
        let frame = ProbeFrame {
            probe: FrameProbe::Inaccessible,
        };
        let mut det = detector(0);
        det.observe(&FrameSignal::Load);
        det.observe(&FrameSignal::Message(Message::document_ready(
            ContextId::new(9),
            None,
        )));
        assert_eq!(det.poll(&frame, 0), Progress::Available);
        assert_eq!(det.poll(&frame, 0), Progress::Pending);
    }

    #[test]
    fn test_availability_timeout() {
        let frame = ProbeFrame {
            probe: FrameProbe::Blank,
        };
        let mut det = detector(0);
        assert_eq!(det.poll(&frame, 30_000), Progress::Pending);
        match det.poll(&frame, 30_001) {
            Progress::Failed(ViewError::Timeout { code, .. }) => {
                assert_eq!(code, TimeoutCode::WindowTimeout)
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_interactivity_timeout_is_longer() {
        let frame = ProbeFrame {
            probe: FrameProbe::Inaccessible,
        };
        let mut det = detector(0);
        det.observe(&FrameSignal::Load);
        assert_eq!(det.poll(&frame, 10), Progress::Available);
        assert_eq!(det.poll(&frame, 30_011), Progress::Pending);
        match det.poll(&frame, 60_011) {
            Progress::Failed(ViewError::Timeout { code, .. }) => {
                assert_eq!(code, TimeoutCode::DocumentTimeout)
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_before_probe() {
        let cancel = CancelToken::new();
        let mut det =
            ReadinessDetector::start(ContextId::new(2), DetectorTimings::default(), cancel.clone(), 0);
        cancel.cancel();
        let frame = same_origin(ReadyState::Complete);
        assert_eq!(
            det.poll(&frame, 0),
            Progress::Failed(ViewError::PollCancelled(ContextId::new(2)))
        );
        assert_eq!(det.poll(&frame, 10), Progress::Pending);
    }
}
