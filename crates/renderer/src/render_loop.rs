use tracing::trace;

use crate::runtime::{FramePacer, FrameScheduler, FrameToken};

/// Lifecycle of one visualization's frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Surface, program or geometry still missing.
    Uninitialized,
    /// Everything exists; no frame scheduled yet.
    Ready,
    /// A frame callback is pending or executing.
    Running,
    /// Terminal. A fresh instance is needed to render again.
    Stopped,
}

/// Self-rescheduling frame loop with a single cancel token.
///
/// At most one frame request is outstanding at any time. A callback is only
/// honoured when it carries that exact token, so a callback arriving after
/// cancellation is ignored instead of touching released resources.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    state: LoopState,
    pending: Option<FrameToken>,
    pacer: FramePacer,
    visible: bool,
}

impl RenderLoop {
    pub fn new(max_fps: Option<f32>) -> Self {
        Self {
            state: LoopState::Uninitialized,
            pending: None,
            pacer: FramePacer::new(max_fps),
            visible: true,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn mark_ready(&mut self) {
        if self.state == LoopState::Uninitialized {
            self.state = LoopState::Ready;
        }
    }

    /// Moves `Ready` to `Running` and requests the first frame.
    pub fn start<S: FrameScheduler>(&mut self, scheduler: &mut S) -> bool {
        if self.state != LoopState::Ready {
            return false;
        }
        self.state = LoopState::Running;
        self.schedule_next(scheduler);
        true
    }

    /// Claims a frame callback. Returns `false` for stale or foreign tokens.
    pub fn accept(&mut self, token: FrameToken) -> bool {
        if self.state != LoopState::Running || self.pending != Some(token) {
            trace!(?token, state = ?self.state, "ignoring frame callback");
            return false;
        }
        self.pending = None;
        true
    }

    /// Requests the next frame unless one is already outstanding.
    pub fn schedule_next<S: FrameScheduler>(&mut self, scheduler: &mut S) {
        if self.state == LoopState::Running && self.pending.is_none() {
            self.pending = Some(scheduler.request_frame());
        }
    }

    /// Cancels the outstanding frame request, if any.
    pub fn cancel<S: FrameScheduler>(&mut self, scheduler: &mut S) {
        if let Some(token) = self.pending.take() {
            scheduler.cancel_frame(token);
        }
    }

    /// Enters `Stopped`. A loop that never became ready stays `Uninitialized`.
    pub fn stop(&mut self) {
        if matches!(self.state, LoopState::Ready | LoopState::Running) {
            self.state = LoopState::Stopped;
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether a tick at `now` should clear and draw.
    pub fn should_draw(&self, now: f64) -> bool {
        self.visible && self.pacer.ready(now)
    }

    pub fn mark_drawn(&mut self, now: f64) {
        self.pacer.mark_drawn(now);
    }

    /// Seconds until the frame cap allows the next draw, if capped.
    pub fn time_until_draw(&self, now: f64) -> Option<f64> {
        self.pacer.remaining(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ManualScheduler;
    use std::time::Duration;

    #[test]
    fn start_requires_ready() {
        let mut scheduler = ManualScheduler::new();
        let mut render_loop = RenderLoop::new(None);
        assert!(!render_loop.start(&mut scheduler));
        render_loop.mark_ready();
        assert!(render_loop.start(&mut scheduler));
        assert!(!render_loop.start(&mut scheduler));
        assert_eq!(scheduler.requested(), 1);
        assert_eq!(render_loop.state(), LoopState::Running);
    }

    #[test]
    fn only_one_request_is_outstanding() {
        let mut scheduler = ManualScheduler::new();
        let mut render_loop = RenderLoop::new(None);
        render_loop.mark_ready();
        render_loop.start(&mut scheduler);
        render_loop.schedule_next(&mut scheduler);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn cancelled_token_is_rejected() {
        let mut scheduler = ManualScheduler::new();
        let mut render_loop = RenderLoop::new(None);
        render_loop.mark_ready();
        render_loop.start(&mut scheduler);
        let token = render_loop.pending_frame().expect("pending");
        render_loop.cancel(&mut scheduler);
        render_loop.stop();
        assert!(scheduler.advance(Duration::from_secs(1)).is_empty());
        assert!(!render_loop.accept(token));
        assert_eq!(render_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn stop_before_ready_keeps_uninitialized() {
        let mut render_loop = RenderLoop::new(None);
        render_loop.stop();
        assert_eq!(render_loop.state(), LoopState::Uninitialized);
    }

    #[test]
    fn hidden_loop_skips_drawing() {
        let mut render_loop = RenderLoop::new(None);
        render_loop.set_visible(false);
        assert!(!render_loop.should_draw(0.0));
        render_loop.set_visible(true);
        assert!(render_loop.should_draw(0.0));
    }

    #[test]
    fn capped_loop_waits_between_draws() {
        let mut render_loop = RenderLoop::new(Some(10.0));
        assert_eq!(render_loop.time_until_draw(0.0), None);
        render_loop.mark_drawn(1.0);
        assert!(!render_loop.should_draw(1.05));
        let remaining = render_loop.time_until_draw(1.05).expect("capped");
        assert!((remaining - 0.05).abs() < 1e-9);
        assert!(render_loop.should_draw(1.1));
    }
}
