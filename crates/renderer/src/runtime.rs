use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
}

/// Abstraction over where time values originate from.
pub trait TimeSource {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Seconds elapsed since the last reset.
    fn elapsed(&mut self) -> f64;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
    }

    fn elapsed(&mut self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Shared, externally advanced clock for tests and headless runs.
///
/// Clones observe the same time, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Rc<Cell<f64>>,
    origin: Rc<Cell<f64>>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by.as_secs_f64());
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }
}

impl TimeSource for ManualTimeSource {
    fn reset(&mut self) {
        self.origin.set(self.now.get());
    }

    fn elapsed(&mut self) -> f64 {
        (self.now.get() - self.origin.get()).max(0.0)
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource>;

/// Monotonic frame clock started once at the first successful link.
pub struct FrameClock {
    source: BoxedTimeSource,
    started: bool,
}

impl FrameClock {
    pub fn new(source: BoxedTimeSource) -> Self {
        Self {
            source,
            started: false,
        }
    }

    /// Starts the clock. Later calls leave the running clock untouched.
    pub fn start(&mut self) {
        if !self.started {
            self.source.reset();
            self.started = true;
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Current elapsed time without counting a frame.
    pub fn now(&mut self) -> f64 {
        if self.started {
            self.source.elapsed()
        } else {
            0.0
        }
    }

    /// Samples the clock for a frame that is about to be drawn.
    pub fn sample(&mut self) -> TimeSample {
        TimeSample {
            seconds: self.now() as f32,
        }
    }
}

/// Enforces an optional minimum interval between drawn frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacer {
    min_interval: Option<f64>,
    last_drawn: Option<f64>,
}

impl FramePacer {
    pub fn new(max_fps: Option<f32>) -> Self {
        let min_interval = max_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| 1.0 / f64::from(fps));
        Self {
            min_interval,
            last_drawn: None,
        }
    }

    pub fn ready(&self, now: f64) -> bool {
        match (self.min_interval, self.last_drawn) {
            (Some(interval), Some(last)) => now - last >= interval,
            _ => true,
        }
    }

    pub fn mark_drawn(&mut self, now: f64) {
        self.last_drawn = Some(now);
    }

    /// Seconds until the next frame may be drawn.
    pub fn remaining(&self, now: f64) -> Option<f64> {
        let (interval, last) = (self.min_interval?, self.last_drawn?);
        Some((last + interval - now).max(0.0))
    }
}

/// Identifies one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(pub u64);

/// Host mechanism that invokes a callback once per display refresh.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Fake vsync clock: frames become due one refresh interval after request.
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualSchedulerState>>,
}

#[derive(Debug)]
struct ManualSchedulerState {
    now: Duration,
    refresh_interval: Duration,
    next_token: u64,
    pending: Vec<(FrameToken, Duration)>,
    requested: usize,
    cancelled: usize,
}

impl ManualScheduler {
    /// Scheduler refreshing at roughly 60 Hz.
    pub fn new() -> Self {
        Self::with_refresh_interval(Duration::from_micros(16_667))
    }

    pub fn with_refresh_interval(refresh_interval: Duration) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ManualSchedulerState {
                now: Duration::ZERO,
                refresh_interval,
                next_token: 1,
                pending: Vec::new(),
                requested: 0,
                cancelled: 0,
            })),
        }
    }

    /// Moves the fake clock forward and returns the tokens that became due,
    /// oldest first. Returned tokens are no longer pending.
    pub fn advance(&self, by: Duration) -> Vec<FrameToken> {
        let mut state = self.inner.borrow_mut();
        state.now += by;
        let now = state.now;
        let mut due: Vec<(FrameToken, Duration)> = Vec::new();
        state.pending.retain(|&(token, at)| {
            if at <= now {
                due.push((token, at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(token, at)| (at, token));
        due.into_iter().map(|(token, _)| token).collect()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.borrow().refresh_interval
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub fn requested(&self) -> usize {
        self.inner.borrow().requested
    }

    pub fn cancelled(&self) -> usize {
        self.inner.borrow().cancelled
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameToken {
        let mut state = self.inner.borrow_mut();
        let token = FrameToken(state.next_token);
        state.next_token += 1;
        let due = state.now + state.refresh_interval;
        state.pending.push((token, due));
        state.requested += 1;
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        let mut state = self.inner.borrow_mut();
        let before = state.pending.len();
        state.pending.retain(|&(pending, _)| pending != token);
        if state.pending.len() != before {
            state.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_clock_starts_once() {
        let time = ManualTimeSource::new();
        time.set(5.0);
        let mut clock = FrameClock::new(Box::new(time.clone()));
        assert_eq!(clock.now(), 0.0);
        clock.start();
        time.advance(Duration::from_secs(2));
        clock.start();
        let sample = clock.sample();
        assert_eq!(sample.seconds, 2.0);
        time.advance(Duration::from_millis(500));
        assert_eq!(clock.sample().seconds, 2.5);
    }

    #[test]
    fn pacer_enforces_minimum_interval() {
        let mut pacer = FramePacer::new(Some(60.0));
        assert!(pacer.ready(0.0));
        pacer.mark_drawn(0.0);
        assert!(!pacer.ready(0.010));
        assert!(pacer.ready(0.017));
        let remaining = pacer.remaining(0.010).expect("capped");
        assert!((remaining - (1.0 / 60.0 - 0.010)).abs() < 1e-9);

        let uncapped = FramePacer::new(None);
        assert!(uncapped.ready(0.0));
        assert!(FramePacer::new(Some(0.0)).remaining(1.0).is_none());
    }

    #[test]
    fn manual_scheduler_releases_due_frames() {
        let mut scheduler = ManualScheduler::new();
        let token = scheduler.request_frame();
        assert!(scheduler.advance(Duration::from_millis(10)).is_empty());
        assert_eq!(scheduler.advance(Duration::from_millis(10)), vec![token]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn cancelled_frames_never_fire() {
        let mut scheduler = ManualScheduler::new();
        let token = scheduler.request_frame();
        scheduler.cancel_frame(token);
        scheduler.cancel_frame(token);
        assert!(scheduler.advance(Duration::from_secs(1)).is_empty());
        assert_eq!(scheduler.cancelled(), 1);
    }
}
