use std::time::{Duration, Instant};

use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::timestamp::format_millis;

use super::clock::{Clock, SystemClock};
use super::sequence::SequenceChecker;
use super::timer::OneShotTimer;

/// Captures are never scheduled closer together than this, so downstream
/// encoders always see strictly increasing timestamps.
pub const MIN_CAPTURE_INTERVAL: Duration = Duration::from_millis(1);

/// A capture pending longer than this is reported as an error.
pub const STALE_CAPTURE_THRESHOLD: Duration = Duration::from_secs(1);

pub type CaptureCallback = Box<dyn FnMut() + Send>;

/// Metadata of a finished capture, handed back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub utc_ns: u64,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

/// Interface the capture pipeline drives.
pub trait FrameScheduler {
    /// Installs the callback used to request a capture. Does not schedule.
    fn start(&mut self, capture_callback: CaptureCallback);

    fn pause(&mut self, pause: bool);

    /// Must be called once for every requested capture. `frame` is `None`
    /// when the capture failed.
    fn on_frame_captured(&mut self, frame: Option<&CapturedFrame>);

    /// `0` stops scheduling further captures. An already armed capture still
    /// fires.
    fn set_max_framerate_fps(&mut self, max_framerate_fps: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    Stopped,
    Idle,
    /// A capture is scheduled and waiting for its deadline.
    Armed,
    Paused,
    CapturePending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerStats {
    pub captures_started: u64,
    pub captures_completed: u64,
    pub failed_captures: u64,
    pub suppressed_while_pending: u64,
}

/// Requests captures at a constant target rate, never more than one at a time.
///
/// The next capture is scheduled one interval after the previous capture
/// *started*, but only once that capture has completed. There is no catch-up:
/// a slow capture simply lowers the effective rate.
///
/// All methods must be called from one thread. The pacer binds to the first
/// thread that uses it.
pub struct FramePacer<C: Clock = SystemClock> {
    name: String,
    clock: C,
    sequence: SequenceChecker,
    capture_timer: OneShotTimer,
    capture_callback: Option<CaptureCallback>,
    max_framerate_fps: u32,
    paused: bool,
    frame_pending: bool,
    last_capture_started_time: Option<Instant>,
    stats: PacerStats,
}

impl FramePacer<SystemClock> {
    pub fn new(name: &str) -> Self {
        Self::with_clock(name, SystemClock)
    }
}

impl<C: Clock> FramePacer<C> {
    pub fn with_clock(name: &str, clock: C) -> Self {
        Self {
            name: name.to_string(),
            clock,
            sequence: SequenceChecker::detached(),
            capture_timer: OneShotTimer::new(),
            capture_callback: None,
            max_framerate_fps: 0,
            paused: false,
            frame_pending: false,
            last_capture_started_time: None,
            stats: PacerStats::default(),
        }
    }

    pub fn state(&self) -> PacerState {
        if self.capture_callback.is_none() {
            PacerState::Stopped
        } else if self.frame_pending {
            PacerState::CapturePending
        } else if self.paused {
            PacerState::Paused
        } else if self.capture_timer.is_running() {
            PacerState::Armed
        } else {
            PacerState::Idle
        }
    }

    pub fn stats(&self) -> PacerStats {
        self.stats
    }

    pub fn max_framerate_fps(&self) -> u32 {
        self.max_framerate_fps
    }

    pub fn is_frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn last_capture_started_time(&self) -> Option<Instant> {
        self.last_capture_started_time
    }

    /// When the armed capture is due, if any.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.capture_timer.deadline()
    }

    /// Fires the capture timer if its deadline has passed.
    ///
    /// Returns whether a capture was requested.
    pub fn poll(&mut self) -> bool {
        self.check_sequence();
        let now = self.clock.now();
        if !self.capture_timer.take_if_due(now) {
            return false;
        }
        self.capture_next_frame(now);
        true
    }

    fn check_sequence(&mut self) {
        let valid = self.sequence.called_on_valid_sequence();
        debug_assert!(valid, "FramePacer '{}' used from the wrong thread", self.name);
    }

    fn schedule_next_frame(&mut self) {
        let now = self.clock.now();

        if self.paused {
            self.debug("Not scheduling capture because stream is paused.");
            return;
        }

        if self.capture_callback.is_none() {
            self.debug("Not scheduling capture because callback is not provided.");
            return;
        }

        if self.frame_pending {
            self.stats.suppressed_while_pending += 1;
            // Slow captures are normal; only long-stuck ones are errors.
            if let Some(started) = self.last_capture_started_time {
                let pending_for = now.saturating_duration_since(started);
                if pending_for > STALE_CAPTURE_THRESHOLD {
                    self.error(&format!(
                        "Not scheduling capture because a capture is pending (for {}).",
                        format_millis(pending_for)
                    ));
                }
            }
            return;
        }

        if self.max_framerate_fps == 0 {
            self.debug("Not scheduling capture because framerate is set to 0.");
            return;
        }

        let capture_interval =
            (Duration::from_secs(1) / self.max_framerate_fps).max(MIN_CAPTURE_INTERVAL);
        let delay = match self.last_capture_started_time {
            None => Duration::ZERO,
            Some(last) => {
                let target_capture_time = (last + capture_interval).max(now);
                (target_capture_time - now).max(MIN_CAPTURE_INTERVAL)
            }
        };

        log::trace!(
            "[{}] next capture in {} (interval {})",
            self.name,
            format_millis(delay),
            format_millis(capture_interval)
        );
        self.capture_timer.start(now, delay);
    }

    fn capture_next_frame(&mut self, now: Instant) {
        debug_assert!(!self.frame_pending, "capture fired while one is pending");

        self.last_capture_started_time = Some(now);
        self.frame_pending = true;
        self.stats.captures_started += 1;
        if let Some(callback) = self.capture_callback.as_mut() {
            callback();
        }
    }
}

impl<C: Clock> FrameScheduler for FramePacer<C> {
    fn start(&mut self, capture_callback: CaptureCallback) {
        self.check_sequence();
        self.capture_callback = Some(capture_callback);
    }

    fn pause(&mut self, pause: bool) {
        self.check_sequence();
        self.paused = pause;
        if self.paused {
            self.capture_timer.stop();
        } else {
            self.schedule_next_frame();
        }
    }

    fn on_frame_captured(&mut self, frame: Option<&CapturedFrame>) {
        self.check_sequence();
        debug_assert!(
            self.frame_pending,
            "on_frame_captured without a pending capture"
        );

        self.frame_pending = false;
        self.stats.captures_completed += 1;
        if frame.is_none() {
            self.stats.failed_captures += 1;
        }
        self.schedule_next_frame();
    }

    fn set_max_framerate_fps(&mut self, max_framerate_fps: u32) {
        self.check_sequence();
        self.max_framerate_fps = max_framerate_fps;
        self.schedule_next_frame();
    }
}

impl<C: Clock> ComponentLogger for FramePacer<C> {
    fn log_context(&self) -> LogContext {
        LogContext::new("FramePacer", &self.name)
    }
}
