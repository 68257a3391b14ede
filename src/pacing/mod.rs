//! Constant-rate capture pacing.

pub mod clock;
pub mod driver;
pub mod pacer;
pub mod sequence;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{PacerCommand, PacerDriver, PacerHandle};
pub use pacer::{
    CaptureCallback, CapturedFrame, FramePacer, FrameScheduler, MIN_CAPTURE_INTERVAL, PacerState,
    PacerStats, STALE_CAPTURE_THRESHOLD,
};
pub use sequence::SequenceChecker;
pub use timer::OneShotTimer;
