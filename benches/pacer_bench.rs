use std::time::{Duration, Instant};

use capture_governor::pacing::{FramePacer, FrameScheduler, ManualClock};

fn main() {
    let clock = ManualClock::new();
    let mut pacer = FramePacer::with_clock("bench", clock.clone());
    pacer.start(Box::new(|| {}));
    pacer.set_max_framerate_fps(60);

    let iterations = 200_000;
    let start = Instant::now();
    let mut captures = 0;
    for _ in 0..iterations {
        clock.advance(Duration::from_millis(1));
        if pacer.poll() {
            captures += 1;
            pacer.on_frame_captured(None);
        }
    }
    let elapsed = start.elapsed();

    println!(
        "Pacer benchmark: {} polls ({} captures) in {:.2?} ({:.0} polls/s)",
        iterations,
        captures,
        elapsed,
        iterations as f64 / elapsed.as_secs_f64()
    );
}
