use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use capture_governor::pacing::{
    CapturedFrame, Clock, FramePacer, FrameScheduler, ManualClock, PacerDriver, PacerState,
    MIN_CAPTURE_INTERVAL,
};
use crossbeam::channel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Pacer on a manual clock that records the start time of every capture.
fn recording_pacer() -> (FramePacer<ManualClock>, ManualClock, Arc<Mutex<Vec<Instant>>>) {
    let clock = ManualClock::new();
    let mut pacer = FramePacer::with_clock("recording", clock.clone());
    let starts = Arc::new(Mutex::new(Vec::new()));
    let sink = starts.clone();
    let observer = clock.clone();
    pacer.start(Box::new(move || {
        sink.lock().unwrap().push(observer.now());
    }));
    (pacer, clock, starts)
}

#[test]
fn test_constant_rate_scenario() {
    let (mut pacer, clock, starts) = recording_pacer();

    pacer.set_max_framerate_fps(1);
    assert!(pacer.poll(), "first capture fires without delay");
    assert!(pacer.is_frame_pending());

    pacer.set_max_framerate_fps(2);
    assert!(pacer.next_wakeup().is_none(), "no second timer while pending");

    let started = starts.lock().unwrap()[0];
    pacer.on_frame_captured(None);
    assert_eq!(pacer.next_wakeup(), Some(started + Duration::from_millis(500)));

    clock.advance(Duration::from_millis(500));
    assert!(pacer.poll());
    assert_eq!(starts.lock().unwrap().len(), 2);
}

#[test]
fn test_ten_fps_spacing_with_fast_captures() {
    let (mut pacer, clock, starts) = recording_pacer();
    pacer.set_max_framerate_fps(10);

    for _ in 0..20 {
        while !pacer.poll() {
            clock.advance(Duration::from_millis(1));
        }
        clock.advance(Duration::from_millis(3));
        pacer.on_frame_captured(None);
    }

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 20);
    for pair in starts.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_millis(100));
    }
}

#[test]
fn test_captures_never_overlap_under_random_driving() {
    let clock = ManualClock::new();
    let mut pacer = FramePacer::with_clock("random", clock.clone());
    let in_flight = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let starts = Arc::new(Mutex::new(Vec::new()));
    {
        let in_flight = in_flight.clone();
        let overlaps = overlaps.clone();
        let starts = starts.clone();
        let observer = clock.clone();
        pacer.start(Box::new(move || {
            if in_flight.swap(true, Ordering::SeqCst) {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            starts.lock().unwrap().push(observer.now());
        }));
    }

    let mut rng = StdRng::seed_from_u64(42);
    let mut fps = 30;
    pacer.set_max_framerate_fps(fps);

    for _ in 0..10_000 {
        clock.advance(Duration::from_micros(rng.gen_range(0..20_000)));
        match rng.gen_range(0..10) {
            0 => {
                fps = rng.gen_range(0..120);
                pacer.set_max_framerate_fps(fps);
            }
            1 => pacer.pause(rng.gen_bool(0.5)),
            2..=4 if pacer.is_frame_pending() => {
                in_flight.store(false, Ordering::SeqCst);
                pacer.on_frame_captured(None);
            }
            _ => {
                pacer.poll();
            }
        }
        assert!(!(pacer.next_wakeup().is_some() && pacer.is_frame_pending()));
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let starts = starts.lock().unwrap();
    assert!(starts.len() > 10);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= MIN_CAPTURE_INTERVAL);
    }
}

#[test]
fn test_pause_blocks_armed_capture_until_resumed() {
    let (mut pacer, clock, starts) = recording_pacer();
    pacer.set_max_framerate_fps(10);
    assert!(pacer.poll());
    pacer.on_frame_captured(None);
    assert!(pacer.next_wakeup().is_some());

    pacer.pause(true);
    for _ in 0..50 {
        clock.advance(Duration::from_millis(100));
        assert!(!pacer.poll());
    }
    assert_eq!(starts.lock().unwrap().len(), 1);

    pacer.pause(false);
    clock.advance(MIN_CAPTURE_INTERVAL);
    assert!(pacer.poll());
    assert_eq!(starts.lock().unwrap().len(), 2);
}

#[test]
fn test_state_transitions() {
    let clock = ManualClock::new();
    let mut pacer = FramePacer::with_clock("states", clock);
    assert_eq!(pacer.state(), PacerState::Stopped);

    pacer.start(Box::new(|| {}));
    assert_eq!(pacer.state(), PacerState::Idle);

    pacer.set_max_framerate_fps(60);
    assert_eq!(pacer.state(), PacerState::Armed);
    assert!(pacer.poll());
    assert_eq!(pacer.state(), PacerState::CapturePending);

    pacer.pause(true);
    pacer.on_frame_captured(Some(&CapturedFrame {
        utc_ns: 0,
        width: 1,
        height: 1,
        size_bytes: 4,
    }));
    assert_eq!(pacer.state(), PacerState::Paused);
}

#[test]
fn test_driver_paces_without_overlap() {
    let driver = PacerDriver::spawn("it").unwrap();
    let handle = driver.handle();
    let pending = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = channel::unbounded();
    {
        let pending = pending.clone();
        let overlaps = overlaps.clone();
        handle
            .start(move || {
                if pending.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                let _ = tx.send(Instant::now());
            })
            .unwrap();
    }
    handle.set_max_framerate_fps(100).unwrap();

    let mut starts = Vec::new();
    for _ in 0..5 {
        let started = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("capture requested");
        starts.push(started);
        // Further rate changes while pending must not produce extra captures.
        handle.set_max_framerate_fps(100).unwrap();
        pending.store(false, Ordering::SeqCst);
        handle.frame_captured(None).unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    // Timestamps are taken inside the callback, slightly after the pacer's own.
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(9));
    }

    handle.pause(true).unwrap();
    let stats = handle.stats().unwrap();
    assert!(stats.captures_started >= 5);
    assert_eq!(stats.captures_completed, 5);
}
