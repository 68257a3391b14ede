// src/main.rs

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam::channel::{self, Receiver};
use log::{debug, error, info, warn};

use capture_governor::capture::{EncodedBacklog, FrameBuffer, SyntheticCapture};
use capture_governor::config::{CaptureConfig, Config};
use capture_governor::core::lock::lock_mutex;
use capture_governor::monitoring::{self, MetricsSnapshot};
use capture_governor::{PacerDriver, PacerHandle, ResourcePool};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "governor.toml".into());

    let cfg = if Path::new(&cfg_path).exists() {
        let cfg = Config::load(&cfg_path)?;
        info!("[governor] loaded {}", cfg_path);
        cfg
    } else {
        warn!("[governor] {} not found, using defaults", cfg_path);
        Config::default()
    };

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("[governor] shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    // ------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------
    let memory = Arc::new(ResourcePool::new(
        "memory",
        cfg.resources.memory_total_bytes,
    ));
    let disk = Arc::new(ResourcePool::new("disk", cfg.resources.disk_total_bytes));

    // ------------------------------------------------------------
    // Capture pipeline
    // ------------------------------------------------------------
    let capture = Arc::new(SyntheticCapture::new(
        &cfg.node_name,
        cfg.capture.width,
        cfg.capture.height,
        cfg.capture.bytes_per_pixel,
        memory.clone(),
    ));
    let (frame_tx, frame_rx) = channel::unbounded::<Option<FrameBuffer>>();

    let mut driver = PacerDriver::spawn(&cfg.node_name)?;
    let pacer = driver.handle();

    let backlog_bytes = Arc::new(AtomicU64::new(0));
    let encoder = start_encoder(
        &cfg.capture,
        frame_rx,
        EncodedBacklog::new(disk.clone()),
        pacer.clone(),
        backlog_bytes.clone(),
    )?;

    {
        let capture = capture.clone();
        pacer.start(move || {
            // Runs on the pacer thread; the encoder reports completion.
            let _ = frame_tx.send(capture.capture());
        })?;
    }
    if cfg.pacer.start_paused {
        pacer.pause(true)?;
    }
    pacer.set_max_framerate_fps(cfg.pacer.max_framerate_fps)?;
    info!(
        "[governor] pacing '{}' at {} fps ({} bytes/frame)",
        cfg.node_name,
        cfg.pacer.max_framerate_fps,
        capture.frame_bytes()
    );

    // ------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------
    let snapshot = Arc::new(Mutex::new(MetricsSnapshot::default()));
    if cfg.monitoring.enabled {
        monitoring::start_monitoring_server(
            &cfg.monitoring_bind(),
            snapshot.clone(),
            running.clone(),
        )
        .context("starting monitoring server")?;
    }

    // ------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------
    info!("[governor] running – Ctrl+C to stop");

    let mut last_stats = Instant::now();

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));

        if last_stats.elapsed() >= Duration::from_secs(1) {
            let pacer_stats = pacer.stats()?;
            let capture_stats = capture.stats();
            let memory_stats = memory.stats();
            debug!(
                "[governor] captures={} dropped={} memory={}/{} backlog={}",
                pacer_stats.captures_started,
                capture_stats.frames_dropped,
                memory_stats.used,
                memory_stats.total,
                backlog_bytes.load(Ordering::Relaxed)
            );
            let next = MetricsSnapshot {
                resources: vec![memory_stats, disk.stats()],
                pacer: Some(pacer_stats),
                capture: Some(capture_stats),
                backlog_bytes: backlog_bytes.load(Ordering::Relaxed),
            };
            *lock_mutex(&snapshot, "main loop") = next;

            last_stats = Instant::now();
        }
    }

    // ------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------
    info!("[governor] shutting down…");
    pacer.pause(true)?;
    driver.shutdown();
    if encoder.join().is_err() {
        error!("[encoder] thread panicked");
    }
    info!(
        "[governor] shutdown complete (memory used={} disk used={})",
        memory.stats().used,
        disk.stats().used
    );

    Ok(())
}

//
// ============================================================
// START_* HELPERS
// ============================================================
//

fn start_encoder(
    cfg: &CaptureConfig,
    frames: Receiver<Option<FrameBuffer>>,
    mut backlog: EncodedBacklog,
    pacer: PacerHandle,
    backlog_bytes: Arc<AtomicU64>,
) -> anyhow::Result<JoinHandle<()>> {
    let encode_delay = Duration::from_millis(cfg.encode_delay_ms);
    let compression_ratio = cfg.compression_ratio as u64;
    let drain_bytes = cfg.drain_bytes_per_frame;

    let handle = thread::Builder::new()
        .name("encoder".into())
        .spawn(move || {
            // Ends once the pacer thread drops the capture callback.
            for buffer in frames.iter() {
                let frame = buffer.map(|buffer| {
                    thread::sleep(encode_delay);
                    backlog.push(buffer.data.len() as u64 / compression_ratio);
                    buffer.frame.clone()
                });
                backlog.drain(drain_bytes);
                backlog_bytes.store(backlog.pending_bytes(), Ordering::Relaxed);

                if pacer.frame_captured(frame).is_err() {
                    debug!("[encoder] pacer gone, stopping");
                    break;
                }
            }
        })
        .context("spawning encoder")?;

    info!("[governor] encoder started");
    Ok(handle)
}
