//! Synthetic capture source used by the node binary to exercise admission
//! control and pacing end to end.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::timestamp::utc_ns_now;
use crate::pacing::CapturedFrame;
use crate::resources::{ScopedReservation, SharedResource};

pub mod backlog;

pub use backlog::EncodedBacklog;

/// Captured pixels together with the memory quota they occupy.
///
/// Dropping the buffer returns the quota.
#[derive(Debug)]
pub struct FrameBuffer {
    pub frame: CapturedFrame,
    pub data: Vec<u8>,
    reservation: ScopedReservation,
}

impl FrameBuffer {
    pub fn reservation(&self) -> &ScopedReservation {
        &self.reservation
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub frames_dropped: u64,
}

/// Bytes in one frame, `None` if the product does not fit in a `u64`.
pub fn frame_size(width: u32, height: u32, bytes_per_pixel: u32) -> Option<u64> {
    (width as u64)
        .checked_mul(height as u64)?
        .checked_mul(bytes_per_pixel as u64)
}

pub struct SyntheticCapture {
    name: String,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    memory: SharedResource,
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
}

impl SyntheticCapture {
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        memory: SharedResource,
    ) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            bytes_per_pixel,
            memory,
            frames_captured: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Saturates at `u64::MAX`, which no pool can admit.
    pub fn frame_bytes(&self) -> u64 {
        frame_size(self.width, self.height, self.bytes_per_pixel).unwrap_or(u64::MAX)
    }

    /// Produces one frame, or `None` when memory quota is exhausted.
    pub fn capture(&self) -> Option<FrameBuffer> {
        let size = self.frame_bytes();
        let reservation = ScopedReservation::new(size, self.memory.clone());
        if !reservation.reserved() {
            let dropped = self.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 50 == 0 {
                self.warn(&format!(
                    "frame dropped, memory exhausted (dropped={} used={}/{})",
                    dropped,
                    self.memory.used(),
                    self.memory.total()
                ));
            }
            return None;
        }

        let seq = self.frames_captured.fetch_add(1, Ordering::Relaxed);
        let fill = (seq % 256) as u8;
        let frame = CapturedFrame {
            utc_ns: utc_ns_now(),
            width: self.width,
            height: self.height,
            size_bytes: size,
        };
        if seq % 100 == 0 {
            self.trace_resource(&*self.memory);
        }

        Some(FrameBuffer {
            frame,
            data: vec![fill; size as usize],
            reservation,
        })
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

impl ComponentLogger for SyntheticCapture {
    fn log_context(&self) -> LogContext {
        LogContext::new("SyntheticCapture", &self.name).with_resource(self.memory.name())
    }
}
