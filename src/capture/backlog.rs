use crate::core::logging::{ComponentLogger, LogContext};
use crate::resources::{ScopedReservation, SharedResource};

/// Encoded output waiting to be shipped, accounted against a disk pool.
///
/// Each pushed chunk is reserved on its own and then folded into a single
/// summary reservation; draining shrinks that summary.
pub struct EncodedBacklog {
    disk: SharedResource,
    pending: ScopedReservation,
    chunks: u64,
    rejected: u64,
}

impl EncodedBacklog {
    pub fn new(disk: SharedResource) -> Self {
        Self {
            disk,
            pending: ScopedReservation::empty(),
            chunks: 0,
            rejected: 0,
        }
    }

    /// Accounts `bytes` of encoded output. Returns `false` if the disk pool
    /// is full and the chunk has to be discarded.
    pub fn push(&mut self, bytes: u64) -> bool {
        let mut chunk = ScopedReservation::new(bytes, self.disk.clone());
        if !chunk.reserved() {
            self.rejected += 1;
            self.warn(&format!("backlog full, rejecting {} bytes", bytes));
            return false;
        }
        self.pending.hand_over(&mut chunk);
        self.chunks += 1;
        true
    }

    /// Releases up to `bytes` of the backlog, returning how much was released.
    pub fn drain(&mut self, bytes: u64) -> u64 {
        let held = self.pending.size();
        let released = bytes.min(held);
        if released > 0 {
            self.pending.reduce(held - released);
        }
        released
    }

    pub fn pending_bytes(&self) -> u64 {
        self.pending.size()
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl ComponentLogger for EncodedBacklog {
    fn log_context(&self) -> LogContext {
        LogContext::new("EncodedBacklog", self.disk.name())
    }
}
