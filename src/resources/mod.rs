//! Admission control for bounded shared quantities (bytes buffered in memory,
//! bytes spooled to disk, ...).
//!
//! A producer asks its [`ResourceInterface`] for quota before performing the
//! actual allocation and gives the quota back once the allocation is gone.
//! [`ScopedReservation`] ties the two calls together.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::logging::{ComponentLogger, LogContext};

pub mod reservation;

pub use reservation::ScopedReservation;

pub const DEFAULT_MEMORY_TOTAL: u64 = 4 * 1024 * 1024;
pub const DEFAULT_DISK_TOTAL: u64 = 256 * 1024 * 1024;

/// Resource accounting shared by every holder of a reservation.
///
/// All methods are non-blocking and may be called from any thread.
pub trait ResourceInterface: Send + Sync {
    /// Human readable name used in logs and metrics.
    fn name(&self) -> &str;

    /// Must be called before allocating `size` units.
    ///
    /// Returns `true` if the amount fits and has been added to the used
    /// counter. On `false` nothing changes and the caller must not allocate.
    fn reserve(&self, size: u64) -> bool;

    /// Reverts an earlier reservation of exactly `size` units.
    fn discard(&self, size: u64);

    fn total(&self) -> u64;

    fn used(&self) -> u64;

    /// Overrides the capacity. Test only.
    fn set_total_for_testing(&self, total: u64);
}

pub type SharedResource = Arc<dyn ResourceInterface>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStats {
    pub name: String,
    pub total: u64,
    pub used: u64,
    pub rejected_reservations: u64,
}

/// Lock-free bounded counter implementing [`ResourceInterface`].
#[derive(Debug)]
pub struct ResourcePool {
    name: String,
    total: AtomicU64,
    used: AtomicU64,
    rejected: AtomicU64,
}

impl ResourcePool {
    pub fn new(name: &str, total: u64) -> Self {
        Self {
            name: name.to_string(),
            total: AtomicU64::new(total),
            used: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Pool bounding bytes held in memory by in-flight frames.
    pub fn memory() -> Self {
        Self::new("memory", DEFAULT_MEMORY_TOTAL)
    }

    /// Pool bounding bytes spooled to local storage.
    pub fn disk() -> Self {
        Self::new("disk", DEFAULT_DISK_TOTAL)
    }

    pub fn shared(self) -> SharedResource {
        Arc::new(self)
    }

    pub fn available(&self) -> u64 {
        self.total().saturating_sub(self.used())
    }

    pub fn rejected_reservations(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            name: self.name.clone(),
            total: self.total(),
            used: self.used(),
            rejected_reservations: self.rejected_reservations(),
        }
    }
}

impl ResourceInterface for ResourcePool {
    fn name(&self) -> &str {
        &self.name
    }

    fn reserve(&self, size: u64) -> bool {
        let total = self.total.load(Ordering::Acquire);
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(size) {
                Some(next) if next <= total => next,
                _ => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    self.debug(&format!(
                        "reserve({}) rejected: used={} total={}",
                        size, current, total
                    ));
                    return false;
                }
            };
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn discard(&self, size: u64) {
        let previous = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |used| {
                Some(used.saturating_sub(size))
            })
            .unwrap_or_default();
        debug_assert!(
            previous >= size,
            "discard({}) exceeds used amount {} on '{}'",
            size,
            previous,
            self.name
        );
        if previous < size {
            self.error(&format!(
                "discard({}) exceeds used amount {}, clamped to zero",
                size, previous
            ));
        }
    }

    fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    fn set_total_for_testing(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }
}

impl ComponentLogger for ResourcePool {
    fn log_context(&self) -> LogContext {
        LogContext::new("ResourcePool", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_respects_total() {
        let pool = ResourcePool::new("test", 100);
        assert!(pool.reserve(60));
        assert!(!pool.reserve(50));
        assert_eq!(pool.used(), 60);
        pool.discard(60);
        assert!(pool.reserve(50));
        assert_eq!(pool.used(), 50);
        assert_eq!(pool.rejected_reservations(), 1);
    }

    #[test]
    fn test_reserve_exactly_total() {
        let pool = ResourcePool::new("test", 10);
        assert!(pool.reserve(10));
        assert!(!pool.reserve(1));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_overflowing_request_is_rejected() {
        let pool = ResourcePool::new("test", u64::MAX);
        assert!(pool.reserve(u64::MAX - 1));
        assert!(!pool.reserve(2));
        assert_eq!(pool.used(), u64::MAX - 1);
    }

    #[test]
    fn test_set_total_for_testing() {
        let pool = ResourcePool::memory();
        assert_eq!(pool.total(), DEFAULT_MEMORY_TOTAL);
        pool.set_total_for_testing(8);
        assert!(!pool.reserve(9));
        assert!(pool.reserve(8));
    }

    #[test]
    fn test_stats_snapshot() {
        let pool = ResourcePool::disk();
        assert!(pool.reserve(1024));
        let stats = pool.stats();
        assert_eq!(stats.name, "disk");
        assert_eq!(stats.total, DEFAULT_DISK_TOTAL);
        assert_eq!(stats.used, 1024);
        assert_eq!(stats.rejected_reservations, 0);
    }
}
