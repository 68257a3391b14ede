use std::fmt;
use std::sync::Arc;

use super::SharedResource;

/// Move-only RAII guard pairing `reserve` with exactly one `discard`.
///
/// ```
/// use capture_governor::resources::{ResourcePool, ScopedReservation};
///
/// let memory = ResourcePool::new("memory", 4096).shared();
/// {
///     let reservation = ScopedReservation::new(1024, memory.clone());
///     assert!(reservation.reserved());
///     assert_eq!(memory.used(), 1024);
/// }
/// assert_eq!(memory.used(), 0);
/// ```
///
/// Several reservations can be folded into one owner with [`hand_over`]:
///
/// ```
/// use capture_governor::resources::{ResourcePool, ScopedReservation};
///
/// let memory = ResourcePool::new("memory", 4096).shared();
/// let mut summary = ScopedReservation::default();
/// for size in [100, 200, 300] {
///     let mut single = ScopedReservation::new(size, memory.clone());
///     summary.hand_over(&mut single);
/// }
/// assert_eq!(summary.size(), 600);
/// assert_eq!(memory.used(), 600);
/// ```
///
/// [`hand_over`]: ScopedReservation::hand_over
#[derive(Default)]
pub struct ScopedReservation {
    resource: Option<SharedResource>,
    size: Option<u64>,
}

impl ScopedReservation {
    /// Zero-size reservation with no resource attached.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reserves `size` units on `resource`.
    ///
    /// The resource stays attached even when the reservation is rejected, so
    /// the result can still receive a [`hand_over`](Self::hand_over).
    pub fn new(size: u64, resource: SharedResource) -> Self {
        let size = (size > 0 && resource.reserve(size)).then_some(size);
        Self {
            resource: Some(resource),
            size,
        }
    }

    /// Reserves `size` units on the resource `other` is attached to, leaving
    /// `other`'s own reservation untouched.
    pub fn alongside(size: u64, other: &ScopedReservation) -> Self {
        let resource = other.resource.clone();
        let size = match &resource {
            Some(resource) if size > 0 && resource.reserve(size) => Some(size),
            _ => None,
        };
        Self { resource, size }
    }

    pub fn reserved(&self) -> bool {
        self.size.is_some()
    }

    /// Held amount, zero when not reserved.
    pub fn size(&self) -> u64 {
        self.size.unwrap_or(0)
    }

    pub fn resource(&self) -> Option<&SharedResource> {
        self.resource.as_ref()
    }

    /// Shrinks the reservation to `new_size`, discarding the difference.
    ///
    /// Returns whether anything is still reserved afterwards. `new_size` must
    /// not exceed the current size.
    pub fn reduce(&mut self, new_size: u64) -> bool {
        let Some(current) = self.size else {
            return false;
        };
        debug_assert!(
            new_size <= current,
            "cannot reduce reservation of {} to {}",
            current,
            new_size
        );
        if new_size > current {
            log::error!(
                "refusing to grow reservation from {} to {} via reduce",
                current,
                new_size
            );
            return false;
        }

        if let Some(resource) = &self.resource {
            resource.discard(current - new_size);
        }
        if new_size > 0 {
            self.size = Some(new_size);
            true
        } else {
            self.size = None;
            false
        }
    }

    /// Adds `other`'s reservation to `self` without reserving or discarding
    /// anything, then leaves `other` unreserved.
    ///
    /// Both reservations must belong to the same resource. An unattached
    /// `self` adopts `other`'s resource.
    pub fn hand_over(&mut self, other: &mut ScopedReservation) {
        if let (Some(mine), Some(theirs)) = (&self.resource, &other.resource) {
            if !same_resource(mine, theirs) {
                debug_assert!(
                    false,
                    "hand_over between unrelated resources '{}' and '{}'",
                    mine.name(),
                    theirs.name()
                );
                log::error!(
                    "hand_over between unrelated resources '{}' and '{}' ignored",
                    mine.name(),
                    theirs.name()
                );
                return;
            }
        }
        if self.resource.is_none() {
            debug_assert!(
                self.size.is_none(),
                "unattached reservation may not have size"
            );
            self.resource = other.resource.clone();
        }

        let Some(other_size) = other.size.take() else {
            return;
        };
        self.size = Some(self.size() + other_size);
    }

    /// Discards whatever is held right away. Idempotent.
    pub fn release(&mut self) {
        if let (Some(size), Some(resource)) = (self.size.take(), &self.resource) {
            resource.discard(size);
        }
    }
}

impl Drop for ScopedReservation {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ScopedReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedReservation")
            .field("resource", &self.resource.as_ref().map(|r| r.name()))
            .field("size", &self.size)
            .finish()
    }
}

fn same_resource(a: &SharedResource, b: &SharedResource) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
