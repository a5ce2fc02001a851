//! Buffer Pool
//!
//! Recycles read buffers so sustained streaming does not allocate a fresh
//! chunk-sized buffer per iteration. The free list is tiny (3 entries by
//! default) and guarded by a single mutex; operations are O(pool size).
//! Checkout never blocks: when nothing on the free list fits, a fresh
//! buffer is allocated instead.
//!
//! [`BufferPool::release_idle`] is the budget-relief hook: it drops idle
//! buffers beyond a low-water mark so their memory can actually be
//! reclaimed between reservations.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// A small fixed-capacity pool of reusable byte buffers
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
    max_buffer: usize,
    relief_low_water: usize,
    checkouts: AtomicU64,
    reuses: AtomicU64,
}

impl BufferPool {
    /// Create a pool keeping at most `capacity` idle buffers, each no larger
    /// than `max_buffer` bytes; relief trims the free list to
    /// `relief_low_water` entries
    #[must_use]
    pub fn new(capacity: usize, max_buffer: usize, relief_low_water: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            max_buffer,
            relief_low_water,
            checkouts: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
        }
    }

    /// Check out a buffer with length exactly `min_capacity`
    ///
    /// Reuses the first free-list entry whose capacity fits, else allocates
    /// fresh. The returned buffer goes back to the pool when dropped.
    pub fn checkout(self: &Arc<Self>, min_capacity: usize) -> PooledBuffer {
        self.checkouts.fetch_add(1, Ordering::Relaxed);
        let reused = {
            let mut free = self.free.lock();
            free.iter()
                .position(|buf| buf.capacity() >= min_capacity)
                .map(|idx| free.swap_remove(idx))
        };

        let mut buf = match reused {
            Some(buf) => {
                self.reuses.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => Vec::with_capacity(min_capacity),
        };
        buf.clear();
        buf.resize(min_capacity, 0);

        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffers currently on the free list
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.free.lock().len()
    }

    /// Total checkouts served (lifetime)
    #[must_use]
    pub fn checkouts(&self) -> u64 {
        self.checkouts.load(Ordering::Relaxed)
    }

    /// Checkouts served from the free list rather than a fresh allocation
    #[must_use]
    pub fn reuses(&self) -> u64 {
        self.reuses.load(Ordering::Relaxed)
    }

    /// Drop idle buffers beyond the low-water mark, returning bytes released
    pub fn release_idle(&self) -> usize {
        let mut freed = 0;
        let mut free = self.free.lock();
        while free.len() > self.relief_low_water {
            if let Some(buf) = free.pop() {
                freed += buf.capacity();
            }
        }
        if freed > 0 {
            trace!(freed, remaining = free.len(), "trimmed idle pool buffers");
        }
        freed
    }

    fn restore(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() > self.max_buffer {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(buf);
        }
    }
}

/// A byte buffer checked out of a [`BufferPool`]
///
/// Owned exclusively by the holder; dropping it offers the allocation back
/// to the pool, which keeps it only while under its caps. No other owner
/// may retain the bytes after return.
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Underlying allocation capacity in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().map(Vec::capacity).unwrap_or(0)
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.restore(buf);
        }
    }
}
