//! Reusable buffer pools.
//!
//! A [`FramePool`] is a FIFO free-list of values that are expensive to
//! allocate: FFmpeg frames for hardware transfers and pixel conversion, and
//! the pixel payloads handed to consumers. [`FramePool::acquire`] pops the
//! oldest idle value or builds a new one; the returned [`Pooled`] handle
//! pushes the value back when it is dropped, whichever thread drops it and
//! whichever path (success or error) it leaves on.
//!
//! Pools are unbounded. Outstanding values are bounded by the output queue
//! capacity, so the free-list never grows past what playback needs.

use std::collections::VecDeque;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::ops::{Deref, DerefMut};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

struct PoolInner<T> {
    idle: Mutex<VecDeque<T>>,
    allocated: AtomicUsize,
}

/// A shared free-list of reusable values.
///
/// Cloning the pool clones the handle; all clones share one free-list.
pub struct FramePool<T> {
    inner: Arc<PoolInner<T>>,
}

/// Counters describing a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Values currently sitting in the free-list.
    pub idle: usize,
    /// Values ever constructed by [`FramePool::acquire`].
    pub allocated: usize,
}

impl<T> FramePool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(VecDeque::new()),
                allocated: AtomicUsize::new(0),
            }),
        }
    }

    /// Take the oldest idle value, or construct one with `create`.
    pub fn acquire_with<F: FnOnce() -> T>(&self, create: F) -> Pooled<T> {
        let reused = self.inner.idle.lock().pop_front();
        let value = match reused {
            Some(value) => value,
            None => {
                self.inner.allocated.fetch_add(1, Ordering::Relaxed);
                create()
            }
        };

        Pooled {
            value: Some(value),
            home: Some(Arc::clone(&self.inner)),
        }
    }

    /// Push a value to the back of the free-list.
    pub fn release(&self, value: T) {
        self.inner.idle.lock().push_back(value);
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.inner.idle.lock().len(),
            allocated: self.inner.allocated.load(Ordering::Relaxed),
        }
    }
}

impl<T: Default> FramePool<T> {
    /// Take the oldest idle value, or a default-constructed one.
    pub fn acquire(&self) -> Pooled<T> {
        self.acquire_with(T::default)
    }
}

impl<T> Clone for FramePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for FramePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for FramePool<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let stats = self.stats();
        f.debug_struct("FramePool")
            .field("idle", &stats.idle)
            .field("allocated", &stats.allocated)
            .finish()
    }
}

/// A value on loan from a [`FramePool`].
///
/// Dropping the handle returns the value to its pool. A handle made with
/// [`Pooled::detached`] has no pool and simply drops its value.
pub struct Pooled<T> {
    value: Option<T>,
    home: Option<Arc<PoolInner<T>>>,
}

impl<T> Pooled<T> {
    /// Wrap a value that does not belong to any pool.
    pub fn detached(value: T) -> Self {
        Self {
            value: Some(value),
            home: None,
        }
    }

    /// Whether dropping this handle returns the value to a pool.
    pub fn is_pooled(&self) -> bool {
        self.home.is_some()
    }

    /// Take the value out, so that it is not returned to its pool.
    pub fn into_inner(mut self) -> T {
        self.home = None;
        self.value
            .take()
            .unwrap_or_else(|| unreachable!("pooled value taken twice"))
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
            .as_ref()
            .unwrap_or_else(|| unreachable!("pooled value used after release"))
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
            .as_mut()
            .unwrap_or_else(|| unreachable!("pooled value used after release"))
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let (Some(value), Some(home)) = (self.value.take(), self.home.take()) {
            home.idle.lock().push_back(value);
        }
    }
}

impl<T: Debug> Debug for Pooled<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pooled")
            .field("value", &self.value)
            .field("pooled", &self.home.is_some())
            .finish()
    }
}
