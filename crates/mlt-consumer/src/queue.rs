// crates/mlt-consumer/src/queue.rs
//
// A bounded FIFO hand-off between the read-ahead worker and the sink. Same
// condvar-gated lock/wait/broadcast shape as the push slot in source.rs,
// generalized here from a single latest-wins cell to an N-slot FIFO.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use mlt_core::Frame;

pub struct PresentationQueue {
    capacity: usize,
    inner: Mutex<VecDeque<Frame>>,
    cond: Condvar,
    /// Latched false -> true by the first `pop_front` after construction.
    /// Models prefill being consulted only on the first call after start,
    /// without needing the caller to track that itself.
    prefilled: AtomicBool,
}

impl PresentationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            prefilled: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Push `frame` to the back, waiting while full. `still_running` is
    /// polled on each wake so the worker can abandon the wait when `ahead`
    /// flips to false mid-wait.
    pub fn push_back(&self, frame: Frame, still_running: &dyn Fn() -> bool) {
        let mut guard = self.inner.lock().unwrap();
        while still_running() && guard.len() >= self.capacity {
            guard = self.cond.wait(guard).unwrap();
        }
        guard.push_back(frame);
        self.cond.notify_all();
    }

    /// Pop from the front, waiting until occupancy reaches `min_count` or the
    /// worker stops (`still_running` returns false). `min_count` is the
    /// prefill size on the first call, 1 thereafter; see `realtime_pop`.
    fn pop_front_when(&self, min_count: usize, still_running: &dyn Fn() -> bool) -> Option<Frame> {
        let mut guard = self.inner.lock().unwrap();
        while still_running() && guard.len() < min_count.max(1) {
            guard = self.cond.wait(guard).unwrap();
        }
        let frame = guard.pop_front();
        self.cond.notify_all();
        frame
    }

    /// `realtime_frame()`'s queue-side half: uses `prefill_size` only on the
    /// first call after the worker started, `1` on every call after.
    pub fn realtime_pop(&self, prefill_size: usize, still_running: &dyn Fn() -> bool) -> Option<Frame> {
        let first_call = !self.prefilled.swap(true, Ordering::SeqCst);
        let min_count = if first_call { prefill_size } else { 1 };
        self.pop_front_when(min_count, still_running)
    }

    pub fn pop_back(&self) -> Option<Frame> {
        let mut guard = self.inner.lock().unwrap();
        let frame = guard.pop_back();
        self.cond.notify_all();
        frame
    }

    /// Drain the queue without stopping the worker, then wake anyone blocked
    /// on `push_back`.
    pub fn purge(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.clear();
        self.cond.notify_all();
    }

    /// Called by `stop` to drain and release everything still queued.
    pub fn drain(&self) {
        self.purge();
    }

    /// Wake every waiter without touching the contents. Used by `stop` to
    /// unblock a worker parked in `push_back` once `ahead` has already been
    /// flipped to false.
    pub fn notify_all(&self) {
        let _guard = self.inner.lock().unwrap();
        self.cond.notify_all();
    }
}
