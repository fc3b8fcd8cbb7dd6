// crates/mlt-consumer/src/source.rs
//
// Two variants behind one trait: a connected upstream service, or the push
// slot fed by an external caller. `Consumer` picks whichever is active at
// `start` time; they're never both live, and that's enforced at the call
// site (`Consumer::connect`/`put`), not here.

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use mlt_core::Frame;
use mlt_core::UpstreamProducer;

/// `acquire() -> Frame | none`.
pub trait FrameSource: Send + Sync {
    fn acquire(&self) -> Option<Frame>;
}

/// Connected mode: `acquire` delegates synchronously to the upstream service.
pub struct ConnectedSource {
    producer: Arc<dyn UpstreamProducer>,
}

impl ConnectedSource {
    pub fn new(producer: Arc<dyn UpstreamProducer>) -> Self {
        Self { producer }
    }
}

impl FrameSource for ConnectedSource {
    fn acquire(&self) -> Option<Frame> {
        self.producer.acquire()
    }
}

/// Push mode: capacity-1 slot guarded by a mutex + condvar. `put_mode=1` and
/// no connected producer enables this path.
///
/// One-second timed waits on both `acquire` and `put` ensure periodic
/// liveness checks against `is_stopped` even when nothing else happened;
/// this bounds "stop while blocked" to at most roughly one second plus
/// whatever the caller's `is_stopped` costs.
pub struct PushSlot {
    slot: Mutex<Option<Frame>>,
    cond: Condvar,
}

impl PushSlot {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Deposit `frame` into the slot for the worker to pick up.
    ///
    /// Blocks while the slot is occupied and the consumer hasn't stopped,
    /// waking at least once a second to recheck `is_stopped`. On wake: if the
    /// slot is empty, deposit; if a stop raced us and the slot is still
    /// occupied, discard the newcomer. No error is surfaced; the frame is
    /// simply dropped.
    pub fn put(&self, frame: Frame, is_stopped: &dyn Fn() -> bool) {
        let mut guard = self.slot.lock().unwrap();
        while !is_stopped() && guard.is_some() {
            let (g, _timeout) = self.cond.wait_timeout(guard, Duration::from_secs(1)).unwrap();
            guard = g;
        }
        if guard.is_none() {
            *guard = Some(frame);
        }
        // else: dropped here, closing it (Frame's fields are freed on Drop).
        self.cond.notify_all();
    }

    /// Take the frame out of the slot, waiting until one arrives or the
    /// consumer stops.
    pub fn take(&self, is_stopped: &dyn Fn() -> bool) -> Option<Frame> {
        let mut guard = self.slot.lock().unwrap();
        while !is_stopped() && guard.is_none() {
            let (g, _timeout) = self.cond.wait_timeout(guard, Duration::from_secs(1)).unwrap();
            guard = g;
        }
        let frame = guard.take();
        self.cond.notify_all();
        frame
    }

    /// Drop any frame left in the slot and wake anyone waiting on it. Used
    /// by `Consumer::start`/`stop` to discard stale frames.
    pub fn clear_and_notify(&self) {
        let mut guard = self.slot.lock().unwrap();
        *guard = None;
        self.cond.notify_all();
    }

    pub fn notify_all(&self) {
        self.cond.notify_all();
    }
}

impl Default for PushSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// `FrameSource` wrapping the push slot. `acquire` is the worker-side read;
/// `put` (exposed directly on `Arc<PushSlot>` by `Consumer`) is the
/// caller-side write, kept as two handles on the same slot rather than one
/// object implementing both directions, since only the worker ever calls
/// `acquire`.
pub struct PushSource {
    slot: Arc<PushSlot>,
    is_stopped: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl PushSource {
    pub fn new(slot: Arc<PushSlot>, is_stopped: Arc<dyn Fn() -> bool + Send + Sync>) -> Self {
        Self { slot, is_stopped }
    }
}

impl FrameSource for PushSource {
    fn acquire(&self) -> Option<Frame> {
        self.slot.take(&|| (self.is_stopped)())
    }
}

/// Neither a connected producer nor push mode is active: `acquire` returns
/// `None` immediately, with no wait. Matches the original's `get_frame`,
/// which falls through to a NULL return with no blocking when neither a
/// producer is connected nor `put_mode` is set.
pub struct IdleSource;

impl FrameSource for IdleSource {
    fn acquire(&self) -> Option<Frame> {
        None
    }
}

/// Wraps whichever `FrameSource` is active and applies the post-acquisition
/// enrichment common to both connected and push mode: aspect ratio,
/// deinterlace flag, rescale interpolation, and a back-reference to the
/// test-card fallback. `Consumer` builds one of these fresh on every
/// `start`, since the enrichment values are a snapshot of the properties at
/// that moment.
pub struct EnrichingSource<S> {
    inner: S,
    rescale_interp: mlt_core::frame::RescaleInterp,
    consumer_aspect_ratio: f64,
    consumer_deinterlace: bool,
    test_card_producer: Option<Weak<dyn UpstreamProducer>>,
}

impl<S: FrameSource> EnrichingSource<S> {
    pub fn new(
        inner: S,
        rescale_interp: mlt_core::frame::RescaleInterp,
        consumer_aspect_ratio: f64,
        consumer_deinterlace: bool,
        test_card_producer: Option<Weak<dyn UpstreamProducer>>,
    ) -> Self {
        Self {
            inner,
            rescale_interp,
            consumer_aspect_ratio,
            consumer_deinterlace,
            test_card_producer,
        }
    }
}

impl<S: FrameSource> FrameSource for EnrichingSource<S> {
    fn acquire(&self) -> Option<Frame> {
        let mut frame = self.inner.acquire()?;
        frame.attrs.rescale_interp = Some(self.rescale_interp);
        frame.attrs.consumer_aspect_ratio = self.consumer_aspect_ratio;
        frame.attrs.consumer_deinterlace = self.consumer_deinterlace;
        frame.test_card_producer = self.test_card_producer.clone();
        Some(frame)
    }
}
