// crates/mlt-consumer/src/sink.rs
//
// The sink is polymorphic over {start, stop, is_stopped, close} and drives
// its own presentation loop by calling `Consumer::realtime_frame()`. The
// consumer core never inspects the adapter's internal state, only calls
// through this trait.
//
// Events are a typed observer registration rather than a varargs
// transmitter: a `Vec<Box<dyn Fn(...)>>` per event, invoked directly since
// the sink calls back into the same process rather than across a thread
// boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mlt_core::Frame;

/// The sink's four function pointers, as a trait object the lifecycle
/// controller drives and never downcasts.
pub trait ConsumerSink: Send + Sync {
    fn start(&self) -> anyhow::Result<()>;
    fn stop(&self);
    fn is_stopped(&self) -> bool;
    fn close(&self);
}

/// `consumer-frame-show(frame)`: fired by the sink per rendered frame.
pub type FrameShowObserver = Box<dyn Fn(&Frame) + Send + Sync>;

/// `consumer-stopped()`: fired exactly once per start/stop cycle.
pub type StoppedObserver = Box<dyn Fn() + Send + Sync>;

/// Typed observer registration for the two consumer events. One instance is
/// owned by `Consumer` and handed (by reference) to whatever needs to raise
/// or listen for these events.
#[derive(Default)]
pub struct EventHub {
    frame_show: Mutex<Vec<FrameShowObserver>>,
    stopped: Mutex<Vec<StoppedObserver>>,
    /// Guards the one-shot nature of `consumer-stopped`, which fires exactly
    /// once per start->stop cycle.
    stopped_fired: AtomicBool,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_frame_show(&self, observer: FrameShowObserver) {
        self.frame_show.lock().unwrap().push(observer);
    }

    pub fn on_stopped(&self, observer: StoppedObserver) {
        self.stopped.lock().unwrap().push(observer);
    }

    pub fn fire_frame_show(&self, frame: &Frame) {
        for observer in self.frame_show.lock().unwrap().iter() {
            observer(frame);
        }
    }

    /// Fires `consumer-stopped` the first time it's called after `rearm`;
    /// every subsequent call until the next `rearm` is a no-op, guaranteeing
    /// the exactly-once property even if the sink calls `stopped()` twice.
    pub fn fire_stopped_once(&self) {
        if self.stopped_fired.swap(true, Ordering::SeqCst) {
            return;
        }
        for observer in self.stopped.lock().unwrap().iter() {
            observer();
        }
    }

    /// Re-arm the one-shot guard. Called by `Consumer::start` at the
    /// beginning of a new lifecycle.
    pub fn rearm(&self) {
        self.stopped_fired.store(false, Ordering::SeqCst);
    }
}

/// Convenience no-op sink used in tests and as a safe default before a real
/// back-end is attached.
pub struct NullSink {
    stopped: AtomicBool,
}

impl NullSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { stopped: AtomicBool::new(true) })
    }
}

impl ConsumerSink for NullSink {
    fn start(&self) -> anyhow::Result<()> {
        self.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn close(&self) {}
}
